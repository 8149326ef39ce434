use super::config::BackendConfig;
use super::constants::*;
use anyhow::{anyhow, Result};
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEntry, Request,
};
use libc::{c_int, EIO, ENOENT, ENOTDIR};
use log::debug;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Read-only view of a bucket stored in a local object-store directory.
///
/// Ownership and permission bits come from the [`BackendConfig`], not from the
/// files on disk.
#[derive(Debug)]
pub struct BucketFs {
    root: PathBuf,
    config: BackendConfig,
    inodes: HashMap<u64, PathBuf>,
    paths: HashMap<PathBuf, u64>,
    next_inode: u64,
}

impl BucketFs {
    /// Serves the directory at `root`, which must exist.
    pub fn new(root: PathBuf, config: BackendConfig) -> Result<Self> {
        if !root.is_dir() {
            return Err(anyhow!("bucket directory {:?} does not exist", root));
        }
        let mut inodes = HashMap::new();
        let mut paths = HashMap::new();
        inodes.insert(ROOT_INODE, root.clone());
        paths.insert(root.clone(), ROOT_INODE);

        Ok(Self {
            root,
            config,
            inodes,
            paths,
            next_inode: INITIAL_INODE,
        })
    }

    /// Directory being served.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, ino: u64) -> io::Result<PathBuf> {
        self.inodes
            .get(&ino)
            .cloned()
            .ok_or_else(|| io::Error::from_raw_os_error(ENOENT))
    }

    fn inode_for(&mut self, path: &Path) -> u64 {
        if let Some(ino) = self.paths.get(path) {
            return *ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.inodes.insert(ino, path.to_path_buf());
        self.paths.insert(path.to_path_buf(), ino);
        ino
    }

    fn file_attr(&self, ino: u64, metadata: &fs::Metadata) -> FileAttr {
        let (kind, mode, nlink) = if metadata.is_dir() {
            (FileType::Directory, self.config.dir_mode, 2)
        } else {
            (FileType::RegularFile, self.config.file_mode, 1)
        };
        let size = if metadata.is_dir() { 0 } else { metadata.len() };

        FileAttr {
            ino,
            size,
            blocks: (size + BLOCK_SIZE - 1) / BLOCK_SIZE,
            atime: metadata.accessed().unwrap_or(UNIX_EPOCH),
            mtime: metadata.modified().unwrap_or(UNIX_EPOCH),
            ctime: metadata.modified().unwrap_or(UNIX_EPOCH),
            crtime: UNIX_EPOCH,
            kind,
            perm: (mode & 0o7777) as u16,
            nlink,
            uid: self.config.uid,
            gid: self.config.gid,
            rdev: 0,
            flags: 0,
            blksize: BLOCK_SIZE as u32,
        }
    }

    /// Attributes of an inode.
    pub fn attr_of(&self, ino: u64) -> io::Result<FileAttr> {
        let path = self.path_of(ino)?;
        let metadata = fs::metadata(&path)?;
        Ok(self.file_attr(ino, &metadata))
    }

    /// Resolves `name` inside directory `parent`.
    pub fn lookup_child(&mut self, parent: u64, name: &OsStr) -> io::Result<FileAttr> {
        let path = self.path_of(parent)?.join(name);
        let metadata = fs::metadata(&path)?;
        let ino = self.inode_for(&path);
        Ok(self.file_attr(ino, &metadata))
    }

    /// Directory listing including `.` and `..`, sorted by name.
    pub fn entries(&mut self, ino: u64) -> io::Result<Vec<(u64, FileType, OsString)>> {
        let path = self.path_of(ino)?;
        if !fs::metadata(&path)?.is_dir() {
            return Err(io::Error::from_raw_os_error(ENOTDIR));
        }
        let parent = match path.parent() {
            Some(parent) if path != self.root => self.inode_for(parent),
            _ => ROOT_INODE,
        };

        let mut children = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            children.push((entry.path(), kind, entry.file_name()));
        }
        children.sort_by(|a, b| a.2.cmp(&b.2));

        let mut entries = vec![
            (ino, FileType::Directory, OsString::from(".")),
            (parent, FileType::Directory, OsString::from("..")),
        ];
        for (child, kind, name) in children {
            entries.push((self.inode_for(&child), kind, name));
        }
        Ok(entries)
    }

    /// Reads up to `size` bytes at `offset`.
    pub fn read_at(&self, ino: u64, offset: u64, size: usize) -> io::Result<Vec<u8>> {
        let file = fs::File::open(self.path_of(ino)?)?;
        let mut buf = vec![0; size];
        let mut filled = 0;
        while filled < size {
            let n = file.read_at(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

fn errno(e: &io::Error) -> c_int {
    e.raw_os_error().unwrap_or(EIO)
}

impl Filesystem for BucketFs {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> Result<(), c_int> {
        debug!(
            "Serving bucket {} from {:?} (region {}, storage class {})",
            self.config.bucket, self.root, self.config.region, self.config.storage_class
        );
        Ok(())
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_child(parent, name) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.attr_of(ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock: Option<u64>,
        reply: ReplyData,
    ) {
        match self.read_at(ino, offset.max(0) as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.entries(ino) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(errno(&e));
                return;
            }
        };

        for (i, (inode, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(inode, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_bucket() -> Result<(TempDir, BucketFs)> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("hello.txt"), "Hello, World!")?;
        fs::create_dir(dir.path().join("logs"))?;
        fs::write(dir.path().join("logs").join("app.log"), "line")?;

        let mut config = BackendConfig::new("bucket");
        config.uid = 1000;
        config.gid = 100;
        config.dir_mode = 0o750;
        config.file_mode = 0o640;
        let fs = BucketFs::new(dir.path().to_path_buf(), config)?;
        Ok((dir, fs))
    }

    #[test]
    fn test_missing_root_fails() {
        let config = BackendConfig::new("bucket");
        assert!(BucketFs::new(PathBuf::from("/nonexistent/bucket/root"), config).is_err());
    }

    #[test]
    fn test_root_attributes_use_config() -> Result<()> {
        let (_dir, fs) = setup_bucket()?;
        let attr = fs.attr_of(ROOT_INODE)?;

        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.perm, 0o750);
        assert_eq!(attr.uid, 1000);
        assert_eq!(attr.gid, 100);
        Ok(())
    }

    #[test]
    fn test_lookup_assigns_stable_inodes() -> Result<()> {
        let (_dir, mut fs) = setup_bucket()?;
        let first = fs.lookup_child(ROOT_INODE, OsStr::new("hello.txt"))?;
        let again = fs.lookup_child(ROOT_INODE, OsStr::new("hello.txt"))?;

        assert_eq!(first.ino, again.ino);
        assert_eq!(first.kind, FileType::RegularFile);
        assert_eq!(first.perm, 0o640);
        assert_eq!(first.size, 13);

        let missing = fs.lookup_child(ROOT_INODE, OsStr::new("missing"));
        assert_eq!(missing.unwrap_err().raw_os_error(), Some(ENOENT));
        Ok(())
    }

    #[test]
    fn test_directory_listing() -> Result<()> {
        let (_dir, mut fs) = setup_bucket()?;
        let entries = fs.entries(ROOT_INODE)?;
        let names: Vec<_> = entries
            .iter()
            .map(|(_, _, name)| name.to_str().unwrap())
            .collect();
        assert_eq!(names, vec![".", "..", "hello.txt", "logs"]);

        let logs = fs.lookup_child(ROOT_INODE, OsStr::new("logs"))?;
        let nested = fs.entries(logs.ino)?;
        assert_eq!(nested[1].0, ROOT_INODE);
        assert_eq!(nested[2].2, OsString::from("app.log"));
        Ok(())
    }

    #[test]
    fn test_read_ranges() -> Result<()> {
        let (_dir, mut fs) = setup_bucket()?;
        let attr = fs.lookup_child(ROOT_INODE, OsStr::new("hello.txt"))?;

        assert_eq!(fs.read_at(attr.ino, 0, 5)?, b"Hello");
        assert_eq!(fs.read_at(attr.ino, 7, 100)?, b"World!");
        assert!(fs.read_at(attr.ino, 50, 10)?.is_empty());
        Ok(())
    }
}
