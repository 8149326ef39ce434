//! Mountpoint and backing resource resolution.
//!
//! Pure path arithmetic plus [`inspect`], the single place where the state of
//! an existing mountpoint is read back from the operating system.

use super::constants::OPT_BUCKET;
use super::registry::VolumeOptions;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// What currently occupies a mountpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountpointState {
    /// Nothing exists at the path.
    Absent,
    /// A reachable directory (possibly a live mount).
    Directory,
    /// A reachable object that is not a directory.
    NotDirectory,
    /// A mount left behind by a dead filesystem server.
    Stale,
}

/// Joins `name` under `root`.
///
/// Only plain path segments are kept. Root, `.` and `..` components are
/// dropped, so the result always stays under `root`.
pub fn resolve(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(
        Path::new(name)
            .components()
            .filter(|c| matches!(c, Component::Normal(_))),
    );
    path
}

/// Backing resource a volume maps onto.
///
/// A non-empty `bucket` option wins; otherwise the volume name up to the first
/// `/` is used.
pub fn backing_resource(name: &str, options: &VolumeOptions) -> String {
    match options.get(OPT_BUCKET).filter(|bucket| !bucket.is_empty()) {
        Some(bucket) => bucket.clone(),
        None => {
            let name = name.trim_start_matches('/');
            name.split('/').next().unwrap_or(name).to_string()
        }
    }
}

/// Whether `resource` names exactly one directory directly under the root.
///
/// Empty names, `.`, `..` and anything containing a separator would mount
/// over the root itself or somewhere outside it.
pub fn is_valid_resource(resource: &str) -> bool {
    let mut components = Path::new(resource).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !resource.contains('/')
}

/// Mountpoint handed out for a volume.
///
/// This is the resource's mountpoint joined with whatever follows the first
/// `/` of the volume name, so every volume lands inside the shared mount.
pub fn volume_mountpoint(root: &Path, name: &str, options: &VolumeOptions) -> PathBuf {
    let resource = resolve(root, &backing_resource(name, options));
    match name.trim_start_matches('/').split_once('/') {
        Some((_, rest)) if !rest.trim_start_matches('/').is_empty() => resolve(&resource, rest),
        _ => resource,
    }
}

/// Reads the state of `path` without following a final symlink.
///
/// A disconnected FUSE mount reports `ENOTCONN`, which is the stale signature.
pub fn inspect(path: &Path) -> io::Result<MountpointState> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(MountpointState::Directory),
        Ok(_) => Ok(MountpointState::NotDirectory),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(MountpointState::Absent),
        Err(e) if e.raw_os_error() == Some(libc::ENOTCONN) => Ok(MountpointState::Stale),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn options(pairs: &[(&str, &str)]) -> VolumeOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_joins_under_root() {
        let root = Path::new("/mnt/volumes");
        assert_eq!(resolve(root, "data"), PathBuf::from("/mnt/volumes/data"));
        assert_eq!(resolve(root, "/data"), PathBuf::from("/mnt/volumes/data"));
        assert_eq!(
            resolve(root, "data/logs"),
            PathBuf::from("/mnt/volumes/data/logs")
        );
    }

    #[test]
    fn test_resource_from_name() {
        let empty = VolumeOptions::new();
        assert_eq!(backing_resource("photos", &empty), "photos");
        assert_eq!(backing_resource("photos/2024/may", &empty), "photos");
    }

    #[test]
    fn test_bucket_option_wins() {
        let opts = options(&[("bucket", "shared")]);
        assert_eq!(backing_resource("photos/2024", &opts), "shared");
    }

    #[test]
    fn test_empty_bucket_falls_back_to_name() {
        let opts = options(&[("bucket", "")]);
        assert_eq!(backing_resource("photos/2024", &opts), "photos");
        assert_eq!(backing_resource("/photos", &VolumeOptions::new()), "photos");
    }

    #[test]
    fn test_resolve_stays_under_root() {
        let root = Path::new("/mnt/volumes");
        assert_eq!(resolve(root, "../x"), PathBuf::from("/mnt/volumes/x"));
        assert_eq!(resolve(root, "a/../../b"), PathBuf::from("/mnt/volumes/a/b"));
        assert_eq!(resolve(root, "./a"), PathBuf::from("/mnt/volumes/a"));

        let opts = options(&[("bucket", "../etc")]);
        assert!(volume_mountpoint(root, "v1/../../x", &opts).starts_with(root));
    }

    #[test]
    fn test_valid_resources() {
        assert!(is_valid_resource("photos"));
        assert!(is_valid_resource("my.bucket-1"));
        assert!(!is_valid_resource(""));
        assert!(!is_valid_resource("."));
        assert!(!is_valid_resource(".."));
        assert!(!is_valid_resource("../x"));
        assert!(!is_valid_resource("a/b"));
        assert!(!is_valid_resource("/a"));
    }

    #[test]
    fn test_volume_mountpoint() {
        let root = Path::new("/mnt/volumes");
        let empty = VolumeOptions::new();
        assert_eq!(
            volume_mountpoint(root, "photos/2024", &empty),
            PathBuf::from("/mnt/volumes/photos/2024")
        );

        let opts = options(&[("bucket", "shared")]);
        assert_eq!(
            volume_mountpoint(root, "v1", &opts),
            PathBuf::from("/mnt/volumes/shared")
        );
        assert_eq!(
            volume_mountpoint(root, "v1/logs", &opts),
            PathBuf::from("/mnt/volumes/shared/logs")
        );
        assert_eq!(
            volume_mountpoint(root, "photos//abs", &empty),
            PathBuf::from("/mnt/volumes/photos/abs")
        );
    }

    #[test]
    fn test_inspect_states() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("file");
        fs::write(&file, "x")?;

        assert_eq!(inspect(dir.path())?, MountpointState::Directory);
        assert_eq!(inspect(&file)?, MountpointState::NotDirectory);
        assert_eq!(
            inspect(&dir.path().join("missing"))?,
            MountpointState::Absent
        );
        Ok(())
    }
}
