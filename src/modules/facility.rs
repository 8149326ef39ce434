//! Kernel mount facility.
//!
//! [`MountFacility`] is the seam between the driver and the operating system:
//! attach a filesystem backend at a path, detach whatever is mounted there, and
//! report the state of a path. [`FuseMountFacility`] implements it with
//! `fuser`.

use super::mountpoint::{self, MountpointState};
use fuser::{BackgroundSession, Filesystem, MountOption};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Options applied to every attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    /// Name reported as the mount source.
    pub fs_name: String,
    /// Let processes other than the mounting user see the mount.
    pub allow_other: bool,
    /// Keep the kernel from buffering writes in the page cache.
    pub disable_writeback_cache: bool,
}

impl MountOptions {
    /// Options used for a backing resource mount.
    pub fn for_resource(resource: &str) -> Self {
        Self {
            fs_name: resource.to_string(),
            allow_other: true,
            disable_writeback_cache: true,
        }
    }
}

/// Attaches and detaches filesystem backends.
pub trait MountFacility: Send {
    /// Backend handle accepted by [`MountFacility::attach`].
    type Backend;

    /// Mounts `backend` at `path`.
    fn attach(&mut self, path: &Path, backend: Self::Backend, options: &MountOptions)
        -> io::Result<()>;

    /// Unmounts whatever is mounted at `path`.
    fn detach(&mut self, path: &Path) -> io::Result<()>;

    /// Reports what currently occupies `path`.
    fn probe(&self, path: &Path) -> io::Result<MountpointState> {
        mountpoint::inspect(path)
    }
}

/// FUSE mount facility serving each backend on a background session.
pub struct FuseMountFacility<F> {
    sessions: HashMap<PathBuf, BackgroundSession>,
    _backend: std::marker::PhantomData<fn(F)>,
}

impl<F> FuseMountFacility<F> {
    /// Facility with no sessions.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            _backend: std::marker::PhantomData,
        }
    }

    /// Paths currently served by this process.
    pub fn active(&self) -> impl Iterator<Item = &Path> {
        self.sessions.keys().map(PathBuf::as_path)
    }
}

impl<F> Drop for FuseMountFacility<F> {
    fn drop(&mut self) {
        // Dropping a BackgroundSession unmounts it.
        for path in self.active() {
            info!("Unmounting {} on shutdown", path.display());
        }
    }
}

impl<F> Default for FuseMountFacility<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> MountFacility for FuseMountFacility<F>
where
    F: Filesystem + Send + 'static,
{
    type Backend = F;

    fn attach(&mut self, path: &Path, backend: F, options: &MountOptions) -> io::Result<()> {
        // fuser only enables writeback caching when the filesystem requests it
        // from `init`, so there is no kernel option to pass for it.
        let mut mount_options = vec![MountOption::FSName(options.fs_name.clone())];
        if options.allow_other {
            mount_options.push(MountOption::AllowOther);
        }

        let session = fuser::spawn_mount2(backend, path, &mount_options)?;
        info!("Attached {} at {}", options.fs_name, path.display());
        self.sessions.insert(path.to_path_buf(), session);
        Ok(())
    }

    fn detach(&mut self, path: &Path) -> io::Result<()> {
        if let Some(session) = self.sessions.remove(path) {
            debug!("Joining FUSE session at {}", path.display());
            session.join();
            return Ok(());
        }

        // Not ours: most likely a leftover from a previous process.
        handle_unmount(path)
    }
}

// Lazy unmount so a busy or disconnected mount still goes away. Unprivileged
// processes fall back to fusermount.
fn handle_unmount(path: &Path) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use nix::mount::{umount2, MntFlags};

        match umount2(path, MntFlags::MNT_DETACH) {
            Ok(()) => return Ok(()),
            Err(e) => debug!("umount2 {} failed: {}", path.display(), e),
        }
    }

    let status = Command::new("fusermount").arg("-u").arg("-z").arg(path).status()?;
    if status.success() {
        Ok(())
    } else {
        warn!("fusermount -u {} exited with {}", path.display(), status);
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("failed to unmount {}", path.display()),
        ))
    }
}
