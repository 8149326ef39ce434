//! Mount orchestration for backing resources.
//!
//! [`MountCoordinator`] performs the physical attach when a resource gains its
//! first reference and the detach when it loses its last one. Every other
//! mount or unmount only moves the reference count.

use super::backend::BackendFactory;
use super::config::BackendConfig;
use super::error::{DriverError, DriverResult};
use super::facility::{MountFacility, MountOptions};
use super::mountpoint::{self, MountpointState};
use super::refcount::MountReferenceTracker;
use super::registry::VolumeOptions;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Attaches a resource on its first reference and detaches it on its last.
///
/// Holds no counts of its own; the caller passes the [`MountReferenceTracker`]
/// in so both are guarded by the same lock.
pub struct MountCoordinator<M, B> {
    root: PathBuf,
    facility: M,
    factory: B,
}

impl<M, B> MountCoordinator<M, B>
where
    M: MountFacility,
    B: BackendFactory<Backend = M::Backend>,
{
    /// Creates a coordinator mounting resources directly under `root`.
    pub fn new(root: PathBuf, facility: M, factory: B) -> Self {
        Self {
            root,
            facility,
            factory,
        }
    }

    /// Adds a reference from volume `name` and returns its mountpoint.
    ///
    /// The backend is created and attached only when `resource` had no active
    /// reference. On failure the count is left untouched.
    pub fn mount(
        &mut self,
        tracker: &mut MountReferenceTracker,
        name: &str,
        resource: &str,
        options: &VolumeOptions,
    ) -> DriverResult<PathBuf> {
        if !mountpoint::is_valid_resource(resource) {
            return Err(DriverError::InvalidResource(resource.to_string()));
        }
        let target = mountpoint::volume_mountpoint(&self.root, name, options);
        let path = mountpoint::resolve(&self.root, resource);
        info!("Mounting volume {} on {}", name, path.display());

        if tracker.count_of(resource) > 0 {
            tracker.increment(resource);
            return Ok(target);
        }

        self.prepare_mountpoint(&path)?;
        self.attach(resource, &path, options)?;

        tracker.set(resource, 1);
        Ok(target)
    }

    /// Drops a reference to `resource`, detaching it when none remain.
    ///
    /// Teardown failures are logged and never fail the call.
    pub fn unmount(
        &mut self,
        tracker: &mut MountReferenceTracker,
        name: &str,
        resource: &str,
    ) -> DriverResult<()> {
        let path = mountpoint::resolve(&self.root, resource);
        info!("Unmounting volume {} from {}", name, path.display());

        if tracker.count_of(resource) == 0 {
            return Err(DriverError::NotMounted(path));
        }

        if tracker.decrement(resource) == 0 {
            self.teardown(&path);
        }
        Ok(())
    }

    fn prepare_mountpoint(&mut self, path: &Path) -> DriverResult<()> {
        let state = self
            .facility
            .probe(path)
            .map_err(|e| DriverError::filesystem(path, e))?;

        match state {
            MountpointState::Absent => {
                fs::create_dir_all(path).map_err(|e| DriverError::filesystem(path, e))?;
            }
            MountpointState::Stale => {
                // Crashed previously? Clear the dead mount first.
                warn!("Found stale mount at {}, detaching", path.display());
                if let Err(e) = self.facility.detach(path) {
                    warn!("Failed to detach stale mount {}: {}", path.display(), e);
                }
            }
            MountpointState::NotDirectory => {
                return Err(DriverError::AlreadyOccupied(path.to_path_buf()));
            }
            MountpointState::Directory => {}
        }
        Ok(())
    }

    fn attach(&mut self, resource: &str, path: &Path, options: &VolumeOptions) -> DriverResult<()> {
        let config = BackendConfig::from_options(resource, options);
        let backend = self
            .factory
            .create(resource, &config)
            .map_err(|e| DriverError::BackendInit {
                bucket: config.bucket.clone(),
                reason: format!("{:#}", e),
            })?;

        self.facility
            .attach(path, backend, &MountOptions::for_resource(resource))
            .map_err(|source| DriverError::MountFacility {
                path: path.to_path_buf(),
                source,
            })
    }

    fn teardown(&mut self, path: &Path) {
        if let Err(e) = self.facility.detach(path) {
            warn!("Failed to detach {}: {}", path.display(), e);
        }
        if let Err(e) = fs::remove_dir(path) {
            warn!("Failed to remove mountpoint {}: {}", path.display(), e);
        }
    }
}
