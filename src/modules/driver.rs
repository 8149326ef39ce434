//! Public volume operation surface.
//!
//! [`VolumeDriver`] owns the registry, the reference tracker and the mount
//! coordinator behind one lock. Every operation takes the lock for its whole
//! duration, including the blocking attach and detach calls, so operations
//! are applied one at a time in a single total order.

use super::backend::BackendFactory;
use super::constants::SCOPE;
use super::error::{DriverError, DriverResult};
use super::facility::MountFacility;
use super::mount::MountCoordinator;
use super::mountpoint;
use super::refcount::MountReferenceTracker;
use super::registry::{VolumeOptions, VolumeRegistry};
use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A registered volume and where it is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Volume name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Mountpoint the volume resolves to.
    #[serde(rename = "Mountpoint")]
    pub mountpoint: PathBuf,
}

/// Driver capabilities reported to the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Visibility of volumes, always `local`.
    #[serde(rename = "Scope")]
    pub scope: String,
}

struct DriverState<M, B> {
    registry: VolumeRegistry,
    tracker: MountReferenceTracker,
    coordinator: MountCoordinator<M, B>,
    // Resource taken by each successful mount of a volume, oldest first.
    mounts: HashMap<String, Vec<String>>,
}

impl<M, B> DriverState<M, B> {
    // Resource the next unmount of `name` releases. Volumes release what they
    // took, whatever their options say now.
    fn mounted_resource(&self, name: &str) -> Option<String> {
        self.mounts.get(name).and_then(|taken| taken.last()).cloned()
    }

    fn release(&mut self, name: &str) {
        if let Some(taken) = self.mounts.get_mut(name) {
            taken.pop();
            if taken.is_empty() {
                self.mounts.remove(name);
            }
        }
    }
}

/// Volume lifecycle driver.
///
/// Share it between threads behind an `Arc`; all methods take `&self`.
pub struct VolumeDriver<M, B> {
    root: PathBuf,
    state: Mutex<DriverState<M, B>>,
}

impl<M, B> VolumeDriver<M, B>
where
    M: MountFacility,
    B: BackendFactory<Backend = M::Backend>,
{
    /// Creates a driver mounting resources under `root`.
    pub fn new(root: impl Into<PathBuf>, facility: M, factory: B) -> Self {
        let root = root.into();
        Self {
            state: Mutex::new(DriverState {
                registry: VolumeRegistry::new(),
                tracker: MountReferenceTracker::new(),
                coordinator: MountCoordinator::new(root.clone(), facility, factory),
                mounts: HashMap::new(),
            }),
            root,
        }
    }

    /// Registers a volume, replacing the options of an existing one.
    pub fn create(&self, name: &str, options: VolumeOptions) {
        info!("Creating volume {}", name);
        self.state.lock().registry.register(name, options);
    }

    /// Looks up a registered volume.
    pub fn get(&self, name: &str) -> DriverResult<VolumeInfo> {
        let state = self.state.lock();
        match state.registry.lookup(name) {
            Some(options) => Ok(VolumeInfo {
                name: name.to_string(),
                mountpoint: mountpoint::volume_mountpoint(&self.root, name, options),
            }),
            None => Err(DriverError::VolumeNotFound(mountpoint::resolve(
                &self.root, name,
            ))),
        }
    }

    /// Every registered volume, in no particular order.
    pub fn list(&self) -> Vec<VolumeInfo> {
        let state = self.state.lock();
        state
            .registry
            .list(&self.root)
            .into_iter()
            .map(|(name, mountpoint)| VolumeInfo { name, mountpoint })
            .collect()
    }

    /// Unregisters a volume.
    ///
    /// The resource's tracker entry is dropped only when nothing references
    /// it; an in-use mount stays up for the other volumes sharing it. Mounts
    /// the volume still holds can be released by a later Unmount.
    pub fn remove(&self, name: &str) {
        info!("Removing volume {}", name);
        let mut state = self.state.lock();
        let options = state.registry.unregister(name).unwrap_or_default();
        let resource = mountpoint::backing_resource(name, &options);
        state.tracker.forget(&resource);
    }

    /// Mountpoint of a volume. Never fails and checks nothing on disk.
    pub fn path(&self, name: &str) -> PathBuf {
        let state = self.state.lock();
        let empty = VolumeOptions::new();
        let options = state.registry.lookup(name).unwrap_or(&empty);
        mountpoint::volume_mountpoint(&self.root, name, options)
    }

    /// Mounts a volume and returns its mountpoint.
    ///
    /// Unregistered names are mounted with an empty option map.
    pub fn mount(&self, name: &str) -> DriverResult<PathBuf> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let options = state.registry.lookup(name).cloned().unwrap_or_default();
        let resource = mountpoint::backing_resource(name, &options);
        let target = state
            .coordinator
            .mount(&mut state.tracker, name, &resource, &options)?;
        state
            .mounts
            .entry(name.to_string())
            .or_default()
            .push(resource);
        Ok(target)
    }

    /// Releases a volume's mount reference.
    ///
    /// The reference goes back to the resource the volume was mounted on,
    /// even if the volume has since been removed or re-created.
    pub fn unmount(&self, name: &str) -> DriverResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let resource = match state.mounted_resource(name) {
            Some(resource) => resource,
            None => {
                let empty = VolumeOptions::new();
                let options = state.registry.lookup(name).unwrap_or(&empty);
                return Err(DriverError::NotMounted(mountpoint::volume_mountpoint(
                    &self.root, name, options,
                )));
            }
        };
        state
            .coordinator
            .unmount(&mut state.tracker, name, &resource)?;
        state.release(name);
        Ok(())
    }

    /// Fixed capabilities of this driver.
    pub fn capabilities(&self) -> Capabilities {
        info!("Capabilities requested");
        Capabilities {
            scope: SCOPE.to_string(),
        }
    }

    /// Tracker entry for a backing resource.
    pub fn references(&self, resource: &str) -> Option<usize> {
        self.state.lock().tracker.entry(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::mount::testing::*;
    use anyhow::Result;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    type Driver = VolumeDriver<FakeFacility, FakeFactory>;

    fn setup_driver() -> (TempDir, SharedRecorder, Driver) {
        let root = tempfile::tempdir().unwrap();
        let rec = recorder();
        let driver = VolumeDriver::new(
            root.path(),
            FakeFacility(rec.clone()),
            FakeFactory(rec.clone()),
        );
        (root, rec, driver)
    }

    fn bucket(name: &str) -> VolumeOptions {
        VolumeOptions::from([("bucket".to_string(), name.to_string())])
    }

    #[test]
    fn test_get_unregistered_is_not_found() {
        let (_root, _rec, driver) = setup_driver();
        let err = driver.get("ghost").unwrap_err();
        assert!(matches!(err, DriverError::VolumeNotFound(_)));
    }

    #[test]
    fn test_create_get_list() -> Result<()> {
        let (root, _rec, driver) = setup_driver();
        driver.create("v1", VolumeOptions::new());
        driver.create("v2", bucket("shared"));
        driver.create("v1", VolumeOptions::new());

        let info = driver.get("v1")?;
        assert_eq!(info.mountpoint, root.path().join("v1"));

        let mut names: Vec<_> = driver.list().into_iter().map(|v| v.name).collect();
        names.sort();
        assert_eq!(names, vec!["v1", "v2"]);
        Ok(())
    }

    #[test]
    fn test_path_needs_no_registration() {
        let (root, rec, driver) = setup_driver();
        assert_eq!(driver.path("anything/sub"), root.path().join("anything/sub"));
        assert!(!root.path().join("anything").exists());
        assert!(rec.lock().calls.is_empty());
    }

    #[test]
    fn test_capabilities_scope() {
        let (_root, _rec, driver) = setup_driver();
        assert_eq!(driver.capabilities().scope, "local");
    }

    #[test]
    fn test_shared_bucket_lifecycle() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        let mountpoint = root.path().join("b");
        driver.create("v1", bucket("b"));
        driver.create("v2", bucket("b"));

        assert_eq!(driver.mount("v1")?, mountpoint);
        assert_eq!(attaches(&rec), 1);
        assert_eq!(driver.references("b"), Some(1));

        assert_eq!(driver.mount("v2")?, mountpoint);
        assert_eq!(attaches(&rec), 1);
        assert_eq!(driver.references("b"), Some(2));

        driver.unmount("v1")?;
        assert_eq!(driver.references("b"), Some(1));
        assert_eq!(detaches(&rec), 0);

        driver.unmount("v2")?;
        assert_eq!(driver.references("b"), Some(0));
        assert_eq!(detaches(&rec), 1);
        assert!(!mountpoint.exists());
        Ok(())
    }

    #[test]
    fn test_unmount_unknown_fails() {
        let (_root, rec, driver) = setup_driver();
        assert!(matches!(
            driver.unmount("ghost").unwrap_err(),
            DriverError::NotMounted(_)
        ));
        assert_eq!(detaches(&rec), 0);
    }

    #[test]
    fn test_remove_idle_forgets_tracker_entry() -> Result<()> {
        let (_root, _rec, driver) = setup_driver();
        driver.create("v1", bucket("b"));
        driver.mount("v1")?;
        driver.unmount("v1")?;
        assert_eq!(driver.references("b"), Some(0));

        driver.remove("v1");
        assert!(driver.get("v1").is_err());
        assert_eq!(driver.references("b"), None);
        Ok(())
    }

    #[test]
    fn test_remove_in_use_keeps_mount() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        driver.create("v1", bucket("b"));
        driver.create("v2", bucket("b"));
        driver.mount("v1")?;
        driver.mount("v2")?;

        driver.remove("v1");
        assert!(driver.get("v1").is_err());
        assert_eq!(driver.references("b"), Some(2));
        assert_eq!(detaches(&rec), 0);
        assert!(root.path().join("b").is_dir());
        Ok(())
    }

    #[test]
    fn test_mount_failure_is_reported() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        fs::write(root.path().join("b"), "occupied")?;
        driver.create("v1", bucket("b"));

        let err = driver.mount("v1").unwrap_err();
        assert!(err.to_string().contains("not a directory"));
        assert_eq!(driver.references("b"), None);
        assert_eq!(attaches(&rec), 0);
        Ok(())
    }

    #[test]
    fn test_volume_options_reach_backend() -> Result<()> {
        let (_root, rec, driver) = setup_driver();
        let mut options = bucket("data");
        options.insert("prefix".to_string(), "team".to_string());
        options.insert("uid".to_string(), "0x3e8".to_string());
        driver.create("v1", options);
        driver.mount("v1")?;

        let calls = rec.lock().calls.clone();
        match &calls[0] {
            Call::New(resource, config) => {
                assert_eq!(resource, "data");
                assert_eq!(config.bucket, "data:team");
                assert_eq!(config.uid, 1000);
            }
            other => panic!("unexpected first call {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_concurrent_mounts_attach_once() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        let driver = Arc::new(driver);
        const N: usize = 16;
        for i in 0..N {
            driver.create(&format!("v{}", i), bucket("b"));
        }

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let driver = driver.clone();
                thread::spawn(move || driver.mount(&format!("v{}", i)).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap()?;
        }

        assert_eq!(news(&rec), 1);
        assert_eq!(attaches(&rec), 1);
        assert_eq!(driver.references("b"), Some(N));

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let driver = driver.clone();
                thread::spawn(move || driver.unmount(&format!("v{}", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap()?;
        }

        assert_eq!(driver.references("b"), Some(0));
        assert_eq!(detaches(&rec), 1);
        assert!(!root.path().join("b").exists());
        Ok(())
    }

    #[test]
    fn test_unmount_after_remove_releases_mount() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        driver.create("v1", bucket("b"));
        driver.create("v2", bucket("b"));
        driver.mount("v1")?;
        driver.mount("v2")?;

        driver.remove("v1");
        driver.unmount("v1")?;
        assert_eq!(driver.references("b"), Some(1));
        assert_eq!(detaches(&rec), 0);

        driver.unmount("v2")?;
        assert_eq!(driver.references("b"), Some(0));
        assert_eq!(detaches(&rec), 1);
        assert!(!root.path().join("b").exists());
        Ok(())
    }

    #[test]
    fn test_unmount_after_recreate_uses_mounted_bucket() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        driver.create("v1", bucket("a"));
        driver.mount("v1")?;

        driver.create("v1", bucket("b"));
        driver.unmount("v1")?;
        assert_eq!(driver.references("a"), Some(0));
        assert_eq!(driver.references("b"), None);
        assert_eq!(detaches(&rec), 1);
        assert!(!root.path().join("a").exists());

        // The next mount follows the new options.
        assert_eq!(driver.mount("v1")?, root.path().join("b"));
        assert_eq!(driver.references("b"), Some(1));
        Ok(())
    }

    #[test]
    fn test_unmount_of_unmounted_sibling_keeps_count() -> Result<()> {
        let (_root, rec, driver) = setup_driver();
        driver.create("v1", bucket("b"));
        driver.create("v2", bucket("b"));
        driver.mount("v1")?;

        assert!(matches!(
            driver.unmount("v2").unwrap_err(),
            DriverError::NotMounted(_)
        ));
        assert_eq!(driver.references("b"), Some(1));

        driver.unmount("v1")?;
        assert_eq!(detaches(&rec), 1);
        assert!(driver.unmount("v1").is_err());
        Ok(())
    }

    #[test]
    fn test_empty_bucket_option_never_mounts_root() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        driver.create("v1", bucket(""));
        assert_eq!(driver.mount("v1")?, root.path().join("v1"));
        assert!(matches!(
            &rec.lock().calls[1],
            Call::Attach(path, _) if *path == root.path().join("v1")
        ));

        driver.unmount("v1")?;
        assert!(root.path().is_dir());
        assert!(!root.path().join("v1").exists());
        Ok(())
    }

    #[test]
    fn test_escaping_bucket_is_rejected() -> Result<()> {
        let (root, rec, driver) = setup_driver();
        driver.create("v1", bucket("../x"));
        assert!(driver.path("v1").starts_with(root.path()));

        let err = driver.mount("v1").unwrap_err();
        assert!(matches!(err, DriverError::InvalidResource(_)));
        assert_eq!(attaches(&rec), 0);
        assert!(driver.unmount("v1").is_err());
        Ok(())
    }
}
