use super::mountpoint;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Option map attached to a volume at creation time.
pub type VolumeOptions = HashMap<String, String>;

/// Known volumes and their options.
///
/// Not synchronised on its own; the driver owns it behind its lock.
#[derive(Debug, Default)]
pub struct VolumeRegistry {
    volumes: HashMap<String, VolumeOptions>,
}

impl VolumeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a volume, replacing the options of an existing one.
    pub fn register(&mut self, name: &str, options: VolumeOptions) {
        self.volumes.insert(name.to_string(), options);
    }

    /// Options of a registered volume.
    pub fn lookup(&self, name: &str) -> Option<&VolumeOptions> {
        self.volumes.get(name)
    }

    /// Every registered volume with its mountpoint under `root`.
    ///
    /// Order is unspecified.
    pub fn list(&self, root: &Path) -> Vec<(String, PathBuf)> {
        self.volumes
            .iter()
            .map(|(name, options)| {
                (
                    name.clone(),
                    mountpoint::volume_mountpoint(root, name, options),
                )
            })
            .collect()
    }

    /// Removes a volume, returning its options. Absent names are a no-op.
    pub fn unregister(&mut self, name: &str) -> Option<VolumeOptions> {
        self.volumes.remove(name)
    }
}
