//! Filesystem backend factories.

use super::bucketfs::BucketFs;
use super::config::BackendConfig;
use anyhow::{bail, Result};
use log::{debug, info};
use std::path::PathBuf;

/// Creates the filesystem backend served at a resource's mountpoint.
pub trait BackendFactory: Send {
    /// Backend handle produced for the mount facility.
    type Backend;

    /// Builds a backend for `resource` configured by `config`.
    fn create(&self, resource: &str, config: &BackendConfig) -> Result<Self::Backend>;
}

/// Backends over a local object-store directory laid out as
/// `<store>/<bucket>/<prefix>`.
///
/// Remote endpoints are refused; only `file://` endpoints, which replace the
/// store root, are understood.
#[derive(Debug, Clone)]
pub struct LocalStoreFactory {
    store: PathBuf,
}

impl LocalStoreFactory {
    /// Factory reading buckets from `store`.
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
        }
    }

    /// Directory holding the objects of `config`'s bucket and prefix.
    pub fn bucket_dir(&self, config: &BackendConfig) -> Result<PathBuf> {
        let store = match config.endpoint.as_deref() {
            None => self.store.clone(),
            Some(endpoint) => match endpoint.strip_prefix("file://") {
                Some(path) => PathBuf::from(path),
                None => bail!("unsupported endpoint {}", endpoint),
            },
        };

        let mut dir = store.join(config.bucket_name());
        if let Some(prefix) = config.prefix() {
            dir.push(prefix.trim_matches('/'));
        }
        Ok(dir)
    }
}

impl BackendFactory for LocalStoreFactory {
    type Backend = BucketFs;

    fn create(&self, resource: &str, config: &BackendConfig) -> Result<BucketFs> {
        info!("Creating backend for bucket {}", config.bucket);
        if config.debug_s3 {
            debug!("{} backend config: {:?}", resource, config);
        }
        let dir = self.bucket_dir(config)?;
        BucketFs::new(dir, config.clone())
    }
}
