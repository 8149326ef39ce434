#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! bucketvol: a volume plugin driver for object-store buckets
//! 
//! Container runtimes ask the driver to create, mount and unmount named
//! volumes. Each volume maps onto a backing bucket, and a bucket is mounted
//! through FUSE exactly once however many volumes reference it.
//! 
//! ## Features
//! 
//! - Reference-counted mounts shared between volumes of the same bucket
//! - Recovery of mountpoints left stale by a crashed process
//! - Lenient per-volume backend options (`bucket`, `prefix`, `region`, modes, owners)
//! - Volume plugin protocol messages and a Unix socket server
//! 
//! ## Quick Start
//! 
//! ```rust,no_run
//! use bucketvol::{BucketFs, FuseMountFacility, LocalStoreFactory, VolumeDriver};
//! use std::collections::HashMap;
//! 
//! # fn main() -> anyhow::Result<()> {
//! let driver = VolumeDriver::new(
//!     "/mnt/volumes",
//!     FuseMountFacility::<BucketFs>::new(),
//!     LocalStoreFactory::new("/var/lib/bucketvol/store"),
//! );
//! 
//! let options = HashMap::from([("bucket".to_string(), "photos".to_string())]);
//! driver.create("holiday", options);
//! let mountpoint = driver.mount("holiday")?;
//! println!("mounted at {}", mountpoint.display());
//! driver.unmount("holiday")?;
//! # Ok(())
//! # }
//! ```
//! 
//! ## Volume Options
//! 
//! - `bucket`: Backing bucket, defaults to the volume name up to the first `/`
//! - `prefix`: Sub-path of the bucket to expose
//! - `region`, `profile`, `endpoint`, `storage-class`: Passed to the backend
//! - `debugs3`: Boolean, enables backend debug logging
//! - `dir-mode`, `file-mode`, `uid`, `gid`: Numbers, `0x`/`0o`/`0` prefixes accepted

pub mod modules;

pub use modules::backend::{BackendFactory, LocalStoreFactory};
pub use modules::bucketfs::BucketFs;
pub use modules::driver::VolumeDriver;
pub use modules::error::{DriverError, DriverResult};
pub use modules::facility::{FuseMountFacility, MountFacility};

// Re-export commonly used types
pub use modules::config::BackendConfig;
pub use modules::registry::VolumeOptions;
