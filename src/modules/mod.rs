//! Core driver modules.
//! 
//! This module provides the main components of the driver:
//! 
//! - `constants`: Default paths, option keys and filesystem constants
//! - `registry`: Registered volumes and their options
//! - `refcount`: Mount reference counts per backing resource
//! - `mountpoint`: Mountpoint and backing resource resolution
//! - `mount`: Mount and unmount orchestration
//! - `driver`: The public volume operation surface
//! - `plugin`: Volume plugin protocol messages
//! - `server`: Unix socket front end

pub mod backend;
/// Bucket filesystem served through FUSE.
pub mod bucketfs;
pub mod config;
/// Default paths, option keys and filesystem constants.
pub mod constants;
pub mod driver;
pub mod error;
pub mod facility;
pub mod mount;
pub mod mountpoint;
pub mod plugin;
/// Mount reference counts per backing resource.
pub mod refcount;
/// Registered volumes and their options.
pub mod registry;
pub mod server;
