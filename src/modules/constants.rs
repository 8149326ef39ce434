use std::time::Duration;

// Driver defaults
/// Directory holding one mountpoint per backing resource.
pub const DEFAULT_ROOT: &str = "/mnt/volumes";
/// Socket the plugin server listens on.
pub const DEFAULT_SOCKET: &str = "/run/docker/plugins/bucketvol.sock";
/// Local object store with one directory per bucket.
pub const DEFAULT_STORE: &str = "/var/lib/bucketvol/store";
/// Scope reported by Capabilities.
pub const SCOPE: &str = "local";

// Backend defaults
/// Region used when a volume names none.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Storage class used when a volume names none.
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";
/// Permission bits reported for directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;
/// Permission bits reported for files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

// Recognized volume options
/// Remote bucket, overrides the name-derived resource.
pub const OPT_BUCKET: &str = "bucket";
/// Sub-path inside the bucket.
pub const OPT_PREFIX: &str = "prefix";
/// Backend region.
pub const OPT_REGION: &str = "region";
/// Shared-credentials profile.
pub const OPT_PROFILE: &str = "profile";
/// Backend endpoint URL.
pub const OPT_ENDPOINT: &str = "endpoint";
/// Backend storage class.
pub const OPT_STORAGE_CLASS: &str = "storage-class";
/// Backend debug logging, boolean.
pub const OPT_DEBUG_S3: &str = "debugs3";
/// Directory permission bits.
pub const OPT_DIR_MODE: &str = "dir-mode";
/// File permission bits.
pub const OPT_FILE_MODE: &str = "file-mode";
/// Owner uid of every entry.
pub const OPT_UID: &str = "uid";
/// Owner gid of every entry.
pub const OPT_GID: &str = "gid";

// File system constants
/// Attribute and entry cache lifetime.
pub const TTL: Duration = Duration::from_secs(1);
/// Block size reported in file attributes.
pub const BLOCK_SIZE: u64 = 512;
/// Inode of the bucket root.
pub const ROOT_INODE: u64 = 1;
/// First inode handed to other entries.
pub const INITIAL_INODE: u64 = 2;
