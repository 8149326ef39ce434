//! Backend configuration derived from volume options.
//!
//! Option values are parsed leniently: a malformed number or boolean leaves
//! the default in place and is reported only through the log.

use super::constants::*;
use super::registry::VolumeOptions;
use log::debug;
use nix::unistd::{getgid, getuid};

/// Settings handed to the filesystem backend factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Remote identifier, `bucket` or `bucket:prefix`.
    pub bucket: String,
    /// Backend region.
    pub region: String,
    /// Shared-credentials profile name.
    pub profile: Option<String>,
    /// Endpoint URL, `file://` for a local store.
    pub endpoint: Option<String>,
    /// Storage class for new objects.
    pub storage_class: String,
    /// Backend debug logging.
    pub debug_s3: bool,
    /// Permission bits of directories.
    pub dir_mode: u32,
    /// Permission bits of files.
    pub file_mode: u32,
    /// Owner of every entry.
    pub uid: u32,
    /// Group of every entry.
    pub gid: u32,
}

impl BackendConfig {
    /// Defaults for `bucket`, owned by the running process.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            profile: None,
            endpoint: None,
            storage_class: DEFAULT_STORAGE_CLASS.to_string(),
            debug_s3: false,
            dir_mode: DEFAULT_DIR_MODE,
            file_mode: DEFAULT_FILE_MODE,
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
        }
    }

    /// Effective configuration for a volume backed by `resource`.
    pub fn from_options(resource: &str, options: &VolumeOptions) -> Self {
        let mut bucket = options
            .get(OPT_BUCKET)
            .filter(|bucket| !bucket.is_empty())
            .cloned()
            .unwrap_or_else(|| resource.to_string());
        if let Some(prefix) = options.get(OPT_PREFIX) {
            bucket = format!("{}:{}", bucket, prefix);
        }

        let mut config = Self::new(bucket);
        if let Some(region) = options.get(OPT_REGION) {
            config.region = region.clone();
        }
        config.profile = options.get(OPT_PROFILE).cloned();
        config.endpoint = options.get(OPT_ENDPOINT).cloned();
        if let Some(class) = options.get(OPT_STORAGE_CLASS) {
            config.storage_class = class.clone();
        }

        config.debug_s3 = parse_or(config.debug_s3, options.get(OPT_DEBUG_S3), parse_bool);
        config.dir_mode = parse_or(config.dir_mode, options.get(OPT_DIR_MODE), parse_u32);
        config.file_mode = parse_or(config.file_mode, options.get(OPT_FILE_MODE), parse_u32);
        config.uid = parse_or(config.uid, options.get(OPT_UID), parse_u32);
        config.gid = parse_or(config.gid, options.get(OPT_GID), parse_u32);
        config
    }

    /// Bucket name without the prefix part.
    pub fn bucket_name(&self) -> &str {
        self.bucket.split_once(':').map_or(self.bucket.as_str(), |(b, _)| b)
    }

    /// Prefix inside the bucket, if one was requested.
    pub fn prefix(&self) -> Option<&str> {
        self.bucket.split_once(':').map(|(_, p)| p)
    }
}

/// Parses `raw` with `parse`, keeping `default` when absent or malformed.
pub fn parse_or<T, F>(default: T, raw: Option<&String>, parse: F) -> T
where
    F: Fn(&str) -> Option<T>,
{
    match raw {
        Some(value) => parse(value.as_str()).unwrap_or_else(|| {
            debug!("Ignoring malformed option value {:?}", value);
            default
        }),
        None => default,
    }
}

/// Unsigned 32-bit integer with an optional `0x`, `0o`, `0b` or `0` base prefix.
pub fn parse_u32(raw: &str) -> Option<u32> {
    let lower = raw.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}

/// Boolean in any of the spellings `1 t T TRUE true True` and their negatives.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
