//! Volume plugin protocol messages.
//!
//! Request and response bodies use the JSON field names of the container
//! runtime's volume plugin API. [`dispatch`] decodes a request body, runs the
//! matching driver operation and encodes the outcome; failures travel in the
//! `Err` field of the response, never as a transport error.

use super::backend::BackendFactory;
use super::driver::{Capabilities, VolumeDriver, VolumeInfo};
use super::facility::MountFacility;
use super::registry::VolumeOptions;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Body of `VolumeDriver.Create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Volume name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Volume options, absent when the caller gave none.
    #[serde(rename = "Opts", default)]
    pub options: Option<VolumeOptions>,
}

/// Body of every request that only names a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameRequest {
    /// Volume name.
    #[serde(rename = "Name")]
    pub name: String,
}

/// Body of `VolumeDriver.Mount` and `VolumeDriver.Unmount`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MountRequest {
    /// Volume name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Caller's mount id. Not used by the driver.
    #[serde(rename = "ID", default)]
    pub id: String,
}

/// Reply to every plugin call. Empty fields are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Error message, empty on success.
    #[serde(rename = "Err", default, skip_serializing_if = "String::is_empty")]
    pub err: String,
    /// Mountpoint returned by Mount and Path.
    #[serde(rename = "Mountpoint", default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<PathBuf>,
    /// Volume returned by Get.
    #[serde(rename = "Volume", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeInfo>,
    /// Volumes returned by List.
    #[serde(rename = "Volumes", default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<VolumeInfo>>,
    /// Capabilities returned by Capabilities.
    #[serde(rename = "Capabilities", default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    /// Plugin kinds returned by Activate.
    #[serde(rename = "Implements", default, skip_serializing_if = "Option::is_none")]
    pub implements: Option<Vec<String>>,
}

impl Response {
    /// Failed reply carrying `msg`.
    pub fn error(msg: impl ToString) -> Self {
        Self {
            err: msg.to_string(),
            ..Default::default()
        }
    }

    /// Whether the reply reports a failure.
    pub fn is_err(&self) -> bool {
        !self.err.is_empty()
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, Response> {
    // Some runtimes send no body at all for argument-less calls.
    let body = if body.is_null() {
        Value::Object(Default::default())
    } else {
        body
    };
    serde_json::from_value(body).map_err(|e| Response::error(format!("invalid request: {}", e)))
}

/// Runs plugin `method` against `driver`.
pub fn dispatch<M, B>(driver: &VolumeDriver<M, B>, method: &str, body: Value) -> Response
where
    M: MountFacility,
    B: BackendFactory<Backend = M::Backend>,
{
    match handle(driver, method, body) {
        Ok(response) | Err(response) => response,
    }
}

fn handle<M, B>(driver: &VolumeDriver<M, B>, method: &str, body: Value) -> Result<Response, Response>
where
    M: MountFacility,
    B: BackendFactory<Backend = M::Backend>,
{
    let response = match method.trim_start_matches('/') {
        "Plugin.Activate" => Response {
            implements: Some(vec!["VolumeDriver".to_string()]),
            ..Default::default()
        },
        "VolumeDriver.Create" => {
            let req: CreateRequest = decode(body)?;
            driver.create(&req.name, req.options.unwrap_or_default());
            Response::default()
        }
        "VolumeDriver.Get" => {
            let req: NameRequest = decode(body)?;
            let volume = driver.get(&req.name).map_err(Response::error)?;
            Response {
                volume: Some(volume),
                ..Default::default()
            }
        }
        "VolumeDriver.List" => Response {
            volumes: Some(driver.list()),
            ..Default::default()
        },
        "VolumeDriver.Remove" => {
            let req: NameRequest = decode(body)?;
            driver.remove(&req.name);
            Response::default()
        }
        "VolumeDriver.Path" => {
            let req: NameRequest = decode(body)?;
            Response {
                mountpoint: Some(driver.path(&req.name)),
                ..Default::default()
            }
        }
        "VolumeDriver.Mount" => {
            let req: MountRequest = decode(body)?;
            let mountpoint = driver.mount(&req.name).map_err(Response::error)?;
            Response {
                mountpoint: Some(mountpoint),
                ..Default::default()
            }
        }
        "VolumeDriver.Unmount" => {
            let req: MountRequest = decode(body)?;
            driver.unmount(&req.name).map_err(Response::error)?;
            Response::default()
        }
        "VolumeDriver.Capabilities" => Response {
            capabilities: Some(driver.capabilities()),
            ..Default::default()
        },
        other => Response::error(format!("unknown method {}", other)),
    };
    Ok(response)
}
