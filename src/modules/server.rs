//! Local socket front end.
//!
//! Clients write one JSON envelope per line, `{"method": "...", "body": {...}}`,
//! and read back one [`Response`] line per request. Driver calls can block in
//! the mount facility, so they run on the blocking thread pool.

use super::backend::BackendFactory;
use super::driver::VolumeDriver;
use super::facility::MountFacility;
use super::plugin::{self, Response};
use anyhow::{Context, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// One request on the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Plugin method, e.g. `VolumeDriver.Mount`.
    pub method: String,
    /// Request body for the method.
    #[serde(default)]
    pub body: Value,
}

/// Serves a driver on a Unix socket.
pub struct PluginServer<M, B> {
    socket: PathBuf,
    driver: Arc<VolumeDriver<M, B>>,
}

impl<M, B> PluginServer<M, B>
where
    M: MountFacility + 'static,
    B: BackendFactory<Backend = M::Backend> + 'static,
{
    /// Server for `driver` on `socket`. Nothing is bound until [`Self::bind`].
    pub fn new(socket: impl Into<PathBuf>, driver: Arc<VolumeDriver<M, B>>) -> Self {
        Self {
            socket: socket.into(),
            driver,
        }
    }

    /// Binds the socket, replacing a leftover socket file.
    pub fn bind(&self) -> Result<UnixListener> {
        if let Some(parent) = self.socket.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating socket directory {}", parent.display()))?;
        }
        if self.socket.exists() {
            fs::remove_file(&self.socket)
                .with_context(|| format!("removing stale socket {}", self.socket.display()))?;
        }
        let listener = UnixListener::bind(&self.socket)
            .with_context(|| format!("binding {}", self.socket.display()))?;
        info!("Listening on {}", self.socket.display());
        Ok(listener)
    }

    /// Accepts connections until the listener fails.
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            let (stream, _) = listener.accept().await?;
            let driver = self.driver.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(driver, stream).await {
                    error!("Connection error: {:#}", e);
                }
            });
        }
    }

    /// Serves until `shutdown` completes, then removes the socket file.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind()?;
        let result = tokio::select! {
            res = self.serve(listener) => res,
            _ = shutdown => {
                info!("Shutting down plugin server");
                Ok(())
            }
        };
        if let Err(e) = fs::remove_file(&self.socket) {
            debug!("Could not remove socket {}: {}", self.socket.display(), e);
        }
        result
    }
}

async fn handle_connection<M, B>(driver: Arc<VolumeDriver<M, B>>, stream: UnixStream) -> Result<()>
where
    M: MountFacility + 'static,
    B: BackendFactory<Backend = M::Backend> + 'static,
{
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => {
                debug!("Request {}", envelope.method);
                let driver = driver.clone();
                tokio::task::spawn_blocking(move || {
                    plugin::dispatch(&driver, &envelope.method, envelope.body)
                })
                .await?
            }
            Err(e) => Response::error(format!("invalid envelope: {}", e)),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
    }
    Ok(())
}
