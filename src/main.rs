use anyhow::Result;
use bucketvol::modules::constants::{DEFAULT_ROOT, DEFAULT_SOCKET, DEFAULT_STORE};
use bucketvol::modules::server::PluginServer;
use bucketvol::{BucketFs, FuseMountFacility, LocalStoreFactory, VolumeDriver};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Volumes root directory
    #[arg(long, default_value = DEFAULT_ROOT)]
    root: PathBuf,

    /// Plugin socket path
    #[arg(long, default_value = DEFAULT_SOCKET)]
    socket: PathBuf,

    /// Local object store holding one directory per bucket
    #[arg(long, default_value = DEFAULT_STORE)]
    store: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger based on verbose flag
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new().filter_level(log_level).init();

    info!("Starting bucketvol with root {}", cli.root.display());

    let driver = Arc::new(VolumeDriver::new(
        cli.root,
        FuseMountFacility::<BucketFs>::new(),
        LocalStoreFactory::new(cli.store),
    ));
    let server = PluginServer::new(cli.socket, driver);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    server.run_until(shutdown).await?;

    info!("bucketvol stopped");
    Ok(())
}
