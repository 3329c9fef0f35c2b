//! OC-Admin: operator CLI for the Overlay-Controller.
//!
//! Works directly on a controller's JSON record directory, through the same
//! service the controller runs, so every mutation follows the controller's
//! validation and revision rules.
//!
//! ## Usage
//!
//! ```bash
//! # Create a public network owned by controller 8056c2e21c
//! oc-admin --data-dir ./controller.d --controller 8056c2e21c network create --name lab --public
//!
//! # Authorize a member
//! oc-admin --data-dir ./controller.d --controller 8056c2e21c \
//!     member authorize 8056c2e21c000001 deadbeef01
//!
//! # Dry-run the decision a node would get
//! oc-admin --data-dir ./controller.d --controller 8056c2e21c simulate 8056c2e21c000001 deadbeef01
//! ```

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use oc_01_network_controller::{
    ControllerConfig, ControllerDependencies, ControllerService, JsonDirectoryStore, NodeAddress,
    SystemTimeSource,
};
use oc_telemetry::{init_telemetry, TelemetryConfig};

use commands::Command;

/// Overlay-Controller admin CLI
#[derive(Parser, Debug)]
#[command(name = "oc-admin")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller record directory
    #[arg(long, default_value = "./controller.d")]
    data_dir: PathBuf,

    /// Node address of the controller (10 hex digits)
    #[arg(long)]
    controller: NodeAddress,

    /// Optional TOML file with a [controller] section
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    telemetry.service_name = "oc-admin".to_string();
    if args.verbose {
        telemetry = telemetry.with_log_level("debug");
    }
    let _guard = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = match &args.config {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    debug!(
        data_dir = %args.data_dir.display(),
        controller = %args.controller,
        "Opening record store"
    );

    let service = ControllerService::new(
        args.controller,
        config,
        ControllerDependencies {
            store: Arc::new(JsonDirectoryStore::new(&args.data_dir)),
            time_source: Arc::new(SystemTimeSource::new()),
        },
    );

    let output = commands::run(&service, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
