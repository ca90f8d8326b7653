mod cli;
mod config;
mod dispatcher;
mod error;
mod local_client;
mod transport;
mod worker;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let mut cfg = config::AgentConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    // Override with command line arguments
    if let Some(listen) = args.listen {
        cfg.comsat_listen_addr = listen;
    }
    if let Some(container) = args.container {
        cfg.container_addr = container;
    }
    if let Some(log_level) = args.log_level {
        cfg.log_level = log_level;
    }
    if let Some(log_dir) = args.log_dir {
        cfg.log_dir = Some(log_dir);
    }

    let _log_guard = common::init_tracing(cfg.log_dir.as_deref(), &cfg.log_file, &cfg.log_level);

    // Parsed after tracing is up so an unrecognized value gets its warning.
    if let Some(mode) = args.mode {
        cfg.mode = config::Mode::parse(&mode);
    }

    info!(
        "Starting ComSat agent in {} mode, container at {}",
        cfg.mode.as_str(),
        cfg.container_addr
    );

    let cfg = Arc::new(cfg);
    let dispatcher = Arc::new(dispatcher::ClientDispatcher::new(cfg.clone()));
    let intake = transport::ComSatIntake::bind(cfg, dispatcher)?;
    intake.run()?;
    Ok(())
}
