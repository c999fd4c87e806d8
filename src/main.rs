// fwdctl - Control plane for a network-forwarding service
//
// Owns the nested configuration model, projects it into the flat
// environment the forwarder consumes, and supervises the forwarder and
// dashboard processes: spawn, health-gate, interrupt-then-kill shutdown.
//
// Architecture:
// - config: typed settings sections, TOML file I/O, env projection/hydration
// - supervisor: process handles, state machine, liveness polling
// - convert: raw log folder to JSONL batch conversion
// - cli: clap subcommands wiring the above together

mod cli;
mod config;
mod convert;
mod error;
mod supervisor;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "fwdctl=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::Cli::parse();
    cli::dispatch(args).await?;
    Ok(())
}
