//! Command-line interface
//!
//! Subcommands: `run` (start the forwarder, optionally the dashboard, and
//! supervise until interrupted), `convert` (log-to-JSONL batch
//! conversion), `gen-config` (write the default projection as a `.env`
//! file), and `config` (inspect or reset the config file).

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{Config, VERSION};
use crate::convert::run_convert;
use crate::error::ControlError;
use crate::supervisor::{StartOptions, StopTarget, Supervisor};

/// Control plane for the forwarding service
#[derive(Parser)]
#[command(name = "fwdctl")]
#[command(version = VERSION)]
#[command(about = "Control plane for the forwarding service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the forwarder and supervise it until interrupted
    Run {
        /// Forwarder listen port
        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// Forwarder worker count
        #[arg(long, default_value_t = 1)]
        workers: u16,

        /// Also start the dashboard process
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        start_ui: bool,

        /// Dashboard listen port
        #[arg(long, default_value_t = 8001)]
        ui_port: u16,
    },

    /// Convert raw log files into a structured JSONL file
    Convert {
        /// Folder containing `*.log` files; defaults to every configured
        /// openai route's log location
        #[arg(long)]
        log_folder: Option<PathBuf>,

        /// Output file (requires --log-folder)
        #[arg(long)]
        target_path: Option<PathBuf>,
    },

    /// Write a generated .env file derived from the default configuration
    GenConfig {
        /// Output directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Manage the configuration file
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,
    },
}

pub async fn dispatch(cli: Cli) -> Result<(), ControlError> {
    match cli.command {
        Commands::Run {
            port,
            workers,
            start_ui,
            ui_port,
        } => handle_run(port, workers, start_ui, ui_port).await,
        Commands::Convert {
            log_folder,
            target_path,
        } => run_convert(log_folder.as_deref(), target_path.as_deref()),
        Commands::GenConfig { dir } => handle_gen_config(&dir),
        Commands::Config { show, path, reset } => handle_config(show, path, reset),
    }
}

async fn handle_run(
    port: u16,
    workers: u16,
    start_ui: bool,
    ui_port: u16,
) -> Result<(), ControlError> {
    let config = Config::load()?;
    for warning in config.validate() {
        tracing::warn!("{warning}");
    }
    let env = config.to_env()?;

    let mut supervisor = Supervisor::new();
    supervisor
        .start(StartOptions {
            port,
            workers,
            env,
        })
        .await?;
    if start_ui {
        supervisor.start_dashboard(ui_port).await?;
    }

    tracing::info!(port, state = ?supervisor.forwarder_state(), "serving; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    supervisor.stop(StopTarget::Both).await
}

fn handle_gen_config(dir: &std::path::Path) -> Result<(), ControlError> {
    let path = Config::default().write_env_file(dir)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn handle_config(show: bool, path: bool, reset: bool) -> Result<(), ControlError> {
    if path {
        match Config::config_path() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Error: could not determine config path"),
        }
    } else if show {
        let config = Config::load()?;
        println!("# Effective configuration (env > file > defaults)");
        println!();
        print!("{}", config.to_toml());
    } else if reset {
        Config::default().save()?;
        if let Some(p) = Config::config_path() {
            println!("Reset {}", p.display());
        }
    } else {
        println!("Usage: fwdctl config [--show|--path|--reset]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --path    Show config file path");
        println!("  --reset   Reset config file to defaults");
    }
    Ok(())
}
