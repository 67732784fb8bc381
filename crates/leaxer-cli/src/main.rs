//! Leaxer CLI - backend detection and inference server launching.
//!
//! Thin front end over leaxer-core: inspect the detected compute backends and
//! start a native server binary with its runtime libraries on the loader path.

mod commands;
mod interrupt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use leaxer_core::config::AppConfig;
use leaxer_core::LaunchStrategy;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "leaxer")]
#[command(about = "Compute backend detection and inference server launcher")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Settings file holding `compute_backend` (defaults to the user config dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Root of the bundled per-backend binaries
    #[arg(long, global = true, default_value = "bin")]
    bin_root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the backends usable on this machine
    Backends,

    /// Show detected GPUs per vendor
    GpuInfo {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective backend
    Resolve {
        /// Preference to resolve instead of the stored setting
        #[arg(long)]
        preference: Option<String>,
    },

    /// Start an executable and stream its output until it exits
    Launch {
        /// Directory holding the runtime libraries (defaults to the executable's directory)
        #[arg(long)]
        lib_dir: Option<PathBuf>,

        /// Extra environment variable for the child
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Windows launch strategy
        #[arg(long, default_value = "direct", value_parser = parse_strategy)]
        strategy: LaunchStrategy,

        /// Runtime library that must exist in the library directory
        #[arg(long)]
        critical_lib: Option<String>,

        /// Executable to launch
        exe: PathBuf,

        /// Arguments passed to the executable
        #[arg(last = true)]
        args: Vec<String>,
    },
}

fn parse_env_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn parse_strategy(s: &str) -> std::result::Result<LaunchStrategy, String> {
    s.parse::<LaunchStrategy>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging. RUST_LOG overrides the default level.
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    tracing::debug!("{} CLI {}", AppConfig::APP_NAME, env!("CARGO_PKG_VERSION"));

    let ctx = commands::Context::new(args.settings, args.bin_root)?;

    match args.command {
        Command::Backends => commands::backends(&ctx).await,
        Command::GpuInfo { json } => commands::gpu_info(&ctx, json).await,
        Command::Resolve { preference } => commands::resolve(&ctx, preference.as_deref()).await,
        Command::Launch {
            lib_dir,
            env,
            strategy,
            critical_lib,
            exe,
            args,
        } => {
            let launch = commands::LaunchArgs {
                lib_dir,
                env,
                strategy,
                critical_lib,
                exe,
                args,
            };
            commands::launch(launch).await
        }
    }
}
