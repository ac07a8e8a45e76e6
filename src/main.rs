//! Thin CLI around the skylift update engine
//!
//! Shows how a host program embeds the library: the engine is wired to a
//! provider chosen from the operator configuration, and the subcommands map
//! one-to-one onto the engine operations.

use clap::{Parser, Subcommand};
use skylift::config::Config;
use skylift::error::Result;
use skylift::updater::{UpdateStatus, Updater};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

const CURRENT_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[derive(Parser)]
#[command(name = "skylift")]
#[command(author, version, about = "Self-updating toolkit for single-binary tools", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a newer release is available
    Check,

    /// Download, verify and apply the newest release
    Update,

    /// Restore the previous binary
    Rollback,

    /// Repair the installation after an interrupted update
    Recover,

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_target(false)
        .init();

    let config = Config::load_or_default(cli.config.as_deref())?;
    let mut updater = Updater::new(config.provider(), "skylift", CURRENT_VERSION);
    if let Some(key) = config.public_key()? {
        updater = updater.with_public_key(key);
    }

    match cli.command {
        Commands::Check => {
            let latest = updater.latest_version()?;
            if updater.can_update()? {
                println!("update available: {CURRENT_VERSION} -> {latest}");
            } else {
                println!("up to date ({CURRENT_VERSION})");
            }
        }
        Commands::Update => match updater.update() {
            Ok(UpdateStatus::Updated) => println!("✓ updated, restart to run the new version"),
            Ok(UpdateStatus::UpToDate) => println!("already up to date ({CURRENT_VERSION})"),
            Ok(UpdateStatus::Unknown) => println!("no update applied"),
            Err(err) => {
                eprintln!("❌ update failed: {err}");
                std::process::exit(1);
            }
        },
        Commands::Rollback => {
            updater.rollback()?;
            println!("✓ previous version restored");
        }
        Commands::Recover => {
            updater.recover()?;
            println!("✓ installation is consistent");
        }
        Commands::Version => {
            println!("skylift {CURRENT_VERSION}");
        }
    }

    Ok(())
}
