mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vmclone_inventory::{DEFAULT_CONFIG_FILE, load_config};

use crate::commands::Commands;
use crate::error::{CliError, Result};

#[derive(Parser)]
#[command(name = "vmclone")]
#[command(version)]
#[command(about = "Clone bhyve VMs together with their ZFS-backed disks", long_about = None)]
struct Cli {
    /// Configuration file (a missing file means defaults)
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;
    let config = load_config(&cli.config).map_err(CliError::Config)?;
    tracing::debug!(
        config = %cli.config.display(),
        inventory = %config.inventory().display(),
        "loaded configuration"
    );
    cli.command.execute(&config, cli.verbose)
}

/// `RUST_LOG` wins over the `-v` count.
fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
