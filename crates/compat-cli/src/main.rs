//! ansible-compat CLI
//!
//! Thin command-line front end over the `compat_runtime` facade.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = execute_command(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.code());
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the default `warn` level.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .try_init();
}

fn execute_command(cli: Cli) -> Result<()> {
    let args = &cli.runtime;
    match cli.command {
        Commands::Version => commands::run_version(args),
        Commands::Config { key } => commands::run_config(args, &key),
        Commands::Prepare {
            offline,
            install_local,
            retry,
            role_name_check,
        } => commands::run_prepare(args, offline, install_local, retry, role_name_check),
        Commands::Require {
            name,
            version,
            no_install,
        } => commands::run_require(args, &name, version.as_deref(), !no_install),
        Commands::Install {
            reference,
            destination,
            force,
        } => commands::run_install(args, &reference, destination.as_deref(), force),
        Commands::Clean => commands::run_clean(args),
    }
}
