//! Single-collection commands

use colored::Colorize;
use std::path::Path;

use super::open_runtime;
use crate::cli::RuntimeArgs;
use crate::error::Result;

/// Run the require command
pub fn run_require(
    args: &RuntimeArgs,
    name: &str,
    version: Option<&str>,
    install: bool,
) -> Result<()> {
    let runtime = open_runtime(args)?;
    let found = runtime.require_collection(name, version, install)?;
    println!(
        "{} {} {} ({})",
        "+".green(),
        found.fqcn().cyan(),
        found.version,
        found.path.display()
    );
    Ok(())
}

/// Run the install command
pub fn run_install(
    args: &RuntimeArgs,
    reference: &str,
    destination: Option<&Path>,
    force: bool,
) -> Result<()> {
    let runtime = open_runtime(args)?;
    runtime.install_collection(reference, destination, force)?;
    println!("{} Installed {}", "+".green(), reference.cyan());
    Ok(())
}
