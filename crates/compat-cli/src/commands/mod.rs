//! Command implementations for compat-cli

pub mod collection;
pub mod info;
pub mod prepare;

pub use collection::{run_install, run_require};
pub use info::{run_config, run_version};
pub use prepare::{run_clean, run_prepare};

use crate::cli::RuntimeArgs;
use crate::error::Result;
use compat_runtime::{Runtime, RuntimeOptions};

/// Build a runtime for the shared command-line options.
///
/// `--config` takes precedence over the project's own options file.
pub(crate) fn open_runtime(args: &RuntimeArgs) -> Result<Runtime> {
    let options = match &args.config {
        Some(path) => RuntimeOptions::load(path)?,
        None => RuntimeOptions::discover(&args.project_dir)?,
    };
    tracing::debug!(
        project = %args.project_dir.display(),
        isolated = args.isolated,
        "Opening runtime"
    );
    let mut builder = Runtime::builder(&args.project_dir)
        .isolated(args.isolated)
        .options(options);
    if let Some(retries) = args.max_retries {
        builder = builder.max_retries(retries);
    }
    Ok(builder.build()?)
}
