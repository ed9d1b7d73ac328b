//! Environment preparation and cache cleanup

use colored::Colorize;
use compat_runtime::constants::{
    ANSIBLE_COLLECTIONS_PATH, ANSIBLE_COLLECTIONS_PATHS, ANSIBLE_LIBRARY, ANSIBLE_ROLES_PATH,
};
use compat_runtime::{NameCheck, PrepareOptions};

use super::open_runtime;
use crate::cli::RuntimeArgs;
use crate::error::Result;

/// Run the prepare command
pub fn run_prepare(
    args: &RuntimeArgs,
    offline: bool,
    install_local: bool,
    retry: bool,
    role_name_check: NameCheck,
) -> Result<()> {
    let mut runtime = open_runtime(args)?;
    let opts = PrepareOptions {
        retry,
        install_local,
        offline,
        role_name_check,
        ..PrepareOptions::default()
    };
    runtime.prepare_environment(&opts)?;

    println!(
        "{} Prepared {} (cache {})",
        "+".green(),
        runtime.project_dir().display(),
        runtime.cache_dir().path().display()
    );
    for (name, value) in runtime.environ() {
        if is_search_path(name) {
            println!("  {}={}", name.cyan(), value);
        }
    }
    Ok(())
}

/// Variables rewritten by environment preparation.
fn is_search_path(name: &str) -> bool {
    [
        ANSIBLE_LIBRARY,
        ANSIBLE_ROLES_PATH,
        ANSIBLE_COLLECTIONS_PATH,
        ANSIBLE_COLLECTIONS_PATHS,
    ]
    .contains(&name)
}

/// Run the clean command
pub fn run_clean(args: &RuntimeArgs) -> Result<()> {
    let runtime = open_runtime(args)?;
    runtime.clean()?;
    println!(
        "{} Removed {}",
        "+".green(),
        runtime.cache_dir().path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_path_variables() {
        assert!(is_search_path("ANSIBLE_LIBRARY"));
        assert!(is_search_path("ANSIBLE_ROLES_PATH"));
        assert!(is_search_path("ANSIBLE_COLLECTIONS_PATH"));
        assert!(is_search_path("ANSIBLE_COLLECTIONS_PATHS"));
        assert!(!is_search_path("ANSIBLE_CONFIG_PATH"));
        assert!(!is_search_path("PATH"));
    }
}
