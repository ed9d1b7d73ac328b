//! CLI argument parsing using clap derive

use clap::{ArgAction, Args, Parser, Subcommand};
use compat_runtime::NameCheck;
use std::path::PathBuf;

/// ansible-compat - Prepare a project's Ansible runtime environment
#[derive(Parser, Debug)]
#[command(name = "ansible-compat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub runtime: RuntimeArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that needs a runtime.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RuntimeArgs {
    /// Project directory
    #[arg(long, global = true, default_value = ".", env = "ANSIBLE_COMPAT_PROJECT_DIR")]
    pub project_dir: PathBuf,

    /// Install dependencies into a project-local cache
    #[arg(long, global = true)]
    pub isolated: bool,

    /// Retry failed installer calls this many times
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Options file (defaults to <project>/.ansible-compat.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the detected runtime version
    Version,

    /// Print a value from the runtime configuration
    Config {
        /// Setting name, e.g. COLLECTIONS_PATHS
        key: String,
    },

    /// Install project dependencies and wire search paths
    ///
    /// Examples:
    ///   ansible-compat prepare --isolated
    ///   ansible-compat prepare --install-local --role-name-check warn
    Prepare {
        /// Skip anything that needs network access
        #[arg(long)]
        offline: bool,

        /// Also install the project itself and its galaxy.yml dependencies
        #[arg(long)]
        install_local: bool,

        /// Retry transient installer failures
        #[arg(long)]
        retry: bool,

        /// How strictly standalone role names are checked
        #[arg(long, default_value = "strict")]
        role_name_check: NameCheck,
    },

    /// Ensure a collection is installed, at least at a given version
    Require {
        /// Collection name, e.g. community.general
        name: String,

        /// Minimum version
        #[arg(long)]
        version: Option<String>,

        /// Only check, never install
        #[arg(long)]
        no_install: bool,
    },

    /// Install a single collection reference
    Install {
        /// Name, name:constraint, archive, path or git URL
        reference: String,

        /// Directory to install into
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Reinstall even if present
        #[arg(long)]
        force: bool,
    },

    /// Remove the cache directory
    Clean,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_version_defaults() {
        let cli = Cli::parse_from(["ansible-compat", "version"]);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.command, Commands::Version);
        assert_eq!(cli.runtime.project_dir, PathBuf::from("."));
        assert!(!cli.runtime.isolated);
        assert_eq!(cli.runtime.max_retries, None);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "ansible-compat",
            "clean",
            "--isolated",
            "--project-dir",
            "/srv/project",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.runtime.isolated);
        assert_eq!(cli.runtime.project_dir, PathBuf::from("/srv/project"));
    }

    #[test]
    fn parse_prepare() {
        let cli = Cli::parse_from([
            "ansible-compat",
            "prepare",
            "--offline",
            "--role-name-check",
            "warn",
            "--max-retries",
            "3",
        ]);
        assert_eq!(cli.runtime.max_retries, Some(3));
        assert_eq!(
            cli.command,
            Commands::Prepare {
                offline: true,
                install_local: false,
                retry: false,
                role_name_check: NameCheck::Warn,
            }
        );
    }

    #[test]
    fn prepare_defaults_to_strict() {
        let cli = Cli::parse_from(["ansible-compat", "prepare"]);
        assert!(matches!(
            cli.command,
            Commands::Prepare {
                role_name_check: NameCheck::Strict,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_role_name_check() {
        let result = Cli::try_parse_from(["ansible-compat", "prepare", "--role-name-check", "loose"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_require() {
        let cli = Cli::parse_from([
            "ansible-compat",
            "require",
            "community.general",
            "--version",
            "9.0.0",
            "--no-install",
        ]);
        assert_eq!(
            cli.command,
            Commands::Require {
                name: "community.general".into(),
                version: Some("9.0.0".into()),
                no_install: true,
            }
        );
    }

    #[test]
    fn parse_install() {
        let cli = Cli::parse_from([
            "ansible-compat",
            "install",
            "acme.web:>=1.0",
            "--destination",
            "/tmp/collections",
            "--force",
        ]);
        assert_eq!(
            cli.command,
            Commands::Install {
                reference: "acme.web:>=1.0".into(),
                destination: Some(PathBuf::from("/tmp/collections")),
                force: true,
            }
        );
    }

    #[test]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["ansible-compat"]).is_err());
    }
}
