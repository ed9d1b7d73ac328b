//! Exit codes, environment variable names and user-facing messages.

/// Configuration could not be loaded or validated.
pub const INVALID_CONFIG_RC: i32 = 2;
/// The runtime executable is missing or does not work.
pub const ANSIBLE_MISSING_RC: i32 = 4;
/// Exit code the runtime uses for option errors, e.g. no usable paths.
pub const RC_ANSIBLE_OPTIONS_ERROR: i32 = 5;
/// A required collection, role or requirements file is unusable.
pub const INVALID_PREREQUISITES_RC: i32 = 10;
/// Everything else.
pub const GENERIC_ERROR_RC: i32 = 1;

pub const ANSIBLE_LIBRARY: &str = "ANSIBLE_LIBRARY";
pub const ANSIBLE_ROLES_PATH: &str = "ANSIBLE_ROLES_PATH";
pub const ANSIBLE_COLLECTIONS_PATH: &str = "ANSIBLE_COLLECTIONS_PATH";
/// Spelling used by runtimes older than the configured threshold.
pub const ANSIBLE_COLLECTIONS_PATHS: &str = "ANSIBLE_COLLECTIONS_PATHS";

/// Forced on every child process.
pub const CHILD_ENV: &[(&str, &str)] = &[
    ("ANSIBLE_DEBUG", "0"),
    ("ANSIBLE_VERBOSE_TO_STDERR", "True"),
    ("ANSIBLE_FORCE_COLOR", "0"),
];

/// Emitted by the collection lister when none of its paths exist.
pub const NO_USABLE_PATHS: &str = "None of the provided paths were usable";

/// Warned when collection paths cannot be extended from the interpreter.
pub const MSG_SCAN_DISABLED: &str = "ANSIBLE_COLLECTIONS_SCAN_SYS_PATH is disabled, not patching collection paths. This may lead to unexpected behavior when using dev tools and prevent full isolation from user environment.";

/// Asks the interpreter for its import path and site-packages directories.
pub const PYTHON_SEARCH_PATHS: &str = "import json, site, sys; print(json.dumps({'sys_path': sys.path, 'site_packages': site.getsitepackages()}))";

/// Prefix the runtime puts in front of warnings on stderr.
pub const WARNING_PREFIX: &str = "[WARNING]:";

/// Explains how to fix a role whose computed name is not acceptable.
/// `{0}` is replaced by the computed name.
pub const MSG_INVALID_FQRL: &str = "\
Computed fully qualified role name of {0} does not follow current galaxy requirements.
Please edit meta/main.yml and assure we can correctly determine full role name:

galaxy_info:
role_name: my_name  # if absent directory name hosting role is used instead
namespace: my_galaxy_namespace  # if absent, author is used instead

Namespace: https://old-galaxy.ansible.com/docs/contributing/namespaces.html#galaxy-namespace-limitations
Role: https://old-galaxy.ansible.com/docs/contributing/creating_role.html#role-names

As an alternative, you can relax the check with --role-name-check warn or bypass.
";
