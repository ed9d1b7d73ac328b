//! Role identity and standalone role installation.
//!
//! A role checked out on its own is made visible to the runtime by
//! symlinking the project directory into the cache roles directory under
//! its fully qualified name, `namespace.role_name`.

use crate::constants::MSG_INVALID_FQRL;
use crate::error::{Error, Result};
use crate::sink::WarningSink;
use compat_fs::{ProjectPath, load_yaml};
use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

static VALID_FQRN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_]+\.[a-z][a-z0-9_]+$").expect("static regex")
});

/// Author fields like "Jane Doe" are personal names, not namespaces.
static PERSONAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+ \w+").expect("static regex"));

/// Directory prefixes stripped when deriving a role name, longest first.
const ROLE_DIR_PREFIXES: &[&str] = &["ansible-role-", "ansible-"];

/// How strictly computed role names are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCheck {
    /// Invalid names are fatal.
    #[default]
    Strict,
    /// Invalid names are reported and used anyway.
    Warn,
    /// Names are not checked. Without an explicit `role_name` the raw
    /// directory name is used.
    Bypass,
}

impl NameCheck {
    /// Numeric levels, 0 strict, 1 warn, 2 bypass.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Strict),
            1 => Some(Self::Warn),
            2 => Some(Self::Bypass),
            _ => None,
        }
    }
}

impl FromStr for NameCheck {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" | "0" => Ok(Self::Strict),
            "warn" | "1" => Ok(Self::Warn),
            "bypass" | "2" => Ok(Self::Bypass),
            other => Err(format!(
                "unknown role name check '{other}', expected strict, warn or bypass"
            )),
        }
    }
}

/// Namespace and name of a role. An empty namespace means unqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleIdentity {
    pub namespace: String,
    pub name: String,
}

impl RoleIdentity {
    /// Derive the identity from the `galaxy_info` block of role metadata.
    ///
    /// The namespace is `namespace`, falling back to `author`. An author
    /// that looks like a personal name yields no namespace. The name is
    /// `role_name`, falling back to the project directory name with
    /// `ansible-role-`/`ansible-` prefixes and dotted qualifiers removed.
    pub fn resolve(galaxy_info: &Mapping, project_dir: &Path) -> Result<Self> {
        Ok(Self {
            namespace: role_namespace(galaxy_info)?,
            name: role_name(galaxy_info).unwrap_or_else(|| dir_role_name(project_dir)),
        })
    }

    /// `namespace.name`, or just `name` without a namespace.
    pub fn fqrn(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

pub fn is_valid_fqrn(name: &str) -> bool {
    VALID_FQRN.is_match(name)
}

fn role_namespace(galaxy_info: &Mapping) -> Result<String> {
    let explicit = galaxy_info
        .get("namespace")
        .filter(|v| !matches!(v, Value::Null) && v.as_str() != Some(""));
    let Some(value) = explicit.or_else(|| galaxy_info.get("author")) else {
        return Ok(String::new());
    };
    match value {
        Value::Null => Ok(String::new()),
        Value::String(ns) if PERSONAL_NAME.is_match(ns) => Ok(String::new()),
        Value::String(ns) => Ok(ns.clone()),
        other => Err(Error::runtime(format!(
            "Role namespace must be string, not {}",
            yaml_kind(other)
        ))),
    }
}

/// Explicit `role_name`. Empty and non-string values count as absent.
fn role_name(galaxy_info: &Mapping) -> Option<String> {
    galaxy_info
        .get("role_name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn dir_role_name(project_dir: &Path) -> String {
    let base = absolute_dir_name(project_dir);
    let stripped = ROLE_DIR_PREFIXES
        .iter()
        .find_map(|prefix| base.strip_prefix(prefix).filter(|rest| !rest.is_empty()))
        .unwrap_or(base.as_str());
    stripped
        .splitn(3, '.')
        .last()
        .unwrap_or(stripped)
        .to_string()
}

fn absolute_dir_name(project_dir: &Path) -> String {
    std::path::absolute(project_dir)
        .unwrap_or_else(|_| project_dir.to_path_buf())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Read `galaxy_info` from `meta/main.yml` (or `.yaml`).
///
/// Returns the metadata path that was read, or `None` if neither exists.
pub fn read_galaxy_info(project_dir: &Path) -> Result<Option<(PathBuf, Mapping)>> {
    let Some(meta) = ProjectPath::meta_main_candidates()
        .into_iter()
        .map(|candidate| project_dir.join(candidate))
        .find(|path| path.is_file())
    else {
        return Ok(None);
    };
    let document: Value = load_yaml(&meta)?;
    let galaxy_info = document
        .get("galaxy_info")
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default();
    Ok(Some((meta, galaxy_info)))
}

/// Compute the name a standalone role is installed under.
pub fn install_name(
    galaxy_info: &Mapping,
    project_dir: &Path,
    policy: NameCheck,
    sink: &dyn WarningSink,
) -> Result<String> {
    let identity = RoleIdentity::resolve(galaxy_info, project_dir)?;
    match policy {
        NameCheck::Bypass => {
            if role_name(galaxy_info).is_some() {
                Ok(identity.fqrn())
            } else {
                Ok(absolute_dir_name(project_dir))
            }
        }
        NameCheck::Strict | NameCheck::Warn => {
            let fqrn = identity.fqrn();
            if is_valid_fqrn(&fqrn) {
                return Ok(fqrn);
            }
            let message = MSG_INVALID_FQRL.replace("{0}", &fqrn);
            if policy == NameCheck::Strict {
                tracing::error!("{}", message);
                return Err(Error::invalid_prerequisite(message));
            }
            sink.warn(&message);
            Ok(fqrn)
        }
    }
}

/// Expose the role at `project_dir` as `roles_dir/<fqrn>`.
///
/// Missing metadata is only an error when `ignore_errors` is false.
/// Returns the link path, or `None` when nothing was installed.
pub fn install_standalone(
    project_dir: &Path,
    roles_dir: &Path,
    policy: NameCheck,
    ignore_errors: bool,
    sink: &dyn WarningSink,
) -> Result<Option<PathBuf>> {
    let Some((_meta, galaxy_info)) = read_galaxy_info(project_dir)? else {
        if ignore_errors {
            return Ok(None);
        }
        return Err(Error::MissingMetadata {
            path: project_dir.join(ProjectPath::MetaMain),
        });
    };

    let fqrn = install_name(&galaxy_info, project_dir, policy, sink)?;
    let target = std::path::absolute(project_dir).map_err(|e| Error::io(project_dir, e))?;
    fs::create_dir_all(roles_dir).map_err(|e| Error::io(roles_dir, e))?;
    let link = roles_dir.join(&fqrn);

    if ensure_symlink(&link, &target, sink)? {
        tracing::info!(
            "Using {} symlink to current repository in order to enable Ansible to find the role using its expected full name.",
            link.display()
        );
    }
    Ok(Some(link))
}

/// Make `link` point at `target`. Returns whether a link was (re)created.
fn ensure_symlink(link: &Path, target: &Path, sink: &dyn WarningSink) -> Result<bool> {
    match fs::symlink_metadata(link) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(link, e)),
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = fs::read_link(link).map_err(|e| Error::io(link, e))?;
            if current == target {
                return Ok(false);
            }
            remove_link(link)?;
        }
        Ok(meta) if meta.is_dir() => {
            sink.warn(&format!(
                "{} is a directory, not replacing it with a symlink to {}.",
                link.display(),
                target.display()
            ));
            return Ok(false);
        }
        Ok(_) => fs::remove_file(link).map_err(|e| Error::io(link, e))?,
    }
    create_dir_symlink(target, link)?;
    Ok(true)
}

fn remove_link(link: &Path) -> Result<()> {
    // Directory symlinks on Windows need remove_dir.
    fs::remove_file(link)
        .or_else(|_| fs::remove_dir(link))
        .map_err(|e| Error::io(link, e))
}

#[cfg(unix)]
fn create_dir_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| Error::io(link, e))
}

#[cfg(windows)]
fn create_dir_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target, link).map_err(|e| Error::io(link, e))
}
