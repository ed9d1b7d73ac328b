//! Cache directory selection.
//!
//! Every project gets a deterministic directory used to stage roles,
//! collections and modules. Candidates are tried in order and the first
//! writable one wins:
//!
//! - isolated: `$VIRTUAL_ENV/.ansible`, then `<project>/.ansible`
//! - shared: `$ANSIBLE_HOME` (or `~/.ansible`), then
//!   `$XDG_CACHE_HOME/ansible-compat/<hash>`
//!
//! When no candidate is writable, a temporary directory keyed by a short
//! hash of the project path is used, so repeated runs for the same project
//! land in the same place.

use crate::constants::ProjectPath;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Hex digits of the project hash used for the temporary fallback.
const TEMP_HASH_WIDTH: usize = 4;
/// Hex digits of the project hash used below `$XDG_CACHE_HOME`.
const XDG_HASH_WIDTH: usize = 6;

/// Result of cache directory selection.
#[derive(Debug, Clone)]
pub struct CacheSelection {
    pub dir: CacheDir,
    /// Candidates that were rejected, phrased for the end user.
    pub warnings: Vec<String>,
}

/// A per-project cache directory with `roles/` and `collections/` inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
    path: PathBuf,
}

impl CacheDir {
    /// Select the cache directory for `project_dir` and create its layout.
    ///
    /// `env` is consulted for `VIRTUAL_ENV`, `ANSIBLE_HOME`, `HOME` and
    /// `XDG_CACHE_HOME` instead of the process environment.
    pub fn resolve(
        project_dir: &Path,
        isolated: bool,
        env: &BTreeMap<String, String>,
    ) -> Result<CacheSelection> {
        let project = resolve_project(project_dir);
        let mut warnings = Vec::new();

        let mut candidates: Vec<(PathBuf, String)> = Vec::new();
        if isolated {
            if let Some(venv) = non_empty(env, "VIRTUAL_ENV") {
                let path = resolve_project(Path::new(venv)).join(ProjectPath::CacheDir);
                candidates.push((
                    path,
                    format!(
                        "Found VIRTUAL_ENV={venv} but we cannot use it for caching as it is not writable."
                    ),
                ));
            }
            let path = project.join(ProjectPath::CacheDir);
            let msg = format!(
                "Project directory {} cannot be used for caching as it is not writable.",
                path.display()
            );
            candidates.push((path, msg));
        } else {
            let home = ansible_home(env);
            let msg = format!("Cache directory {} is not writable.", home.display());
            candidates.push((home, msg));
            if let Some(xdg) = xdg_cache_home(env) {
                let path = xdg
                    .join("ansible-compat")
                    .join(short_hash(&project, XDG_HASH_WIDTH));
                let msg = format!("Cache directory {} is not writable.", path.display());
                candidates.push((path, msg));
            }
        }

        let mut chosen = None;
        for (path, rejection) in candidates {
            if is_writable(&path) {
                chosen = Some(path);
                break;
            }
            tracing::debug!(candidate = %path.display(), "Cache candidate rejected");
            warnings.push(rejection);
        }

        let path = match chosen {
            Some(path) => path,
            None => {
                let path = std::env::temp_dir()
                    .join(format!(".ansible-{}", short_hash(&project, TEMP_HASH_WIDTH)));
                fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
                let msg = format!(
                    "Using unique temporary directory {} for caching.",
                    path.display()
                );
                warnings.push(msg);
                path
            }
        };

        let dir = Self { path };
        dir.ensure_layout()?;
        tracing::debug!(cache_dir = %dir.path.display(), "Selected cache directory");
        Ok(CacheSelection { dir, warnings })
    }

    /// Wrap an existing directory without selection logic.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn roles(&self) -> PathBuf {
        self.path.join(ProjectPath::Roles)
    }

    pub fn collections(&self) -> PathBuf {
        self.path.join(ProjectPath::Collections)
    }

    pub fn modules(&self) -> PathBuf {
        self.path.join(ProjectPath::Modules)
    }

    /// Create `roles/` and `collections/`.
    ///
    /// Failure here is fatal: the external tooling refuses to list content
    /// when none of its configured paths exist.
    pub fn ensure_layout(&self) -> Result<()> {
        for sub in [self.roles(), self.collections()] {
            fs::create_dir_all(&sub).map_err(|source| Error::CacheLayout {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Remove the whole cache directory. Already absent is not an error.
    pub fn clean(&self) -> Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {
                tracing::info!(cache_dir = %self.path.display(), "Removed cache directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

/// Check whether `path` is writable, creating it if necessary.
pub fn is_writable(path: &Path) -> bool {
    if fs::create_dir_all(path).is_err() {
        return false;
    }
    tempfile::Builder::new()
        .prefix(".write-probe")
        .tempfile_in(path)
        .is_ok()
}

fn non_empty<'a>(env: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn resolve_project(path: &Path) -> PathBuf {
    dunce::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn home_dir(env: &BTreeMap<String, String>) -> Option<PathBuf> {
    non_empty(env, "HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

fn expand_tilde(value: &str, env: &BTreeMap<String, String>) -> PathBuf {
    match (value.strip_prefix("~"), home_dir(env)) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(value),
    }
}

fn ansible_home(env: &BTreeMap<String, String>) -> PathBuf {
    let raw = non_empty(env, "ANSIBLE_HOME").unwrap_or("~/.ansible");
    expand_tilde(raw, env)
}

fn xdg_cache_home(env: &BTreeMap<String, String>) -> Option<PathBuf> {
    non_empty(env, "XDG_CACHE_HOME")
        .map(|v| expand_tilde(v, env))
        .or_else(dirs::cache_dir)
}

/// First `width` hex digits of the SHA-256 of the project path.
fn short_hash(project: &Path, width: usize) -> String {
    let posix = project.to_string_lossy().replace('\\', "/");
    let digest = Sha256::digest(posix.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..width].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn env_with(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn isolated_uses_project_dir() {
        let temp = TempDir::new().unwrap();
        let selection = CacheDir::resolve(temp.path(), true, &BTreeMap::new()).unwrap();

        let expected = dunce::canonicalize(temp.path()).unwrap().join(".ansible");
        assert_eq!(selection.dir.path(), expected.as_path());
        assert!(selection.dir.roles().is_dir());
        assert!(selection.dir.collections().is_dir());
        assert!(selection.warnings.is_empty());
    }

    #[test]
    fn isolated_prefers_virtual_env() {
        let project = TempDir::new().unwrap();
        let venv = TempDir::new().unwrap();
        let env = env_with(&[("VIRTUAL_ENV", venv.path().to_str().unwrap())]);

        let selection = CacheDir::resolve(project.path(), true, &env).unwrap();
        let expected = dunce::canonicalize(venv.path()).unwrap().join(".ansible");
        assert_eq!(selection.dir.path(), expected.as_path());
    }

    #[test]
    fn unwritable_virtual_env_falls_through_with_warning() {
        let project = TempDir::new().unwrap();
        let blocker = project.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let env = env_with(&[("VIRTUAL_ENV", blocker.to_str().unwrap())]);

        let selection = CacheDir::resolve(project.path(), true, &env).unwrap();
        assert!(selection.dir.path().starts_with(dunce::canonicalize(project.path()).unwrap()));
        assert_eq!(selection.warnings.len(), 1);
        assert!(selection.warnings[0].contains("VIRTUAL_ENV"));
    }

    #[test]
    fn shared_mode_uses_ansible_home() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let target = home.path().join("custom-home");
        let env = env_with(&[("ANSIBLE_HOME", target.to_str().unwrap())]);

        let selection = CacheDir::resolve(project.path(), false, &env).unwrap();
        assert_eq!(selection.dir.path(), target.as_path());
        assert!(target.join("roles").is_dir());
    }

    #[test]
    fn ansible_home_expands_tilde() {
        let home = TempDir::new().unwrap();
        let env = env_with(&[
            ("HOME", home.path().to_str().unwrap()),
            ("ANSIBLE_HOME", "~/.ansible-alt"),
        ]);
        assert_eq!(ansible_home(&env), home.path().join(".ansible-alt"));
    }

    #[test]
    fn unwritable_project_falls_back_to_temp() {
        let temp = TempDir::new().unwrap();
        // A regular file cannot host a `.ansible` directory.
        let project = temp.path().join("project-file");
        fs::write(&project, "").unwrap();

        let first = CacheDir::resolve(&project, true, &BTreeMap::new()).unwrap();
        let second = CacheDir::resolve(&project, true, &BTreeMap::new()).unwrap();

        assert_eq!(first.dir, second.dir);
        assert!(first.dir.path().starts_with(std::env::temp_dir()));
        let name = first.dir.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".ansible-"));
        assert_eq!(name.len(), ".ansible-".len() + TEMP_HASH_WIDTH);
        assert!(first.warnings.iter().any(|w| w.contains("temporary directory")));
        assert!(first.dir.collections().is_dir());
    }

    #[test]
    fn short_hash_is_deterministic_and_distinct() {
        let a = short_hash(Path::new("/srv/project-a"), 4);
        let b = short_hash(Path::new("/srv/project-b"), 4);
        assert_eq!(a, short_hash(Path::new("/srv/project-a"), 4));
        assert_ne!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn clean_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = CacheDir::at(temp.path().join("cache"));
        dir.ensure_layout().unwrap();

        dir.clean().unwrap();
        assert!(!dir.path().exists());
        dir.clean().unwrap();
    }
}
