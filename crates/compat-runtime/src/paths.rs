//! Search path wiring.
//!
//! The runtime finds modules, roles and collections through colon
//! separated path variables. [`PathEnvironment`] edits those variables in
//! an instance-local environment so project content and the cache take
//! precedence over whatever the user already configured.

use crate::constants::{ANSIBLE_LIBRARY, ANSIBLE_ROLES_PATH};
use crate::error::Result;
use crate::process::Environ;
use compat_config::ConfigStore;
use compat_fs::{CacheDir, ProjectPath};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchKind {
    Library,
    Roles,
    Collections,
}

/// Mutable view over a runtime's environment.
pub struct PathEnvironment<'a> {
    environ: &'a mut Environ,
}

impl<'a> PathEnvironment<'a> {
    pub fn new(environ: &'a mut Environ) -> Self {
        Self { environ }
    }

    /// Prepend `entries` to the colon separated variable `name`.
    ///
    /// The existing value, or `default` when the variable is unset, is kept
    /// after the new entries with duplicates removed. A variable that is set
    /// to the empty string does not fall back to `default`. Nothing happens
    /// when `entries` is empty. Returns whether the variable changed.
    pub fn update_env(&mut self, name: &str, entries: &[String], default: &str) -> bool {
        if entries.is_empty() {
            return false;
        }
        let original = self
            .environ
            .get(name)
            .map(String::as_str)
            .unwrap_or(default);

        let mut merged: Vec<&str> = entries.iter().map(String::as_str).collect();
        if !original.is_empty() {
            merged.extend(original.split(':'));
        }
        let value = dedup(merged).join(":");

        if self.environ.get(name) == Some(&value) {
            return false;
        }
        tracing::info!("Set {}={}", name, value);
        self.environ.insert(name.to_string(), value);
        true
    }

    /// Point the module, role and collection variables at the project and,
    /// when `cache` is given, at the isolated cache.
    ///
    /// Project paths (`plugins/modules`, `roles`) are only added when they
    /// exist. Cache paths are created on demand. A variable is only written
    /// when the resulting list differs from the configured default.
    pub fn prepare_paths(
        &mut self,
        project_dir: &Path,
        cache: Option<&CacheDir>,
        config: &ConfigStore,
        collections_var: &str,
    ) -> Result<()> {
        let default_library = config.default_module_path()?;
        let default_roles = config.default_roles_path()?;
        let default_collections = config.collections_paths()?;

        let mut library = default_library.clone();
        let mut roles = default_roles.clone();
        let mut collections = default_collections.clone();

        let mut alterations: Vec<(SearchKind, PathBuf, bool)> = vec![
            (
                SearchKind::Library,
                project_dir.join(ProjectPath::PluginModules),
                true,
            ),
            (SearchKind::Roles, project_dir.join(ProjectPath::Roles), true),
        ];
        if let Some(cache) = cache {
            alterations.push((SearchKind::Roles, cache.roles(), false));
            alterations.push((SearchKind::Library, cache.modules(), false));
            alterations.push((SearchKind::Collections, cache.collections(), false));
        }

        for (kind, path, must_exist) in alterations {
            if !path.exists() {
                if must_exist {
                    continue;
                }
                if let Err(e) = std::fs::create_dir_all(&path) {
                    tracing::warn!("Unable to create {}: {}", path.display(), e);
                }
            }
            let entry = path.to_string_lossy().into_owned();
            let list = match kind {
                SearchKind::Library => &mut library,
                SearchKind::Roles => &mut roles,
                SearchKind::Collections => &mut collections,
            };
            if !list.contains(&entry) {
                list.insert(0, entry);
            }
        }

        if library != default_library {
            self.update_env(ANSIBLE_LIBRARY, &library, "");
        }
        if collections != default_collections {
            self.update_env(collections_var, &collections, "");
        }
        if roles != default_roles {
            self.update_env(ANSIBLE_ROLES_PATH, &roles, "");
        }
        Ok(())
    }
}

/// Keep the first occurrence of every entry.
pub(crate) fn dedup<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Expand a leading `~` using `HOME` from `environ`.
pub(crate) fn expand_user(path: &str, environ: &Environ) -> PathBuf {
    match (path.strip_prefix('~'), environ.get("HOME")) {
        (Some(rest), Some(home)) if !home.is_empty() => {
            Path::new(home).join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}
