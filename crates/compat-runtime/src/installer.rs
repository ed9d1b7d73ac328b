//! Collection and role installation through `ansible-galaxy`.
//!
//! Collections are installed by prepending the destination to the
//! collections path variable of the child process instead of passing an
//! explicit install path, which keeps galaxy's "already installed" check
//! working across every configured path.

use crate::error::{Error, Result};
use crate::galaxy::InstalledCollection;
use crate::options::RuntimeOptions;
use crate::paths::{dedup, expand_user};
use crate::process::{Environ, ProcessRunner, RunOptions};
use compat_config::Version;
use compat_fs::{CacheDir, REQUIREMENT_LOCATIONS, load_yaml};
use regex::Regex;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Version part of `name:>=1.2.3`, `name:1.2.3,<2` and friends.
static VERSION_CONSTRAINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[>=<]*([^,]*)").expect("static regex"));

/// A parsed `requirements.yml`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequirementManifest {
    /// Top-level list, roles only.
    Legacy(Vec<Value>),
    /// Mapping with optional `roles` and `collections` sections.
    Sections {
        has_roles: bool,
        collections: Option<Vec<Value>>,
    },
}

impl RequirementManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let document: Value = load_yaml(path)?;
        Self::from_value(document, path)
    }

    /// Validate the document shape. `path` is only used in messages.
    pub fn from_value(document: Value, path: &Path) -> Result<Self> {
        let not_valid = || {
            format!(
                "{} file is not a valid Ansible requirements file.",
                path.display()
            )
        };
        match document {
            Value::Sequence(roles) => Ok(Self::Legacy(roles)),
            Value::Mapping(map) => {
                let unknown = map
                    .keys()
                    .any(|key| !matches!(key.as_str(), Some("roles" | "collections")));
                if unknown {
                    return Err(Error::invalid_prerequisite(format!(
                        "{} Only 'roles' and 'collections' keys are allowed at root level. Recognized valid locations are: {}",
                        not_valid(),
                        REQUIREMENT_LOCATIONS.join(", ")
                    )));
                }
                let collections = match map.get("collections") {
                    None | Some(Value::Null) => None,
                    Some(Value::Sequence(items)) => Some(items.clone()),
                    Some(_) => {
                        return Err(Error::invalid_prerequisite(format!(
                            "{} The 'collections' key must hold a list.",
                            not_valid()
                        )));
                    }
                };
                Ok(Self::Sections {
                    has_roles: map.contains_key("roles"),
                    collections,
                })
            }
            _ => Err(Error::invalid_prerequisite(not_valid())),
        }
    }

    pub fn has_roles(&self) -> bool {
        match self {
            Self::Legacy(_) => true,
            Self::Sections { has_roles, .. } => *has_roles,
        }
    }

    pub fn collections(&self) -> Option<&[Value]> {
        match self {
            Self::Legacy(_) => None,
            Self::Sections { collections, .. } => collections.as_deref(),
        }
    }

    /// Git sourced collections may only have pre-release versions.
    pub fn needs_prerelease(&self) -> bool {
        self.collections().is_some_and(|items| {
            items
                .iter()
                .any(|item| item.get("type").and_then(Value::as_str) == Some("git"))
        })
    }
}

/// Installs dependencies for one runtime instance.
pub struct DependencyInstaller<'a> {
    runner: &'a ProcessRunner,
    cache: &'a CacheDir,
    options: &'a RuntimeOptions,
    version: Version,
    /// Collection search order, most preferred first.
    collections_paths: Vec<String>,
    isolated: bool,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(
        runner: &'a ProcessRunner,
        cache: &'a CacheDir,
        options: &'a RuntimeOptions,
        version: Version,
        collections_paths: Vec<String>,
        isolated: bool,
    ) -> Self {
        Self {
            runner,
            cache,
            options,
            version,
            collections_paths,
            isolated,
        }
    }

    fn collections_var(&self) -> &'static str {
        self.options.collections_path_var(&self.version)
    }

    /// Environment for a galaxy call that installs into `destination`.
    fn collections_env(&self, destination: Option<&Path>) -> Environ {
        let var = self.collections_var();
        let mut env = self.runner.environ().clone();
        let current: Vec<String> = match env.get(var) {
            Some(value) if !value.is_empty() => value.split(':').map(str::to_string).collect(),
            _ => self.collections_paths.clone(),
        };
        let entries = destination
            .map(|d| d.to_string_lossy().into_owned())
            .into_iter()
            .chain(current);
        env.insert(var.to_string(), dedup(entries).join(":"));
        env
    }

    /// Install a collection by name, name with constraint, archive, path or
    /// source URL.
    ///
    /// `--pre` is added when the requested version is a pre-release, since
    /// galaxy does not work that out from a range on its own.
    pub fn install_collection(
        &self,
        reference: &str,
        destination: Option<&Path>,
        force: bool,
    ) -> Result<()> {
        let mut cmd: Vec<String> = ["ansible-galaxy", "collection", "install", "-vvv"]
            .map(String::from)
            .to_vec();
        if force {
            cmd.push("--force".into());
        }
        if !crate::galaxy::is_url(reference) {
            if let Some(caps) = VERSION_CONSTRAINT.captures(reference) {
                let requested = caps[1].trim();
                if !requested.is_empty() {
                    let version = Version::parse_collection(requested).map_err(|e| {
                        Error::invalid_prerequisite(format!(
                            "Invalid version in collection reference '{reference}': {e}"
                        ))
                    })?;
                    if version.is_prerelease() {
                        cmd.push("--pre".into());
                    }
                }
            }
        }
        cmd.push(reference.to_string());

        tracing::info!("Running {}", cmd.join(" "));
        let output = self.runner.run(
            &cmd,
            &RunOptions::default()
                .retry(true)
                .env(self.collections_env(destination)),
        )?;
        if !output.success() {
            let message = format!("Command {output}");
            tracing::error!("{}", message);
            return Err(Error::invalid_prerequisite(message));
        }
        Ok(())
    }

    /// Install the collection whose sources live at `path`.
    ///
    /// Runtimes older than `build_before_install_below` need the collection
    /// built into an archive first.
    pub fn install_collection_from_disk(
        &self,
        path: &Path,
        destination: Option<&Path>,
    ) -> Result<()> {
        if self.version >= self.options.build_before_install_below {
            return self.install_collection(&path.to_string_lossy(), destination, true);
        }

        let scratch = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let cmd = [
            "ansible-galaxy".to_string(),
            "collection".to_string(),
            "build".to_string(),
            "--output-path".to_string(),
            scratch.path().to_string_lossy().into_owned(),
            path.to_string_lossy().into_owned(),
        ];
        let output = self.runner.run(&cmd, &RunOptions::default())?;
        if !output.success() {
            return Err(Error::invalid_prerequisite(format!("Command {output}")));
        }

        let mut archives: Vec<PathBuf> = std::fs::read_dir(scratch.path())
            .map_err(|e| Error::io(scratch.path(), e))?
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.to_string_lossy().ends_with(".tar.gz"))
            .collect();
        archives.sort();
        for archive in archives {
            self.install_collection(&archive.to_string_lossy(), destination, true)?;
        }
        Ok(())
    }

    /// Install roles and collections listed in a requirements file.
    ///
    /// A missing file is not an error. In offline mode nothing is installed
    /// and the skipped steps are reported as warnings.
    pub fn install_requirements(&self, path: &Path, retry: bool, offline: bool) -> Result<()> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No requirements file");
            return Ok(());
        }
        let manifest = RequirementManifest::load(path)?;
        let requirement = path.to_string_lossy().into_owned();
        let verbosity = self.options.verbosity_flag();

        if manifest.has_roles() {
            let mut cmd: Vec<String> = vec![
                "ansible-galaxy".into(),
                "role".into(),
                "install".into(),
                "-r".into(),
                requirement.clone(),
            ];
            cmd.extend(verbosity.clone());
            cmd.push("--roles-path".into());
            cmd.push(self.cache.roles().to_string_lossy().into_owned());

            if offline {
                self.runner
                    .sink()
                    .warn("Skipped installing old role dependencies due to running in offline mode.");
            } else {
                self.run_galaxy(&cmd, retry)?;
            }
        }

        if manifest.collections().is_some() {
            let mut cmd: Vec<String> =
                vec!["ansible-galaxy".into(), "collection".into(), "install".into()];
            cmd.extend(verbosity);
            if manifest.needs_prerelease() {
                tracing::info!(
                    "Adding '--pre' to ansible-galaxy collection install because we detected one collection being sourced from git."
                );
                cmd.push("--pre".into());
            }
            if offline {
                self.runner.sink().warn(
                    "Skipped installing collection dependencies due to running in offline mode.",
                );
            } else {
                cmd.push("-r".into());
                cmd.push(requirement);
                self.run_galaxy(&cmd, retry)?;
            }
        }
        Ok(())
    }

    fn run_galaxy(&self, cmd: &[String], retry: bool) -> Result<()> {
        tracing::info!("Running {}", cmd.join(" "));
        let output = self.runner.run(cmd, &RunOptions::default().retry(retry))?;
        tracing::debug!("{}", output.stdout);
        if !output.success() {
            tracing::error!("{}", output.stderr);
            return Err(Error::Command { output });
        }
        Ok(())
    }

    /// Make sure collection `name` is installed, at least at `version`.
    ///
    /// With `install` a missing or outdated collection is installed once
    /// and checked again; a second miss is fatal.
    pub fn require_collection(
        &self,
        name: &str,
        version: Option<&str>,
        install: bool,
    ) -> Result<InstalledCollection> {
        let Some((namespace, collection)) = name.split_once('.') else {
            return Err(Error::invalid_prerequisite(format!(
                "Invalid collection name supplied: {name}"
            )));
        };
        if collection.is_empty() || collection.contains('.') {
            return Err(Error::invalid_prerequisite(format!(
                "Invalid collection name supplied: {name}"
            )));
        }
        let required = version
            .map(Version::parse_collection)
            .transpose()
            .map_err(|e| Error::invalid_prerequisite(e.to_string()))?;
        if self.collections_paths.is_empty() {
            return Err(Error::invalid_prerequisite(
                "Unable to determine ansible collection paths. ([])",
            ));
        }

        let destination = self.isolated.then(|| self.cache.collections());
        let reference = match version {
            Some(v) => format!("{name}:>={v}"),
            None => name.to_string(),
        };

        let mut may_install = install;
        loop {
            let problem = match self.find_installed(namespace, collection)? {
                Some(found) => match &required {
                    Some(required) if found.version < *required => format!(
                        "Found {name} collection {} but {required} or newer is required.",
                        found.version
                    ),
                    _ => return Ok(found),
                },
                None => format!(
                    "Collection '{name}' not found in '{}'",
                    self.collections_paths.join(":")
                ),
            };
            if !may_install {
                return Err(Error::invalid_prerequisite(problem));
            }
            tracing::info!("{} Installing {}.", problem, reference);
            self.install_collection(&reference, destination.as_deref(), false)?;
            may_install = false;
        }
    }

    fn find_installed(&self, namespace: &str, name: &str) -> Result<Option<InstalledCollection>> {
        for path in &self.collections_paths {
            let root = expand_user(path, self.runner.environ());
            if let Some(found) = InstalledCollection::find(&root, namespace, name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
