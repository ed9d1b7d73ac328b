//! The [`Runtime`] facade.
//!
//! A `Runtime` is bound to one project directory. Construction selects the
//! cache directory, reads the runtime configuration dump and probes the
//! version, so a successfully built instance is known to be usable.
//!
//! # Example
//!
//! ```rust,no_run
//! use compat_runtime::{PrepareOptions, Runtime};
//!
//! let mut runtime = Runtime::builder(".")
//!     .isolated(true)
//!     .min_required_version("2.16")
//!     .max_retries(2)
//!     .build()?;
//! runtime.prepare_environment(&PrepareOptions::default())?;
//! # Ok::<(), compat_runtime::Error>(())
//! ```

use crate::constants::{
    ANSIBLE_COLLECTIONS_PATH, ANSIBLE_COLLECTIONS_PATHS, MSG_SCAN_DISABLED, PYTHON_SEARCH_PATHS,
};
use crate::error::{Error, Result};
use crate::galaxy::{
    Collection, InstalledCollection, colpath_from_path, galaxy_dependencies, is_url,
    parse_collection_list, search_galaxy_paths,
};
use crate::installer::DependencyInstaller;
use crate::options::RuntimeOptions;
use crate::paths::{PathEnvironment, dedup};
use crate::probe::{VersionProbe, version_in_range};
use crate::process::{Environ, ProcessOutput, ProcessRunner, RunOptions};
use crate::roles::{NameCheck, install_standalone};
use crate::sink::{TracingSink, WarningSink};
use compat_config::{ConfigStore, Version};
use compat_fs::{CacheDir, ProjectPath, REQUIREMENT_LOCATIONS};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments to [`Runtime::prepare_environment`].
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// `(name, minimum version)` pairs installed when `install_local` is set.
    pub required_collections: Vec<(String, String)>,
    pub retry: bool,
    /// Also provision the project itself and its `galaxy.yml` dependencies.
    pub install_local: bool,
    pub offline: bool,
    pub role_name_check: NameCheck,
}

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    project_dir: PathBuf,
    isolated: bool,
    min_required_version: Option<String>,
    require_module: bool,
    max_retries: Option<u32>,
    environ: Option<Environ>,
    options: Option<RuntimeOptions>,
    sink: Option<Arc<dyn WarningSink>>,
}

impl RuntimeBuilder {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            isolated: false,
            min_required_version: None,
            require_module: false,
            max_retries: None,
            environ: None,
            options: None,
            sink: None,
        }
    }

    /// Install dependencies into a project-local cache.
    pub fn isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    pub fn min_required_version(mut self, version: impl Into<String>) -> Self {
        self.min_required_version = Some(version.into());
        self
    }

    /// Fail unless the runtime's python module imports and matches the CLI.
    pub fn require_module(mut self, require: bool) -> Self {
        self.require_module = require;
        self
    }

    /// Overrides `RuntimeOptions::max_retries`.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Use `environ` instead of a copy of the process environment.
    pub fn environ(mut self, environ: Environ) -> Self {
        self.environ = Some(environ);
        self
    }

    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Runtime> {
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let mut options = self.options.unwrap_or_default();
        if let Some(retries) = self.max_retries {
            options.max_retries = retries;
        }
        let environ = self.environ.unwrap_or_else(|| std::env::vars().collect());
        let project_dir =
            std::path::absolute(&self.project_dir).map_err(|e| Error::io(&self.project_dir, e))?;

        let selection = CacheDir::resolve(&project_dir, self.isolated, &environ)?;
        for warning in &selection.warnings {
            sink.warn(warning);
        }

        let runner = ProcessRunner::new(environ, &options, sink.clone());
        let config = load_config(&runner)?;
        let config = patch_collection_paths(config, &runner, &options, sink.as_ref())?;

        let runtime = Runtime {
            project_dir,
            isolated: self.isolated,
            require_module: self.require_module,
            options,
            runner,
            sink,
            cache: selection.dir,
            config,
            probe: VersionProbe::new(),
            collections: Vec::new(),
            playbooks: RefCell::new(HashMap::new()),
        };

        let version = runtime.version()?;
        if runtime.collections_var(&version) == ANSIBLE_COLLECTIONS_PATH
            && runtime.environ().contains_key(ANSIBLE_COLLECTIONS_PATHS)
        {
            return Err(Error::runtime(format!(
                "{ANSIBLE_COLLECTIONS_PATHS} was detected, replace it with {ANSIBLE_COLLECTIONS_PATH} to continue."
            )));
        }
        if let Some(minimum) = &self.min_required_version {
            if !runtime.version_in_range(Some(minimum), None)? {
                return Err(Error::runtime(format!(
                    "Found incompatible version of ansible runtime {version}, instead of {minimum} or newer."
                )));
            }
        }
        if runtime.require_module {
            runtime.ensure_module_available()?;
        }
        tracing::debug!(
            project = %runtime.project_dir.display(),
            cache = %runtime.cache.path().display(),
            %version,
            "Runtime ready"
        );
        Ok(runtime)
    }
}

fn load_config(runner: &ProcessRunner) -> Result<ConfigStore> {
    let output = runner.run(&["ansible-config", "dump"], &RunOptions::default())?;
    if !output.success() {
        return Err(Error::Command { output });
    }
    Ok(ConfigStore::parse(&output.stdout))
}

#[derive(Debug, Default, Deserialize)]
struct InterpreterPaths {
    #[serde(default)]
    sys_path: Vec<String>,
    #[serde(default)]
    site_packages: Vec<String>,
}

/// Extend the configured collection paths with what the interpreter sees.
///
/// Import path entries holding an `ansible_collections` directory are
/// appended, followed by the site-packages directories in reverse order.
/// An interpreter that cannot be queried leaves the paths unchanged.
fn patch_collection_paths(
    config: ConfigStore,
    runner: &ProcessRunner,
    options: &RuntimeOptions,
    sink: &dyn WarningSink,
) -> Result<ConfigStore> {
    if !config.collections_scan_sys_path() {
        sink.warn(MSG_SCAN_DISABLED);
        return Ok(config);
    }
    let configured = config.collections_paths()?;
    let Some(found) = query_interpreter_paths(runner, options) else {
        return Ok(config);
    };

    let mut paths = configured.clone();
    for path in found.sys_path {
        if !paths.contains(&path) && Path::new(&path).join(ProjectPath::AnsibleCollections).is_dir() {
            paths.push(path);
        }
    }
    for path in found.site_packages.into_iter().rev() {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    if paths == configured {
        return Ok(config);
    }
    tracing::info!(
        "Collection paths was patched to include extra directories {}",
        paths.join(",")
    );
    Ok(config.with_value("COLLECTIONS_PATHS", paths))
}

fn query_interpreter_paths(runner: &ProcessRunner, options: &RuntimeOptions) -> Option<InterpreterPaths> {
    let output = match runner.run(
        &[options.python.as_str(), "-c", PYTHON_SEARCH_PATHS],
        &RunOptions::default(),
    ) {
        Ok(output) if output.success() => output,
        Ok(output) => {
            tracing::debug!(rc = output.returncode, "Interpreter path query failed");
            return None;
        }
        Err(e) => {
            tracing::debug!(error = %e, "Interpreter path query failed");
            return None;
        }
    };
    serde_json::from_str(output.stdout.trim())
        .inspect_err(|e| tracing::debug!(error = %e, "Unreadable interpreter path listing"))
        .ok()
}

/// Environment manager for one project and one runtime installation.
pub struct Runtime {
    project_dir: PathBuf,
    isolated: bool,
    require_module: bool,
    options: RuntimeOptions,
    runner: ProcessRunner,
    sink: Arc<dyn WarningSink>,
    cache: CacheDir,
    config: ConfigStore,
    probe: VersionProbe,
    collections: Vec<Collection>,
    playbooks: RefCell<HashMap<(String, Option<PathBuf>), bool>>,
}

impl Runtime {
    /// Shared (non-isolated) runtime with default options.
    pub fn new(project_dir: impl Into<PathBuf>) -> Result<Self> {
        RuntimeBuilder::new(project_dir).build()
    }

    pub fn builder(project_dir: impl Into<PathBuf>) -> RuntimeBuilder {
        RuntimeBuilder::new(project_dir)
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    pub fn cache_dir(&self) -> &CacheDir {
        &self.cache
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn environ(&self) -> &Environ {
        self.runner.environ()
    }

    /// Collections seen by the last [`Runtime::load_collections`].
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Runtime version, probed once per instance.
    pub fn version(&self) -> Result<Version> {
        self.probe.version(&self.runner)
    }

    /// `lower <= version < upper`.
    pub fn version_in_range(&self, lower: Option<&str>, upper: Option<&str>) -> Result<bool> {
        version_in_range(&self.version()?, lower, upper)
    }

    fn collections_var(&self, version: &Version) -> &'static str {
        self.options.collections_path_var(version)
    }

    /// Collection search order: the isolated cache first, then the
    /// configured paths.
    pub fn collections_paths(&self) -> Result<Vec<String>> {
        let cache = self
            .isolated
            .then(|| self.cache.collections().to_string_lossy().into_owned());
        let configured = self.config.collections_paths()?;
        Ok(dedup(cache.into_iter().chain(configured)))
    }

    fn installer(&self) -> Result<DependencyInstaller<'_>> {
        Ok(DependencyInstaller::new(
            &self.runner,
            &self.cache,
            &self.options,
            self.version()?,
            self.collections_paths()?,
            self.isolated,
        ))
    }

    /// Run a command with this runtime's environment.
    pub fn run<S: AsRef<str>>(&self, args: &[S], opts: &RunOptions) -> Result<ProcessOutput> {
        self.runner.run(args, opts)
    }

    /// Remove the cache directory.
    pub fn clean(&self) -> Result<()> {
        Ok(self.cache.clean()?)
    }

    pub fn install_collection(
        &self,
        reference: &str,
        destination: Option<&Path>,
        force: bool,
    ) -> Result<()> {
        self.installer()?
            .install_collection(reference, destination, force)
    }

    pub fn install_collection_from_disk(&self, path: &Path, destination: Option<&Path>) -> Result<()> {
        self.installer()?
            .install_collection_from_disk(path, destination)
    }

    /// Install a requirements file; the python module is re-checked
    /// afterwards when the runtime was built with `require_module`.
    /// A missing file is skipped without any check.
    pub fn install_requirements(&self, path: &Path, retry: bool, offline: bool) -> Result<()> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No requirements file");
            return Ok(());
        }
        self.installer()?.install_requirements(path, retry, offline)?;
        if self.require_module {
            self.ensure_module_available()?;
        }
        Ok(())
    }

    pub fn require_collection(
        &self,
        name: &str,
        version: Option<&str>,
        install: bool,
    ) -> Result<InstalledCollection> {
        self.installer()?.require_collection(name, version, install)
    }

    /// Make the project's dependencies available to the runtime.
    ///
    /// Wires search paths, installs every requirements file found at the
    /// well-known locations and, with `install_local`, provisions the
    /// project itself: as a collection when it has a `galaxy.yml`, as the
    /// enclosing collection when it is a role inside one, or as a
    /// standalone role otherwise.
    pub fn prepare_environment(&mut self, opts: &PrepareOptions) -> Result<()> {
        let destination = self.cache.collections();
        self.prepare_paths()?;

        for location in REQUIREMENT_LOCATIONS {
            let path = self.project_dir.join(location);
            self.install_requirements(&path, opts.retry, opts.offline)?;
        }
        if !opts.install_local {
            return Ok(());
        }

        let installer = self.installer()?;
        for galaxy in search_galaxy_paths(&self.project_dir)? {
            for (name, version) in galaxy_dependencies(&galaxy)? {
                tracing::info!("Provisioning collection {}:{} from galaxy.yml", name, version);
                let separator = if is_url(&name) { ',' } else { ':' };
                installer.install_collection(
                    &format!("{name}{separator}{version}"),
                    Some(&destination),
                    false,
                )?;
            }
        }
        for (name, minimum) in &opts.required_collections {
            installer.install_collection(&format!("{name}:>={minimum}"), Some(&destination), false)?;
        }

        if let Some(colpath) = colpath_from_path(&self.project_dir)? {
            let installed = destination
                .join(ProjectPath::AnsibleCollections)
                .join(colpath);
            if is_symlink(&installed) {
                if same_dir(&installed, &self.project_dir) {
                    self.sink
                        .warn("Found symlinked collection, skipping its installation.");
                    return Ok(());
                }
                self.sink.warn(&format!(
                    "Collection is symlinked, but not pointing to {} directory, so we will remove it.",
                    self.project_dir.display()
                ));
                std::fs::remove_file(&installed).map_err(|e| Error::io(&installed, e))?;
            }
            installer.install_collection_from_disk(&self.project_dir, Some(&destination))?;
        } else if let Some(collection_root) = enclosing_collection(&self.project_dir) {
            installer.install_collection_from_disk(&collection_root, Some(&destination))?;
        } else {
            install_standalone(
                &self.project_dir,
                &self.cache.roles(),
                opts.role_name_check,
                true,
                self.sink.as_ref(),
            )?;
        }
        drop(installer);

        self.load_collections()
    }

    fn prepare_paths(&mut self) -> Result<()> {
        let version = self.version()?;
        let collections_var = self.collections_var(&version);
        let cache = self.isolated.then_some(&self.cache);
        PathEnvironment::new(self.runner.environ_mut()).prepare_paths(
            &self.project_dir,
            cache,
            &self.config,
            collections_var,
        )
    }

    /// Refresh [`Runtime::collections`] from the runtime's own listing.
    pub fn load_collections(&mut self) -> Result<()> {
        let output = self.runner.run(
            &["ansible-galaxy", "collection", "list", "--format=json"],
            &RunOptions::default(),
        )?;
        self.collections = parse_collection_list(&output, self.sink.as_ref())?;
        Ok(())
    }

    /// Whether the runtime accepts `playbook`, judged by a syntax check.
    /// Answers are remembered per `(playbook, basedir)`.
    pub fn has_playbook(&self, playbook: &str, basedir: Option<&Path>) -> Result<bool> {
        let key = (playbook.to_string(), basedir.map(Path::to_path_buf));
        if let Some(known) = self.playbooks.borrow().get(&key) {
            return Ok(*known);
        }

        let mut opts = RunOptions::default();
        if let Some(dir) = basedir {
            opts = opts.cwd(dir);
        }
        let output = self
            .runner
            .run(&["ansible-playbook", "--syntax-check", playbook], &opts)?;
        let result = output.success();
        if !result {
            let location = basedir.unwrap_or(Path::new(".")).join(playbook);
            tracing::debug!(
                "has_playbook returned false for '{}' due to syntax check returning {}",
                location.display(),
                output.returncode
            );
        }
        self.playbooks.borrow_mut().insert(key, result);
        Ok(result)
    }

    /// Check that the runtime's python module imports and matches the CLI
    /// version.
    pub fn ensure_module_available(&self) -> Result<()> {
        let unavailable =
            |detail: String| Error::runtime(format!("Unable to find Ansible python module: {detail}"));
        let output = self
            .runner
            .run(
                &[
                    self.options.python.as_str(),
                    "-c",
                    "import ansible.release; print(ansible.release.__version__)",
                ],
                &RunOptions::default(),
            )
            .map_err(|e| unavailable(e.to_string()))?;
        if !output.success() {
            return Err(unavailable(format!(
                "{} exited with {}: {}",
                self.options.python,
                output.returncode,
                output.stderr.trim()
            )));
        }
        let module_version = Version::parse(output.stdout.trim())
            .map_err(|e| unavailable(format!("unreadable version {:?}: {e}", output.stdout.trim())))?;
        let cli_version = self.version()?;
        if module_version != cli_version {
            return Err(Error::runtime(format!(
                "Ansible CLI ({cli_version}) and python module ({module_version}) versions do not match. This indicates a broken execution environment."
            )));
        }
        Ok(())
    }
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Collection root for a role at `<collection>/roles/<role>`.
fn enclosing_collection(project_dir: &Path) -> Option<PathBuf> {
    let parent = project_dir.parent()?;
    if parent.file_name()? != ProjectPath::Roles.as_str() {
        return None;
    }
    let root = parent.parent()?;
    root.join(ProjectPath::GalaxyFile)
        .is_file()
        .then(|| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn enclosing_collection_detection() {
        let temp = TempDir::new().unwrap();
        let role = temp.path().join("roles/web");
        std::fs::create_dir_all(&role).unwrap();
        assert_eq!(enclosing_collection(&role), None);

        std::fs::write(temp.path().join("galaxy.yml"), "namespace: a\nname: b\n").unwrap();
        assert_eq!(enclosing_collection(&role), Some(temp.path().to_path_buf()));
        assert_eq!(enclosing_collection(temp.path()), None);
    }

    #[cfg(unix)]
    #[test]
    fn same_dir_follows_symlinks() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        std::fs::create_dir_all(&target).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(is_symlink(&link));
        assert!(!is_symlink(&target));
        assert!(same_dir(&link, &target));
        assert!(!same_dir(&link, temp.path()));
    }
}
