//! Fake runtime executables.
//!
//! Realism level: **FAKE**. Each executable is a POSIX shell script that
//! appends its argument vector to a shared log and then emulates just
//! enough behaviour for the callers under test:
//!
//! - `ansible --version` prints a configurable version banner
//! - `ansible-config dump` prints a configurable dump
//! - `ansible-galaxy collection install` writes a `MANIFEST.json` into the
//!   destination, `collection list` prints a configurable JSON document and
//!   `collection build` drops an archive into the output path
//! - `ansible-playbook --syntax-check FILE` succeeds when `FILE` exists
//! - `python3` prints the configured module version, or the configured
//!   import path listing when asked for `sys.path`
//!
//! Failures are injected through state files: see
//! [`FakeToolchain::fail_galaxy`] and [`FakeToolchain::set_version_output`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const LOG_FILE: &str = "invocations.log";

/// One recorded execution of a fake executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value following `flag`, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let idx = self.args.iter().position(|a| a == flag)?;
        self.args.get(idx + 1).map(String::as_str)
    }
}

/// A directory of fake runtime executables plus their shared state.
///
/// # Example
///
/// ```rust,no_run
/// use compat_test_utils::FakeToolchain;
///
/// let toolchain = FakeToolchain::new();
/// toolchain.fail_galaxy(2);
/// // ... run code under test with `toolchain.environ()` ...
/// assert_eq!(toolchain.invocations_of("ansible-galaxy").len(), 3);
/// ```
pub struct FakeToolchain {
    temp_dir: TempDir,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeToolchain {
    /// Create a toolchain reporting runtime version `2.16.3`.
    pub fn new() -> Self {
        Self::with_version("2.16.3")
    }

    pub fn with_version(version: &str) -> Self {
        let toolchain = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(toolchain.bin_dir()).unwrap();
        fs::create_dir_all(toolchain.home_dir()).unwrap();
        fs::write(toolchain.log_path(), "").unwrap();

        toolchain.set_version_output(&format!(
            "ansible [core {version}]\n  config file = None\n  python version = 3.12.0\n"
        ));
        toolchain.set_module_version(version);
        toolchain.set_config_dump(&toolchain.default_config_dump());

        toolchain.install_script("ansible", ANSIBLE_SCRIPT);
        toolchain.install_script("ansible-config", ANSIBLE_CONFIG_SCRIPT);
        toolchain.install_script("ansible-galaxy", ANSIBLE_GALAXY_SCRIPT);
        toolchain.install_script("ansible-playbook", ANSIBLE_PLAYBOOK_SCRIPT);
        toolchain.install_script("python3", PYTHON_SCRIPT);
        toolchain
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root().join("bin")
    }

    /// `HOME` for the code under test, so `~` never points at the real home.
    pub fn home_dir(&self) -> PathBuf {
        self.root().join("home")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root().to_path_buf()
    }

    pub fn log_path(&self) -> PathBuf {
        self.root().join(LOG_FILE)
    }

    /// A minimal environment that resolves the fakes first.
    pub fn environ(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            "PATH".to_string(),
            format!("{}:/usr/bin:/bin", self.bin_dir().display()),
        );
        env.insert("HOME".to_string(), self.home_dir().display().to_string());
        env
    }

    /// Replace the output of `ansible --version`.
    pub fn set_version_output(&self, text: &str) {
        fs::write(self.root().join("version.txt"), text).unwrap();
    }

    /// Make `ansible --version` exit with `code`.
    pub fn fail_version(&self, code: i32) {
        fs::write(self.root().join("version-exit"), code.to_string()).unwrap();
    }

    /// Replace the output of `ansible-config dump`.
    pub fn set_config_dump(&self, text: &str) {
        fs::write(self.root().join("config-dump.txt"), text).unwrap();
    }

    /// Version reported by the fake python module check.
    pub fn set_module_version(&self, version: &str) {
        fs::write(self.root().join("module-version"), version).unwrap();
    }

    /// Import path and site-packages directories reported by `python3`.
    pub fn set_python_paths(&self, sys_path: &[&Path], site_packages: &[&Path]) {
        let quote = |paths: &[&Path]| {
            paths
                .iter()
                .map(|p| format!("\"{}\"", p.display()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        fs::write(
            self.root().join("python-paths.json"),
            format!(
                "{{\"sys_path\": [{}], \"site_packages\": [{}]}}\n",
                quote(sys_path),
                quote(site_packages)
            ),
        )
        .unwrap();
    }

    /// Version written into `MANIFEST.json` by fake installs.
    pub fn set_install_version(&self, version: &str) {
        fs::write(self.root().join("install-version"), version).unwrap();
    }

    /// JSON printed by `ansible-galaxy collection list --format=json`.
    pub fn set_collection_list(&self, json: &str) {
        fs::write(self.root().join("collections.json"), json).unwrap();
    }

    /// Make the next `times` galaxy invocations exit non-zero.
    pub fn fail_galaxy(&self, times: u32) {
        fs::write(self.root().join("galaxy-fail-count"), times.to_string()).unwrap();
    }

    /// Make galaxy exit with `code` and print `stderr` until reset.
    pub fn fail_galaxy_with(&self, code: i32, stderr: &str) {
        fs::write(self.root().join("galaxy-exit"), code.to_string()).unwrap();
        fs::write(self.root().join("galaxy-stderr"), stderr).unwrap();
    }

    /// Remove an executable, emulating a runtime that is not installed.
    pub fn remove(&self, program: &str) {
        fs::remove_file(self.bin_dir().join(program)).unwrap();
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        fs::read_to_string(self.log_path())
            .unwrap()
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let mut fields = line.split('\t').map(str::to_string);
                Invocation {
                    program: fields.next().unwrap_or_default(),
                    args: fields.collect(),
                }
            })
            .collect()
    }

    pub fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|i| i.program == program)
            .collect()
    }

    pub fn clear_log(&self) {
        fs::write(self.log_path(), "").unwrap();
    }

    fn default_config_dump(&self) -> String {
        let home = self.home_dir();
        let home = home.display();
        format!(
            "ACTION_WARNINGS(default) = True\n\
             COLLECTIONS_PATHS(default) = ['{home}/.ansible/collections']\n\
             COLLECTIONS_SCAN_SYS_PATH(default) = True\n\
             DEFAULT_MODULE_PATH(default) = ['{home}/.ansible/plugins/modules']\n\
             DEFAULT_ROLES_PATH(default) = ['{home}/.ansible/roles']\n\
             DEFAULT_FORKS(default) = 5\n"
        )
    }

    fn install_script(&self, name: &str, body: &str) {
        let script = format!(
            "#!/bin/sh\nLOG='{}'\nSTATE='{}'\n{}\n{}",
            self.log_path().display(),
            self.state_dir().display(),
            LOG_SNIPPET,
            body
        );
        let path = self.bin_dir().join(name);
        fs::write(&path, script).unwrap();
        make_executable(&path);
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

const LOG_SNIPPET: &str = r#"{ printf '%s' "$(basename "$0")"; for a in "$@"; do printf '\t%s' "$a"; done; printf '\n'; } >> "$LOG""#;

const ANSIBLE_SCRIPT: &str = r#"
if [ "$1" = "--version" ]; then
  cat "$STATE/version.txt"
  if [ -f "$STATE/version-exit" ]; then exit "$(cat "$STATE/version-exit")"; fi
  exit 0
fi
exit 0
"#;

const ANSIBLE_CONFIG_SCRIPT: &str = r#"
if [ "$1" = "dump" ]; then
  cat "$STATE/config-dump.txt"
fi
exit 0
"#;

const ANSIBLE_PLAYBOOK_SCRIPT: &str = r#"
for last in "$@"; do :; done
[ -f "$last" ]
"#;

const PYTHON_SCRIPT: &str = r#"
case "$2" in
  *sys.path*)
    if [ -f "$STATE/python-paths.json" ]; then cat "$STATE/python-paths.json"; else echo '{"sys_path": [], "site_packages": []}'; fi
    exit 0;;
esac
cat "$STATE/module-version"
echo
exit 0
"#;

const ANSIBLE_GALAXY_SCRIPT: &str = r#"
if [ -f "$STATE/galaxy-exit" ]; then
  cat "$STATE/galaxy-stderr" >&2
  exit "$(cat "$STATE/galaxy-exit")"
fi
if [ -f "$STATE/galaxy-fail-count" ]; then
  n=$(cat "$STATE/galaxy-fail-count")
  if [ "$n" -gt 0 ]; then
    echo $((n - 1)) > "$STATE/galaxy-fail-count"
    echo "[WARNING]: simulated galaxy outage" >&2
    echo "ERROR! simulated failure" >&2
    exit 1
  fi
fi
kind="$1"
action="$2"
if [ "$kind" = "collection" ] && [ "$action" = "list" ]; then
  if [ -f "$STATE/collections.json" ]; then cat "$STATE/collections.json"; else echo '{}'; fi
  exit 0
fi
if [ "$kind" = "collection" ] && [ "$action" = "build" ]; then
  shift 2
  out=""
  while [ $# -gt 0 ]; do
    case "$1" in
      --output-path) out="$2"; shift 2;;
      *) shift;;
    esac
  done
  : > "$out/fake-collection-1.0.0.tar.gz"
  exit 0
fi
if [ "$kind" = "collection" ] && [ "$action" = "install" ]; then
  shift 2
  dest=""
  ref=""
  while [ $# -gt 0 ]; do
    case "$1" in
      -p) dest="$2"; shift 2;;
      -r) shift 2;;
      -*) shift;;
      *) ref="$1"; shift;;
    esac
  done
  if [ -z "$dest" ]; then dest="${ANSIBLE_COLLECTIONS_PATH%%:*}"; fi
  name="${ref%%:*}"
  case "$name" in
    */*|*.tar.gz|"") exit 0;;
  esac
  if [ -z "$dest" ]; then exit 0; fi
  version="1.0.0"
  if [ -f "$STATE/install-version" ]; then version=$(cat "$STATE/install-version"); fi
  ns="${name%%.*}"
  coll="${name#*.}"
  mkdir -p "$dest/ansible_collections/$ns/$coll"
  printf '{"collection_info": {"namespace": "%s", "name": "%s", "version": "%s"}}\n' "$ns" "$coll" "$version" > "$dest/ansible_collections/$ns/$coll/MANIFEST.json"
  exit 0
fi
exit 0
"#;
