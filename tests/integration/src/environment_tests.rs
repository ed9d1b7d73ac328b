//! End-to-end environment preparation scenarios
//!
//! Each test drives the public `Runtime` facade against the shell-script
//! toolchain from `compat-test-utils` and inspects the resulting
//! filesystem, environment map and recorded invocations.

#![cfg(unix)]

use compat_runtime::{CollectingSink, PrepareOptions, Runtime, RuntimeBuilder, RuntimeOptions};
use compat_test_utils::{FakeToolchain, Invocation, TestProject};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn quick() -> RuntimeOptions {
    RuntimeOptions {
        retry_delay_ms: 0,
        ..RuntimeOptions::default()
    }
}

fn builder_at(
    dir: &Path,
    environ: BTreeMap<String, String>,
    sink: &Arc<CollectingSink>,
) -> RuntimeBuilder {
    Runtime::builder(dir)
        .environ(environ)
        .options(quick())
        .warning_sink(sink.clone())
}

fn galaxy_calls(toolchain: &FakeToolchain, kind: &str, action: &str) -> Vec<Invocation> {
    toolchain
        .invocations_of("ansible-galaxy")
        .into_iter()
        .filter(|i| i.args.first().map(String::as_str) == Some(kind))
        .filter(|i| i.args.get(1).map(String::as_str) == Some(action))
        .collect()
}

fn install_local() -> PrepareOptions {
    PrepareOptions {
        install_local: true,
        ..PrepareOptions::default()
    }
}

// =============================================================================
// Cache selection
// =============================================================================

#[test]
fn shared_cache_honours_ansible_home() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    let home = project.sibling("ansible-home");
    let mut environ = toolchain.environ();
    environ.insert("ANSIBLE_HOME".into(), home.display().to_string());
    let sink = Arc::new(CollectingSink::new());

    let runtime = builder_at(project.root(), environ, &sink).build().unwrap();
    assert_eq!(runtime.cache_dir().path(), home.as_path());
    assert!(home.join("roles").is_dir());
    assert!(home.join("collections").is_dir());
    assert!(sink.messages().is_empty());
}

#[test]
fn unwritable_home_falls_back_to_xdg() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    let not_a_dir = project.sibling("files").join("home-file");
    std::fs::write(&not_a_dir, "").unwrap();
    let xdg = project.sibling("xdg");
    let mut environ = toolchain.environ();
    environ.insert("HOME".into(), not_a_dir.display().to_string());
    environ.insert("XDG_CACHE_HOME".into(), xdg.display().to_string());
    let sink = Arc::new(CollectingSink::new());

    let runtime = builder_at(project.root(), environ, &sink).build().unwrap();
    assert!(runtime.cache_dir().path().starts_with(xdg.join("ansible-compat")));
    assert!(sink.contains("is not writable"));
}

#[test]
fn clean_then_rebuild_recreates_layout() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    let sink = Arc::new(CollectingSink::new());

    let runtime = builder_at(project.root(), toolchain.environ(), &sink)
        .isolated(true)
        .build()
        .unwrap();
    runtime.clean().unwrap();
    project.assert_file_not_exists(".ansible");

    builder_at(project.root(), toolchain.environ(), &sink)
        .isolated(true)
        .build()
        .unwrap();
    project.assert_file_exists(".ansible/roles");
    project.assert_file_exists(".ansible/collections");
}

// =============================================================================
// Search path wiring
// =============================================================================

#[test]
fn existing_variables_keep_lower_precedence() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    project.mkdir("plugins/modules");
    let mut environ = toolchain.environ();
    environ.insert("ANSIBLE_ROLES_PATH".into(), "/custom/roles".into());
    let sink = Arc::new(CollectingSink::new());

    let mut runtime = builder_at(project.root(), environ, &sink)
        .isolated(true)
        .build()
        .unwrap();
    runtime
        .prepare_environment(&PrepareOptions::default())
        .unwrap();

    let cache_roles = runtime.cache_dir().roles();
    let roles = &runtime.environ()["ANSIBLE_ROLES_PATH"];
    assert!(roles.starts_with(cache_roles.to_str().unwrap()));
    assert!(roles.ends_with(":/custom/roles"));

    let library = &runtime.environ()["ANSIBLE_LIBRARY"];
    let project_modules = project.root().join("plugins/modules");
    assert!(library.split(':').any(|p| Path::new(p) == project_modules));
}

#[test]
fn old_runtime_uses_plural_collections_variable() {
    let toolchain = FakeToolchain::with_version("2.9.27");
    let project = TestProject::new();
    let mut environ = toolchain.environ();
    environ.insert("ANSIBLE_COLLECTIONS_PATHS".into(), "/legacy".into());
    let sink = Arc::new(CollectingSink::new());

    let mut runtime = builder_at(project.root(), environ, &sink)
        .isolated(true)
        .build()
        .unwrap();
    runtime
        .prepare_environment(&PrepareOptions::default())
        .unwrap();

    assert!(!runtime.environ().contains_key("ANSIBLE_COLLECTIONS_PATH"));
    let value = &runtime.environ()["ANSIBLE_COLLECTIONS_PATHS"];
    let cache = runtime.cache_dir().collections();
    assert!(value.starts_with(cache.to_str().unwrap()));
    assert!(value.ends_with(":/legacy"));
}

// =============================================================================
// Provisioning
// =============================================================================

#[test]
fn requirement_locations_install_in_order() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    let files = [
        "requirements.yml",
        "roles/requirements.yml",
        "tests/integration/requirements.yml",
    ];
    for file in files {
        project.write(file, "collections:\n  - name: acme.web\n");
    }
    let sink = Arc::new(CollectingSink::new());

    let mut runtime = builder_at(project.root(), toolchain.environ(), &sink)
        .isolated(true)
        .build()
        .unwrap();
    runtime
        .prepare_environment(&PrepareOptions::default())
        .unwrap();

    let installed: Vec<String> = galaxy_calls(&toolchain, "collection", "install")
        .iter()
        .filter_map(|i| i.flag_value("-r").map(str::to_string))
        .collect();
    let expected: Vec<String> = files
        .iter()
        .map(|f| project.root().join(f).display().to_string())
        .collect();
    assert_eq!(installed, expected);
}

#[test]
fn old_runtime_builds_before_installing() {
    let toolchain = FakeToolchain::with_version("2.10.5");
    let project = TestProject::new();
    project.galaxy("acme", "web");
    let sink = Arc::new(CollectingSink::new());

    let mut runtime = builder_at(project.root(), toolchain.environ(), &sink)
        .isolated(true)
        .build()
        .unwrap();
    runtime.prepare_environment(&install_local()).unwrap();

    let builds = galaxy_calls(&toolchain, "collection", "build");
    assert_eq!(builds.len(), 1);
    assert_eq!(
        builds[0].args.last().map(String::as_str),
        project.root().to_str()
    );

    let installs = galaxy_calls(&toolchain, "collection", "install");
    assert_eq!(installs.len(), 1);
    assert!(installs[0].has_arg("--force"));
    let archive = installs[0].args.last().unwrap();
    assert!(archive.ends_with("fake-collection-1.0.0.tar.gz"));
}

#[test]
fn role_project_is_linked_into_cache() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::named("ansible-role-web");
    project.role_meta("galaxy_info:\n  namespace: acme\n  author: Jane Doe\n");
    let sink = Arc::new(CollectingSink::new());

    let mut runtime = builder_at(project.root(), toolchain.environ(), &sink)
        .isolated(true)
        .build()
        .unwrap();
    runtime.prepare_environment(&install_local()).unwrap();

    let link = runtime.cache_dir().roles().join("acme.web");
    assert_eq!(std::fs::read_link(&link).unwrap(), project.root());

    // A second run finds the link already in place.
    runtime.prepare_environment(&install_local()).unwrap();
    assert_eq!(std::fs::read_link(&link).unwrap(), project.root());
    assert!(sink.messages().is_empty());
}

#[test]
fn project_without_metadata_is_tolerated() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    let sink = Arc::new(CollectingSink::new());

    let mut runtime = builder_at(project.root(), toolchain.environ(), &sink)
        .isolated(true)
        .build()
        .unwrap();
    runtime.prepare_environment(&install_local()).unwrap();

    let roles: Vec<_> = std::fs::read_dir(runtime.cache_dir().roles())
        .unwrap()
        .collect();
    assert!(roles.is_empty());
}

// =============================================================================
// Options and executables
// =============================================================================

#[test]
fn project_options_file_drives_retries() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    project.write(".ansible-compat.toml", "max_retries = 1\nretry_delay_ms = 0\n");
    let requirements = project.requirements("- src: geerlingguy.java\n");
    let sink = Arc::new(CollectingSink::new());

    let options = RuntimeOptions::discover(project.root()).unwrap();
    assert_eq!(options.max_retries, 1);
    let runtime = Runtime::builder(project.root())
        .environ(toolchain.environ())
        .options(options)
        .warning_sink(sink.clone())
        .build()
        .unwrap();

    toolchain.fail_galaxy(1);
    runtime
        .install_requirements(&requirements, true, false)
        .unwrap();
    assert_eq!(galaxy_calls(&toolchain, "role", "install").len(), 2);
}

#[test]
fn bin_dir_locates_executables() {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    let mut environ = toolchain.environ();
    environ.insert("PATH".into(), "/usr/bin:/bin".into());
    let sink = Arc::new(CollectingSink::new());

    let runtime = Runtime::builder(project.root())
        .environ(environ)
        .options(RuntimeOptions {
            bin_dir: Some(toolchain.bin_dir()),
            ..quick()
        })
        .warning_sink(sink.clone())
        .build()
        .unwrap();
    assert_eq!(runtime.version().unwrap().to_string(), "2.16.3");
}

#[rstest]
#[case(Some("2.15"), None, true)]
#[case(Some("2.16.3"), None, true)]
#[case(Some("2.17"), None, false)]
#[case(None, Some("2.16.3"), false)]
#[case(Some("2.16"), Some("2.17"), true)]
fn version_range_against_probed_runtime(
    #[case] lower: Option<&str>,
    #[case] upper: Option<&str>,
    #[case] expected: bool,
) {
    let toolchain = FakeToolchain::new();
    let project = TestProject::new();
    let sink = Arc::new(CollectingSink::new());
    let runtime = builder_at(project.root(), toolchain.environ(), &sink)
        .build()
        .unwrap();

    assert_eq!(runtime.version_in_range(lower, upper).unwrap(), expected);
}
