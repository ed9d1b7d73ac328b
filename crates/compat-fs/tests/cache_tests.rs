use assert_fs::prelude::*;
use compat_fs::{CacheDir, ProjectPath};
use predicates::prelude::*;
use std::collections::BTreeMap;

#[test]
fn resolve_is_deterministic_for_same_project() {
    let temp = assert_fs::TempDir::new().unwrap();
    let project = temp.child("project");
    project.create_dir_all().unwrap();

    let first = CacheDir::resolve(project.path(), true, &BTreeMap::new()).unwrap();
    let second = CacheDir::resolve(project.path(), true, &BTreeMap::new()).unwrap();

    assert_eq!(first.dir.path(), second.dir.path());
    project
        .child(ProjectPath::CacheDir.as_str())
        .child("roles")
        .assert(predicate::path::is_dir());
    project
        .child(ProjectPath::CacheDir.as_str())
        .child("collections")
        .assert(predicate::path::is_dir());
}

#[test]
fn different_projects_get_different_directories() {
    let temp = assert_fs::TempDir::new().unwrap();
    let a = temp.child("a");
    let b = temp.child("b");
    a.create_dir_all().unwrap();
    b.create_dir_all().unwrap();

    let first = CacheDir::resolve(a.path(), true, &BTreeMap::new()).unwrap();
    let second = CacheDir::resolve(b.path(), true, &BTreeMap::new()).unwrap();

    assert_ne!(first.dir.path(), second.dir.path());
}

#[test]
fn layout_recreated_after_clean() {
    let temp = assert_fs::TempDir::new().unwrap();
    let selection = CacheDir::resolve(temp.path(), true, &BTreeMap::new()).unwrap();

    selection.dir.clean().unwrap();
    temp.child(".ansible").assert(predicate::path::missing());

    let again = CacheDir::resolve(temp.path(), true, &BTreeMap::new()).unwrap();
    assert!(again.dir.roles().is_dir());
}
