//! Collection metadata: `galaxy.yml`, `MANIFEST.json` and listings.

use crate::constants::{NO_USABLE_PATHS, RC_ANSIBLE_OPTIONS_ERROR};
use crate::error::{Error, Result};
use crate::process::ProcessOutput;
use crate::sink::WarningSink;
use compat_config::Version;
use compat_fs::{ProjectPath, load_json, load_yaml};
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static URL_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git[+@]").expect("static regex"));

/// Subdirectories that may hold a collection, e.g. `acme/` in a monorepo.
static NAMESPACE_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]+$").expect("static regex"));

/// True for references that point at a source repository, not a name.
pub fn is_url(reference: &str) -> bool {
    URL_REFERENCE.is_match(reference)
}

/// A collection as reported by the runtime's collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

/// A collection found on disk by reading its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledCollection {
    pub namespace: String,
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
}

impl InstalledCollection {
    /// Read `<collections_root>/ansible_collections/<namespace>/<name>`.
    ///
    /// Returns `None` when the directory does not exist. A directory without
    /// `MANIFEST.json` is an error: the collection is present but unusable.
    pub fn find(collections_root: &Path, namespace: &str, name: &str) -> Result<Option<Self>> {
        let path = collections_root
            .join(ProjectPath::AnsibleCollections)
            .join(namespace)
            .join(name);
        if !path.exists() {
            return Ok(None);
        }
        let manifest = path.join(ProjectPath::CollectionManifest);
        if !manifest.is_file() {
            return Err(Error::invalid_prerequisite(format!(
                "Found collection at '{}' but missing MANIFEST.json, cannot get info.",
                path.display()
            )));
        }
        let data: ManifestFile = load_json(&manifest)?;
        let version = Version::parse_collection(&data.collection_info.version).map_err(|e| {
            Error::invalid_prerequisite(format!("{}: {}", manifest.display(), e))
        })?;
        Ok(Some(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            version,
            path,
        }))
    }

    pub fn fqcn(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl fmt::Display for InstalledCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.fqcn(), self.version, self.path.display())
    }
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    collection_info: ManifestInfo,
}

#[derive(Debug, Deserialize)]
struct ManifestInfo {
    version: String,
}

/// `galaxy.yml` files describing collections at or directly below `dir`.
pub fn search_galaxy_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let own = dir.join(ProjectPath::GalaxyFile);
    if own.is_file() {
        found.push(own);
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(Error::io(dir, e)),
    };
    let mut nested: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| NAMESPACE_DIR.is_match(n))
        })
        .map(|path| path.join(ProjectPath::GalaxyFile))
        .filter(|galaxy| galaxy.is_file())
        .collect();
    nested.sort();
    found.extend(nested);
    Ok(found)
}

/// `namespace/name` of the collection described by `dir/galaxy.yml`.
///
/// `None` when there is no `galaxy.yml`. A file without both keys is an
/// error.
pub fn colpath_from_path(dir: &Path) -> Result<Option<String>> {
    let galaxy = dir.join(ProjectPath::GalaxyFile);
    if !galaxy.is_file() {
        return Ok(None);
    }
    let data: Value = load_yaml(&galaxy)?;
    let field = |key: &str| {
        data.get(key).and_then(Value::as_str).ok_or_else(|| {
            Error::invalid_prerequisite(format!(
                "{} is missing the mandatory '{key}' key.",
                galaxy.display()
            ))
        })
    };
    Ok(Some(format!("{}/{}", field("namespace")?, field("name")?)))
}

/// `(name, version constraint)` pairs from the `dependencies` mapping.
pub fn galaxy_dependencies(galaxy: &Path) -> Result<Vec<(String, String)>> {
    let data: Value = load_yaml(galaxy)?;
    let Some(deps) = data.get("dependencies").and_then(Value::as_mapping) else {
        return Ok(Vec::new());
    };
    Ok(deps
        .iter()
        .filter_map(|(name, version)| Some((name.as_str()?.to_string(), scalar(version))))
        .collect())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "*".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Parse `ansible-galaxy collection list --format=json` output.
///
/// The listing is `{path: {fqcn: {"version": ...}}}`. When a collection is
/// listed under several paths the first one wins and the rest are reported
/// to `sink`.
pub fn parse_collection_list(
    output: &ProcessOutput,
    sink: &dyn WarningSink,
) -> Result<Vec<Collection>> {
    if output.returncode == RC_ANSIBLE_OPTIONS_ERROR
        && (output.stdout.contains(NO_USABLE_PATHS) || output.stderr.contains(NO_USABLE_PATHS))
    {
        tracing::debug!("Ansible reported no installed collections at all.");
        return Ok(Vec::new());
    }
    if !output.success() {
        tracing::error!("{}", output);
        return Err(Error::runtime(format!("Unable to list collections: {output}")));
    }
    let data: serde_json::Value = serde_json::from_str(&output.stdout).map_err(|_| {
        Error::runtime(format!(
            "Unable to parse galaxy output as JSON: {}",
            output.stdout
        ))
    })?;
    let unexpected =
        |value: &serde_json::Value| Error::runtime(format!("Unexpected collection data, {value}"));

    let by_path = data.as_object().ok_or_else(|| unexpected(&data))?;
    let mut collections: Vec<Collection> = Vec::new();
    for (path, listed) in by_path {
        let listed = listed.as_object().ok_or_else(|| unexpected(listed))?;
        for (name, info) in listed {
            let info = info.as_object().ok_or_else(|| unexpected(info))?;
            let version = match info.get("version") {
                Some(serde_json::Value::String(v)) => v.clone(),
                Some(other) => other.to_string(),
                None => "*".to_string(),
            };
            if let Some(first) = collections.iter().find(|c| &c.name == name) {
                sink.warn(&format!(
                    "Another version of '{name}' {version} was found installed in {path}, only the first one will be used, {} ({}).",
                    first.version,
                    first.path.display()
                ));
                continue;
            }
            collections.push(Collection {
                name: name.clone(),
                version,
                path: PathBuf::from(path),
            });
        }
    }
    Ok(collections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn output(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            args: vec!["ansible-galaxy".into(), "collection".into(), "list".into()],
            returncode: code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[rstest]
    #[case("git+https://github.com/acme/web.git", true)]
    #[case("git@github.com:acme/web.git", true)]
    #[case("acme.web", false)]
    #[case("acme.web:>=1.0", false)]
    #[case("https://example.com/acme-web-1.0.0.tar.gz", false)]
    fn url_detection(#[case] reference: &str, #[case] expected: bool) {
        assert_eq!(is_url(reference), expected);
    }

    #[test]
    fn listing_first_path_wins() {
        let sink = CollectingSink::new();
        let json = r#"{
            "/z/collections": {"acme.web": {"version": "2.0.0"}},
            "/a/collections": {"acme.web": {"version": "1.0.0"}, "acme.db": {"version": "0.1.0"}}
        }"#;
        let collections = parse_collection_list(&output(0, json, ""), &sink).unwrap();

        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].name, "acme.web");
        assert_eq!(collections[0].version, "2.0.0");
        assert_eq!(collections[0].path, PathBuf::from("/z/collections"));
        assert!(sink.contains("only the first one will be used"));
    }

    #[test]
    fn no_usable_paths_means_empty() {
        let sink = CollectingSink::new();
        let out = output(
            5,
            "",
            "ERROR! None of the provided paths were usable. Please specify a valid path",
        );
        assert!(parse_collection_list(&out, &sink).unwrap().is_empty());
    }

    #[rstest]
    #[case(output(1, "", "boom"), "Unable to list collections")]
    #[case(output(0, "not json", ""), "Unable to parse galaxy output as JSON")]
    #[case(output(0, "[1, 2]", ""), "Unexpected collection data")]
    #[case(output(0, r#"{"/p": {"acme.web": "1.0"}}"#, ""), "Unexpected collection data")]
    fn listing_errors(#[case] out: ProcessOutput, #[case] expected: &str) {
        let err = parse_collection_list(&out, &CollectingSink::new()).unwrap_err();
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[test]
    fn galaxy_search_includes_namespace_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::write(root.join("galaxy.yml"), "namespace: a\nname: b\n").unwrap();
        for dir in ["acme", "Bad", "_hidden", "zz"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
            std::fs::write(root.join(dir).join("galaxy.yml"), "").unwrap();
        }
        std::fs::create_dir_all(root.join("empty")).unwrap();

        let found = search_galaxy_paths(root).unwrap();
        assert_eq!(
            found,
            vec![
                root.join("galaxy.yml"),
                root.join("acme/galaxy.yml"),
                root.join("zz/galaxy.yml"),
            ]
        );
    }

    #[test]
    fn colpath_and_dependencies() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("galaxy.yml"),
            "namespace: acme\nname: web\ndependencies:\n  acme.db: '>=1.2.0'\n  community.general: 7\n",
        )
        .unwrap();

        assert_eq!(colpath_from_path(temp.path()).unwrap().as_deref(), Some("acme/web"));
        let deps = galaxy_dependencies(&temp.path().join("galaxy.yml")).unwrap();
        assert_eq!(
            deps,
            vec![
                ("acme.db".to_string(), ">=1.2.0".to_string()),
                ("community.general".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn colpath_without_galaxy_file() {
        let temp = TempDir::new().unwrap();
        assert_eq!(colpath_from_path(temp.path()).unwrap(), None);
    }

    #[test]
    fn colpath_requires_both_keys() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("galaxy.yml"), "namespace: acme\n").unwrap();
        let err = colpath_from_path(temp.path()).unwrap_err();
        assert_eq!(err.code(), 10);
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn installed_collection_lookup() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("ansible_collections/acme/web");
        std::fs::create_dir_all(&dir).unwrap();

        let err = InstalledCollection::find(temp.path(), "acme", "web").unwrap_err();
        assert!(err.to_string().contains("missing MANIFEST.json"));

        std::fs::write(
            dir.join("MANIFEST.json"),
            r#"{"collection_info": {"namespace": "acme", "name": "web", "version": "1.2.3"}}"#,
        )
        .unwrap();
        let found = InstalledCollection::find(temp.path(), "acme", "web").unwrap().unwrap();
        assert_eq!(found.version.to_string(), "1.2.3");
        assert_eq!(found.fqcn(), "acme.web");
        assert_eq!(InstalledCollection::find(temp.path(), "acme", "db").unwrap(), None);
    }
}
