//! [`TestProject`] builder for project directory layouts.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory with helpers for common layouts.
///
/// # Example
///
/// ```rust,no_run
/// use compat_test_utils::TestProject;
///
/// let project = TestProject::named("ansible-role-foo");
/// project.role_meta("galaxy_info:\n  role_name: foo\n  namespace: acme\n");
/// project.assert_file_exists("meta/main.yml");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
    root: PathBuf,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    /// Create an empty project directory.
    pub fn new() -> Self {
        Self::named("project")
    }

    /// Create an empty project whose directory has the given basename.
    pub fn named(name: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join(name);
        fs::create_dir_all(&root).unwrap();
        Self { temp_dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch space next to the project, outside of it.
    pub fn sibling(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Write `content` to `path` relative to the project root.
    pub fn write(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
        full_path
    }

    pub fn mkdir(&self, path: &str) -> PathBuf {
        let full_path = self.root.join(path);
        fs::create_dir_all(&full_path).unwrap();
        full_path
    }

    pub fn requirements(&self, content: &str) -> PathBuf {
        self.write("requirements.yml", content)
    }

    pub fn role_meta(&self, content: &str) -> PathBuf {
        self.write("meta/main.yml", content)
    }

    pub fn galaxy(&self, namespace: &str, name: &str) -> PathBuf {
        self.write(
            "galaxy.yml",
            &format!("namespace: {namespace}\nname: {name}\nversion: 1.0.0\n"),
        )
    }

    /// Place an installed collection below `collections_root`.
    pub fn installed_collection(
        collections_root: &Path,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> PathBuf {
        let dir = collections_root
            .join("ansible_collections")
            .join(namespace)
            .join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("MANIFEST.json"),
            format!(
                r#"{{"collection_info": {{"namespace": "{namespace}", "name": "{name}", "version": "{version}"}}}}"#
            ),
        )
        .unwrap();
        dir
    }

    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root.join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.root.join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }
}
