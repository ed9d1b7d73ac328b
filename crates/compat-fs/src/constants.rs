//! Well-known file and directory names inside projects and cache directories.

use std::path::Path;

/// Requirement manifests looked up relative to the project directory, in
/// installation order.
pub const REQUIREMENT_LOCATIONS: &[&str] = &[
    "requirements.yml",
    "roles/requirements.yml",
    "collections/requirements.yml",
    "tests/requirements.yml",
    "tests/integration/requirements.yml",
    "tests/unit/requirements.yml",
];

/// Standard project and cache filesystem markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectPath {
    /// The `.ansible` directory used as cache root
    CacheDir,
    /// Role metadata, `meta/main.yml`
    MetaMain,
    /// Role metadata, alternative `meta/main.yaml` spelling
    MetaMainYaml,
    /// Collection metadata, `galaxy.yml`
    GalaxyFile,
    /// Installed collection manifest, `MANIFEST.json`
    CollectionManifest,
    /// The `roles` directory
    Roles,
    /// The `collections` directory
    Collections,
    /// The `modules` directory inside the cache
    Modules,
    /// Project-local modules, `plugins/modules`
    PluginModules,
    /// Root of installed collections below a collections path
    AnsibleCollections,
}

impl ProjectPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheDir => ".ansible",
            Self::MetaMain => "meta/main.yml",
            Self::MetaMainYaml => "meta/main.yaml",
            Self::GalaxyFile => "galaxy.yml",
            Self::CollectionManifest => "MANIFEST.json",
            Self::Roles => "roles",
            Self::Collections => "collections",
            Self::Modules => "modules",
            Self::PluginModules => "plugins/modules",
            Self::AnsibleCollections => "ansible_collections",
        }
    }

    /// Both accepted spellings of the role metadata file.
    pub fn meta_main_candidates() -> [ProjectPath; 2] {
        [Self::MetaMain, Self::MetaMainYaml]
    }
}

impl AsRef<Path> for ProjectPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for ProjectPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
