//! Version parsing and comparison.
//!
//! The runtime and its collections publish versions in several shapes:
//! plain semver (`2.16.3`), two components (`2.16`), and Python-style
//! pre-releases (`2.17.0rc1`, `2.20.0.dev0`). All of them are mapped onto
//! [`semver::Version`] so comparisons are total and consistent.
//!
//! # Examples
//!
//! ```
//! use compat_config::Version;
//!
//! let stable = Version::parse("2.16").unwrap();
//! let candidate = Version::parse("2.17.0rc1").unwrap();
//! assert!(candidate > stable);
//! assert!(candidate.is_prerelease());
//! ```

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Oldest runtime release this crate is tested against.
pub const MIN_SUPPORTED: &str = "2.16";

static LOOSE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:[.\-]?((?:alpha|beta|dev|pre|rc|a|b|c)[0-9A-Za-z.]*))?(?:\+([0-9A-Za-z.\-]+))?$",
    )
    .expect("static regex")
});

static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\w+ \[(?:core|base) (?P<version>[^\]]+)\]").expect("static regex")
});

/// A comparable runtime or collection version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct Version(semver::Version);

impl Version {
    /// Parse a version string.
    ///
    /// Accepts `major`, `major.minor` and `major.minor.patch`, optionally
    /// followed by a pre-release tag with or without a separator.
    pub fn parse(version: &str) -> Result<Self> {
        let trimmed = version.trim();
        if let Ok(v) = semver::Version::parse(trimmed) {
            return Ok(Self(v));
        }

        let caps = LOOSE_VERSION
            .captures(trimmed)
            .ok_or_else(|| Error::InvalidVersion {
                version: version.to_string(),
                reason: "not a recognized version format".to_string(),
            })?;

        let component = |idx: usize| caps.get(idx).map(|m| m.as_str()).unwrap_or("0");
        let mut normalized = format!("{}.{}.{}", component(1), component(2), component(3));
        if let Some(pre) = caps.get(4) {
            normalized.push('-');
            normalized.push_str(pre.as_str());
        }
        if let Some(build) = caps.get(5) {
            normalized.push('+');
            normalized.push_str(build.as_str());
        }

        semver::Version::parse(&normalized)
            .map(Self)
            .map_err(|e| Error::InvalidVersion {
                version: version.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parse a collection version, where `*` means "any" and sorts lowest.
    pub fn parse_collection(version: &str) -> Result<Self> {
        if version.trim() == "*" {
            return Ok(Self(semver::Version::new(0, 0, 0)));
        }
        Self::parse(version)
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<semver::Version> for Version {
    fn from(v: semver::Version) -> Self {
        Self(v)
    }
}

/// Extract the runtime version from `--version` output.
///
/// Debug builds print a preamble before the version line, so the whole
/// output is scanned for a line shaped like `ansible [core 2.16.3]`. Output
/// without such a line is an error, never a default.
pub fn parse_version_output(stdout: &str) -> Result<Version> {
    let caps = VERSION_LINE
        .captures(stdout)
        .ok_or_else(|| Error::UnparsableVersionOutput {
            output: stdout.to_string(),
            minimum: MIN_SUPPORTED.to_string(),
        })?;
    Version::parse(&caps["version"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2.16.3", "2.16.3")]
    #[case("2.16", "2.16.0")]
    #[case("2", "2.0.0")]
    #[case("2.17.0rc1", "2.17.0-rc1")]
    #[case("2.20.0dev0", "2.20.0-dev0")]
    #[case("2.20.0.dev0", "2.20.0-dev0")]
    #[case("1.0.0-beta.1", "1.0.0-beta.1")]
    #[case("v3.1.4", "3.1.4")]
    fn normalizes_loose_versions(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Version::parse(input).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("latest")]
    #[case("2.x")]
    #[case("1.2.3.4")]
    fn rejects_garbage(#[case] input: &str) {
        assert!(matches!(
            Version::parse(input),
            Err(Error::InvalidVersion { .. })
        ));
    }

    #[test]
    fn ordering_is_semver() {
        let v = |s| Version::parse(s).unwrap();
        assert!(v("2.9.27") < v("2.10"));
        assert!(v("2.16.0rc1") < v("2.16.0"));
        assert!(v("2.16.0") < v("2.16.1"));
    }

    #[test]
    fn wildcard_collection_version_is_lowest() {
        let any = Version::parse_collection("*").unwrap();
        assert_eq!(any, Version::parse("0.0.0").unwrap());
        assert!(any < Version::parse("0.0.1").unwrap());
    }

    #[test]
    fn prerelease_detection() {
        assert!(Version::parse("1.0.0-beta.1").unwrap().is_prerelease());
        assert!(!Version::parse("1.0.0").unwrap().is_prerelease());
    }

    #[test]
    fn version_line_after_debug_preamble() {
        let out = "Loading config\n[DEPRECATION WARNING]: noise\nansible [core 2.16.3]\n  config file = None\n";
        assert_eq!(parse_version_output(out).unwrap().to_string(), "2.16.3");
    }

    #[test]
    fn base_flavor_accepted() {
        let out = "ansible [base 2.10.17]\n";
        assert_eq!(parse_version_output(out).unwrap().to_string(), "2.10.17");
    }

    #[test]
    fn legacy_output_rejected() {
        let err = parse_version_output("ansible 2.9.10\n").unwrap_err();
        assert!(matches!(err, Error::UnparsableVersionOutput { .. }));
        assert!(err.to_string().contains("2.16 or newer"));
    }
}
