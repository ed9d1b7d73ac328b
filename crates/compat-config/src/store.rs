//! Parsed configuration dump of the external runtime.
//!
//! The dump is line oriented, `KEY(origin) = value`. Values that look like
//! literals (lists, mappings, quoted strings, numbers, booleans, `None`)
//! are evaluated, everything else is kept as the raw string.
//!
//! Keys are stored uppercase and looked up case-insensitively. A small
//! alias table lets the singular and plural spellings of the collections
//! path setting resolve to the same value.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DUMP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<key>[A-Za-z0-9_]+)[^=\n]*? = (?P<value>.*)$").expect("static regex")
});

/// Legacy names that resolve to each other in both directions.
const ALIASES: &[(&str, &str)] = &[("COLLECTIONS_PATH", "COLLECTIONS_PATHS")];

const DEFAULT_COLLECTIONS_PATHS: &[&str] =
    &["~/.ansible/collections", "/usr/share/ansible/collections"];
const DEFAULT_ROLES_PATH: &[&str] = &[
    "~/.ansible/roles",
    "/usr/share/ansible/roles",
    "/etc/ansible/roles",
];
const DEFAULT_MODULE_PATH: &[&str] = &[
    "~/.ansible/plugins/modules",
    "/usr/share/ansible/plugins/modules",
];

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Evaluate a raw dump value as a literal, falling back to the raw text.
    pub fn from_literal(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "None" => return Self::Null,
            "True" => return Self::Bool(true),
            "False" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        let numeric = raw
            .trim_start_matches('-')
            .starts_with(|c: char| c.is_ascii_digit() || c == '.');
        if numeric {
            if let Ok(f) = raw.parse::<f64>() {
                return Self::Float(f);
            }
        }
        if raw.starts_with(['[', '{', '\'', '"']) {
            if let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(raw) {
                return Self::from_yaml(value);
            }
        }
        Self::Str(raw.to_string())
    }

    fn from_yaml(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Str(n.to_string())),
            Value::String(s) if s == "None" => Self::Null,
            Value::String(s) => Self::Str(s),
            Value::Sequence(items) => Self::List(items.into_iter().map(Self::from_yaml).collect()),
            Value::Mapping(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(k), Self::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "a boolean",
            Self::Int(_) => "an integer",
            Self::Float(_) => "a float",
            Self::Str(_) => "a string",
            Self::List(_) => "a list",
            Self::Map(_) => "a mapping",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(ConfigValue::Str).collect())
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Configuration of the external runtime, keyed by uppercase option name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    data: BTreeMap<String, ConfigValue>,
}

impl ConfigStore {
    /// Parse the text produced by the configuration dump command.
    pub fn parse(dump: &str) -> Self {
        let mut data = BTreeMap::new();
        for caps in DUMP_LINE.captures_iter(dump) {
            let key = caps["key"].to_uppercase();
            let value = ConfigValue::from_literal(&caps["value"]);
            data.insert(key, value);
        }
        tracing::debug!(keys = data.len(), "Parsed configuration dump");
        Self { data }
    }

    /// Build a store from already-typed values.
    pub fn from_map(data: BTreeMap<String, ConfigValue>) -> Self {
        let data = data
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Self { data }
    }

    /// Look up a key case-insensitively, honouring legacy aliases.
    pub fn lookup(&self, key: &str) -> Option<&ConfigValue> {
        let name = key.to_uppercase();
        if let Some(value) = self.data.get(&name) {
            return Some(value);
        }
        ALIASES.iter().find_map(|&(a, b)| {
            if name == a {
                self.data.get(b)
            } else if name == b {
                self.data.get(a)
            } else {
                None
            }
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Unknown keys stay reachable through the raw mapping.
    pub fn raw(&self) -> &BTreeMap<String, ConfigValue> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return a copy with one value replaced.
    pub fn with_value(&self, key: &str, value: impl Into<ConfigValue>) -> Self {
        let mut copy = self.clone();
        let name = key.to_uppercase();
        let name = ALIASES
            .iter()
            .find_map(|&(a, b)| {
                if name == a && self.data.contains_key(b) {
                    Some(b.to_string())
                } else if name == b && self.data.contains_key(a) {
                    Some(a.to_string())
                } else {
                    None
                }
            })
            .unwrap_or(name);
        copy.data.insert(name, value.into());
        copy
    }

    /// Read a list of strings, `None` when the key is absent.
    ///
    /// A present value that is not a list of strings is an error, never
    /// coerced.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.lookup(key) else {
            return Ok(None);
        };
        let invalid = |found: &str| Error::InvalidValue {
            key: key.to_uppercase(),
            expected: "a list of strings".to_string(),
            found: found.to_string(),
        };
        let items = value.as_list().ok_or_else(|| invalid(value.kind()))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(&format!("a list containing {}", item.kind())))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn string_list_or(&self, key: &str, default: &[&str]) -> Result<Vec<String>> {
        Ok(self
            .string_list(key)?
            .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect()))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.lookup(key).and_then(ConfigValue::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.lookup(key).and_then(ConfigValue::as_str)
    }

    /// Configured collection search paths.
    pub fn collections_paths(&self) -> Result<Vec<String>> {
        self.string_list_or("COLLECTIONS_PATHS", DEFAULT_COLLECTIONS_PATHS)
    }

    /// Configured role search paths.
    pub fn default_roles_path(&self) -> Result<Vec<String>> {
        self.string_list_or("DEFAULT_ROLES_PATH", DEFAULT_ROLES_PATH)
    }

    /// Configured module search paths.
    pub fn default_module_path(&self) -> Result<Vec<String>> {
        self.string_list_or("DEFAULT_MODULE_PATH", DEFAULT_MODULE_PATH)
    }

    pub fn collections_scan_sys_path(&self) -> bool {
        self.get_bool("COLLECTIONS_SCAN_SYS_PATH").unwrap_or(true)
    }
}
