//! Version and configuration queries

use colored::Colorize;
use compat_runtime::ConfigValue;
use serde_json::Value;

use super::open_runtime;
use crate::cli::RuntimeArgs;
use crate::error::{CliError, Result};

/// Run the version command
pub fn run_version(args: &RuntimeArgs) -> Result<()> {
    let runtime = open_runtime(args)?;
    println!("{}", runtime.version()?);
    Ok(())
}

/// Run the config command
pub fn run_config(args: &RuntimeArgs, key: &str) -> Result<()> {
    let runtime = open_runtime(args)?;
    let value = runtime
        .config()
        .lookup(key)
        .ok_or_else(|| CliError::user(format!("Unknown configuration key {}", key.cyan())))?;
    println!("{}", render(value));
    Ok(())
}

/// Strings print bare, everything else as JSON.
fn render(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Str(s) => s.clone(),
        other => to_json(other).to_string(),
    }
}

fn to_json(value: &ConfigValue) -> Value {
    match value {
        ConfigValue::Null => Value::Null,
        ConfigValue::Bool(b) => Value::Bool(*b),
        ConfigValue::Int(i) => Value::from(*i),
        ConfigValue::Float(f) => Value::from(*f),
        ConfigValue::Str(s) => Value::String(s.clone()),
        ConfigValue::List(items) => Value::Array(items.iter().map(to_json).collect()),
        ConfigValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}
