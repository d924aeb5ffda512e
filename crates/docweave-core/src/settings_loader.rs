//! Settings loading from configuration files.
//!
//! [`Settings`] can be loaded from TOML or JSON, with environment variable
//! overrides applied on top.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `DOCWEAVE_DEBUG` | `debug` |
//! | `DOCWEAVE_LOG_LEVEL` | `log_level` |
//! | `DOCWEAVE_STRICT` | `template.strict` |
//! | `DOCWEAVE_MAX_NESTING_DEPTH` | `template.max_nesting_depth` |
//! | `DOCWEAVE_TEMPLATE_DIRS` | `template.dirs` (platform path-list separated) |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use docweave_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file("docweave.toml").unwrap();
//! let settings = settings_loader::from_json_file_with_env("docweave.json").unwrap();
//! ```

use std::path::Path;

use crate::error::DocweaveError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns a `Configuration` error if the TOML is malformed or cannot be
/// deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, DocweaveError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| DocweaveError::Configuration(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, DocweaveError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, DocweaveError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns a `Configuration` error if the JSON is malformed or cannot be
/// deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, DocweaveError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| DocweaveError::Configuration(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, DocweaveError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, DocweaveError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `DOCWEAVE_*` environment variable overrides to a settings struct.
///
/// Boolean variables accept "true", "1" and "yes" (case-insensitive) as
/// true; anything else is false. Unparseable numbers are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("DOCWEAVE_DEBUG") {
        settings.debug = parse_bool(&val);
    }

    if let Ok(val) = std::env::var("DOCWEAVE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("DOCWEAVE_STRICT") {
        settings.template.strict = parse_bool(&val);
    }

    if let Ok(val) = std::env::var("DOCWEAVE_MAX_NESTING_DEPTH") {
        if let Ok(depth) = val.trim().parse::<usize>() {
            settings.template.max_nesting_depth = depth;
        }
    }

    if let Some(val) = std::env::var_os("DOCWEAVE_TEMPLATE_DIRS") {
        settings.template.dirs = std::env::split_paths(&val)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
    }
}

// ============================================================
// Helpers
// ============================================================

fn parse_bool(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn read_config(path: &Path, format: &str) -> Result<String, DocweaveError> {
    std::fs::read_to_string(path).map_err(|e| {
        DocweaveError::Configuration(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

/// Deep-merges `value` over the serialized default settings and deserializes
/// the result.
fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, DocweaveError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        DocweaveError::Configuration(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        DocweaveError::Configuration(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
