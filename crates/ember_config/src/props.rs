//! Flat property map with fail-safe loading.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// A flat map of runtime properties consulted by the execution layer.
///
/// Property names are dotted strings (e.g. `"debug.nocache"`), stored as
/// quoted keys in the TOML file:
///
/// ```toml
/// "debug.nocache" = true
/// ```
///
/// Boolean queries default to `false` when the property is unset, so an
/// empty map is always a valid configuration.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, bool>,
}

impl Properties {
    /// Creates an empty property map (every boolean query returns `false`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads properties from a file, fail-safe.
    ///
    /// A missing or unparsable file yields an empty map; property lookup
    /// must never block script preparation.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| Self::from_toml_str(&content).ok())
            .unwrap_or_default()
    }

    /// Parses properties from a TOML string.
    ///
    /// Accepts booleans, integers (non-zero is `true`), and the strings
    /// `"0"`/`"1"`/`"false"`/`"true"`. Any other value is an error.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let mut values = HashMap::with_capacity(table.len());
        for (key, value) in table {
            let parsed = match value {
                toml::Value::Boolean(b) => b,
                toml::Value::Integer(n) => n != 0,
                toml::Value::String(s) => match s.as_str() {
                    "0" | "false" => false,
                    "1" | "true" => true,
                    _ => return Err(ConfigError::UnsupportedValue(key)),
                },
                _ => return Err(ConfigError::UnsupportedValue(key)),
            };
            values.insert(key, parsed);
        }
        Ok(Self { values })
    }

    /// Returns the boolean value of a property, defaulting to `false` when unset.
    pub fn get_bool(&self, name: &str) -> bool {
        self.values.get(name).copied().unwrap_or(false)
    }

    /// Sets a boolean property programmatically.
    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.values.insert(name.to_string(), value);
    }

    /// Returns the number of properties that are set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
