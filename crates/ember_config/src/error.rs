//! Error types for property loading.

/// Errors that can occur when parsing a property file.
///
/// Only surfaced by the explicit parse entry points; the fail-safe loader
/// swallows these and returns an empty property map instead.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the property file.
    #[error("failed to read properties: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse properties: {0}")]
    ParseError(String),

    /// A property value has a type that cannot be interpreted.
    #[error("unsupported value for property '{0}'")]
    UnsupportedValue(String),
}
