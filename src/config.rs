//! # Applier Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_DOCUMENT_DELIMITER, DEFAULT_LOG_FORMAT, DEFAULT_LOG_LEVEL, ENV_DOCUMENT_DELIMITER,
    ENV_STRICT_UNDEFINED,
};

/// Applier configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplierConfig {
    /// Separator between resource documents in a rendered manifest
    pub document_delimiter: String,
    /// Fail rendering when a template references an undefined value
    pub strict_undefined: bool,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            document_delimiter: DEFAULT_DOCUMENT_DELIMITER.to_string(),
            strict_undefined: true,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: DEFAULT_LOG_FORMAT.to_string(),
            log_enable_color: false,
        }
    }
}

impl ApplierConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let document_delimiter =
            env_var_or_default_str(ENV_DOCUMENT_DELIMITER, DEFAULT_DOCUMENT_DELIMITER);
        Self {
            // An empty delimiter would never split anything
            document_delimiter: if document_delimiter.trim().is_empty() {
                DEFAULT_DOCUMENT_DELIMITER.to_string()
            } else {
                document_delimiter
            },
            strict_undefined: env_var_or_default_bool(ENV_STRICT_UNDEFINED, true),
            log_level: env_var_or_default_str("LOG_LEVEL", DEFAULT_LOG_LEVEL),
            log_format: env_var_or_default_str("LOG_FORMAT", DEFAULT_LOG_FORMAT),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", false),
        }
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
