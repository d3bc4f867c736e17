//! Common configuration types for classroom components.

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "classroom_signaling=debug,tower_http=info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (`RUST_LOG` syntax)
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Read `RUST_LOG` and `CLASSROOM_JSON_LOGS` from a variable map.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::Configuration` if `CLASSROOM_JSON_LOGS` is not a boolean.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let log_filter = vars
            .get("RUST_LOG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let json_logs = match vars.get("CLASSROOM_JSON_LOGS").map(String::as_str) {
            None => false,
            Some("1" | "true" | "TRUE" | "yes") => true,
            Some("0" | "false" | "FALSE" | "no") => false,
            Some(other) => {
                return Err(CommonError::Configuration(format!(
                    "CLASSROOM_JSON_LOGS must be a boolean, got {other:?}"
                )))
            }
        };

        Ok(Self {
            log_filter,
            json_logs,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ObservabilityConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, ObservabilityConfig::default());
    }

    #[test]
    fn test_json_logs_parsing() {
        let vars = HashMap::from([("CLASSROOM_JSON_LOGS".to_string(), "true".to_string())]);
        assert!(ObservabilityConfig::from_vars(&vars).unwrap().json_logs);

        let vars = HashMap::from([("CLASSROOM_JSON_LOGS".to_string(), "maybe".to_string())]);
        assert!(matches!(
            ObservabilityConfig::from_vars(&vars),
            Err(CommonError::Configuration(_))
        ));
    }

    #[test]
    fn test_rust_log_override() {
        let vars = HashMap::from([("RUST_LOG".to_string(), "warn".to_string())]);
        let config = ObservabilityConfig::from_vars(&vars).unwrap();
        assert_eq!(config.log_filter, "warn");
    }
}
