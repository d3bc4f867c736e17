//! Console configuration.
//!
//! Loaded from environment variables; [`Config::from_vars`] takes a map so
//! tests never touch the process environment.

use common::config::ObservabilityConfig;
use common::types::{ParticipantId, Role};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::dispatcher::DEFAULT_RANDOM_PICK_ATTEMPTS;
use crate::pubsub::DEFAULT_CHANNEL_CAPACITY;
use crate::session::DEFAULT_REJOIN_SUPPRESSION;

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// A participant seeded from `CLASSROOM_ROSTER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: ParticipantId,
    pub name: String,
    pub role: Role,
}

impl FromStr for RosterEntry {
    type Err = ConfigError;

    /// Parse `id[:name[:role]]`. Name defaults to the id, role to student.
    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::InvalidValue(format!("{entry:?}: {reason}"));
        let mut parts = entry.trim().splitn(3, ':');

        let id = ParticipantId::new(parts.next().unwrap_or_default().trim())
            .map_err(|e| invalid(e.to_string()))?;
        let name = parts
            .next()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| id.to_string(), str::to_string);
        let role = match parts.next() {
            Some(role) => Role::from_str(role.trim()).map_err(|e| invalid(e.to_string()))?,
            None => Role::Student,
        };

        Ok(RosterEntry { id, name, role })
    }
}

/// Classroom console configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local participant id (`CLASSROOM_PARTICIPANT_ID`, required).
    pub participant_id: ParticipantId,

    /// Local display name (default: the participant id).
    pub display_name: String,

    /// Local role (default: student).
    pub role: Role,

    /// Participants already in the meeting at startup.
    pub roster: Vec<RosterEntry>,

    /// Health endpoint bind address (default: "0.0.0.0:8090").
    pub health_bind_address: String,

    /// How long a rejoin is refused after the host ends the meeting.
    pub rejoin_suppression: Duration,

    /// Retry bound for the random pick hotkey.
    pub random_pick_attempts: usize,

    /// Per-topic pub/sub buffer.
    pub channel_capacity: usize,

    /// Session lifetime; `None` means the session never expires.
    pub session_ttl: Option<Duration>,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `CLASSROOM_PARTICIPANT_ID` is
    /// unset and `ConfigError::InvalidValue` for values that do not parse.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let participant_id = vars
            .get("CLASSROOM_PARTICIPANT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("CLASSROOM_PARTICIPANT_ID".to_string()))
            .and_then(|id| {
                ParticipantId::new(id.as_str()).map_err(|e| {
                    ConfigError::InvalidValue(format!("CLASSROOM_PARTICIPANT_ID: {e}"))
                })
            })?;

        let display_name = vars
            .get("CLASSROOM_DISPLAY_NAME")
            .filter(|name| !name.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| participant_id.to_string());

        let role = match vars.get("CLASSROOM_ROLE") {
            Some(role) => Role::from_str(role)
                .map_err(|e| ConfigError::InvalidValue(format!("CLASSROOM_ROLE: {e}")))?,
            None => Role::Student,
        };

        let roster = match vars.get("CLASSROOM_ROSTER") {
            Some(raw) => parse_roster(raw)?,
            None => Vec::new(),
        };

        let health_bind_address = vars
            .get("CLASSROOM_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let rejoin_suppression = parse_number(vars, "CLASSROOM_REJOIN_SUPPRESSION_SECONDS")?
            .map_or(DEFAULT_REJOIN_SUPPRESSION, Duration::from_secs);

        let random_pick_attempts = parse_number(vars, "CLASSROOM_RANDOM_PICK_ATTEMPTS")?
            .unwrap_or(DEFAULT_RANDOM_PICK_ATTEMPTS);
        if random_pick_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "CLASSROOM_RANDOM_PICK_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let channel_capacity = parse_number(vars, "CLASSROOM_CHANNEL_CAPACITY")?
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        if channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CLASSROOM_CHANNEL_CAPACITY must be at least 1".to_string(),
            ));
        }

        let session_ttl =
            parse_number(vars, "CLASSROOM_SESSION_TTL_SECONDS")?.map(Duration::from_secs);

        let observability = ObservabilityConfig::from_vars(vars)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(Config {
            participant_id,
            display_name,
            role,
            roster,
            health_bind_address,
            rejoin_suppression,
            random_pick_attempts,
            channel_capacity,
            session_ttl,
            observability,
        })
    }
}

fn parse_number<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    vars.get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("{key}: {raw:?} is not a number")))
        })
        .transpose()
}

/// Parse `id:name:role,...`.
fn parse_roster(raw: &str) -> Result<Vec<RosterEntry>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            RosterEntry::from_str(entry)
                .map_err(|e| ConfigError::InvalidValue(format!("CLASSROOM_ROSTER: {e}")))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "CLASSROOM_PARTICIPANT_ID".to_string(),
            "teacher-1".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.participant_id.as_str(), "teacher-1");
        assert_eq!(config.display_name, "teacher-1");
        assert_eq!(config.role, Role::Student);
        assert!(config.roster.is_empty());
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.rejoin_suppression, Duration::from_secs(15));
        assert_eq!(config.random_pick_attempts, 20);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.session_ttl, None);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("CLASSROOM_DISPLAY_NAME".to_string(), "Ms. Park".to_string());
        vars.insert("CLASSROOM_ROLE".to_string(), "Teacher".to_string());
        vars.insert(
            "CLASSROOM_HEALTH_BIND_ADDRESS".to_string(),
            "127.0.0.1:9000".to_string(),
        );
        vars.insert(
            "CLASSROOM_REJOIN_SUPPRESSION_SECONDS".to_string(),
            "30".to_string(),
        );
        vars.insert("CLASSROOM_RANDOM_PICK_ATTEMPTS".to_string(), "5".to_string());
        vars.insert("CLASSROOM_CHANNEL_CAPACITY".to_string(), "16".to_string());
        vars.insert("CLASSROOM_SESSION_TTL_SECONDS".to_string(), "3600".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.display_name, "Ms. Park");
        assert_eq!(config.role, Role::Teacher);
        assert_eq!(config.health_bind_address, "127.0.0.1:9000");
        assert_eq!(config.rejoin_suppression, Duration::from_secs(30));
        assert_eq!(config.random_pick_attempts, 5);
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.session_ttl, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_from_vars_missing_participant_id() {
        let result = Config::from_vars(&HashMap::new());
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "CLASSROOM_PARTICIPANT_ID")
        );
    }

    #[test]
    fn test_from_vars_rejects_bad_values() {
        for (key, value) in [
            ("CLASSROOM_ROLE", "principal"),
            ("CLASSROOM_CHANNEL_CAPACITY", "0"),
            ("CLASSROOM_RANDOM_PICK_ATTEMPTS", "many"),
            ("CLASSROOM_REJOIN_SUPPRESSION_SECONDS", "-1"),
            ("CLASSROOM_JSON_LOGS", "sometimes"),
        ] {
            let mut vars = base_vars();
            vars.insert(key.to_string(), value.to_string());
            assert!(
                matches!(Config::from_vars(&vars), Err(ConfigError::InvalidValue(_))),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_roster_parsing() {
        let mut vars = base_vars();
        vars.insert(
            "CLASSROOM_ROSTER".to_string(),
            "s1:Ada:student, s2:Ben , t2:Mr. Lee:teacher,s3".to_string(),
        );

        let roster = Config::from_vars(&vars).unwrap().roster;
        let summary: Vec<_> = roster
            .iter()
            .map(|e| (e.id.as_str(), e.name.as_str(), e.role))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("s1", "Ada", Role::Student),
                ("s2", "Ben", Role::Student),
                ("t2", "Mr. Lee", Role::Teacher),
                ("s3", "s3", Role::Student),
            ]
        );
    }

    #[test]
    fn test_roster_rejects_empty_id() {
        let mut vars = base_vars();
        vars.insert("CLASSROOM_ROSTER".to_string(), ":Nobody".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
