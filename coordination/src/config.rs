//! Coordinator configuration
//!
//! Defaults mirror the behavior participants already rely on. Each field can
//! be overridden from a TOML table or from `ASSEMBLY_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SessionError, SessionResult};

/// Which population the tiebreak-phase checks count against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumScope {
    /// Present members of the caller's room
    Room,
    /// Every registered identity, as reported by the credential store
    Global,
}

impl std::fmt::Display for QuorumScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuorumScope::Room => write!(f, "room"),
            QuorumScope::Global => write!(f, "global"),
        }
    }
}

impl std::str::FromStr for QuorumScope {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "room" => Ok(QuorumScope::Room),
            "global" => Ok(QuorumScope::Global),
            other => Err(SessionError::config(format!(
                "unknown quorum scope '{}', expected 'room' or 'global'",
                other
            ))),
        }
    }
}

/// Configuration for the session coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Shortest password accepted at registration
    pub min_password_length: usize,

    /// Length of generated room codes
    pub room_code_length: usize,

    /// Code generation attempts before giving up on a collision
    pub room_code_attempts: u32,

    /// Denominator used by arrival, agreement, and tiebreak completion checks
    pub tiebreak_quorum: QuorumScope,

    /// Reject a second tiebreak vote from the same voter on the same proposer
    pub dedupe_tiebreak_votes: bool,

    /// Broadcast channel capacity for session events
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_password_length: 4,
            room_code_length: 6,
            room_code_attempts: 32,
            tiebreak_quorum: QuorumScope::Global,
            dedupe_tiebreak_votes: true,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables
    pub fn from_env() -> SessionResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay `ASSEMBLY_*` environment variables on this config
    pub fn with_env_overrides(mut self) -> SessionResult<Self> {
        if let Ok(val) = std::env::var("ASSEMBLY_MIN_PASSWORD_LENGTH") {
            self.min_password_length = parse_env("ASSEMBLY_MIN_PASSWORD_LENGTH", &val)?;
        }
        if let Ok(val) = std::env::var("ASSEMBLY_ROOM_CODE_LENGTH") {
            self.room_code_length = parse_env("ASSEMBLY_ROOM_CODE_LENGTH", &val)?;
        }
        if let Ok(val) = std::env::var("ASSEMBLY_ROOM_CODE_ATTEMPTS") {
            self.room_code_attempts = parse_env("ASSEMBLY_ROOM_CODE_ATTEMPTS", &val)?;
        }
        if let Ok(val) = std::env::var("ASSEMBLY_TIEBREAK_QUORUM") {
            self.tiebreak_quorum = val.parse()?;
        }
        if let Ok(val) = std::env::var("ASSEMBLY_DEDUPE_TIEBREAK_VOTES") {
            self.dedupe_tiebreak_votes = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = std::env::var("ASSEMBLY_EVENT_CAPACITY") {
            self.event_capacity = parse_env("ASSEMBLY_EVENT_CAPACITY", &val)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Parse config from a TOML document
    pub fn from_toml_str(content: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SessionError::config(format!("invalid session config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values the coordinator cannot run with
    pub fn validate(&self) -> SessionResult<()> {
        if self.room_code_length == 0 {
            return Err(SessionError::config("room_code_length must be at least 1"));
        }
        if self.room_code_attempts == 0 {
            return Err(SessionError::config("room_code_attempts must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(SessionError::config("event_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> SessionResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SessionError::config(format!("{} has invalid value '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.min_password_length, 4);
        assert_eq!(config.room_code_length, 6);
        assert_eq!(config.tiebreak_quorum, QuorumScope::Global);
        assert!(config.dedupe_tiebreak_votes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
tiebreak_quorum = "room"
dedupe_tiebreak_votes = false
"#,
        )
        .unwrap();

        assert_eq!(config.tiebreak_quorum, QuorumScope::Room);
        assert!(!config.dedupe_tiebreak_votes);
        assert_eq!(config.room_code_length, 6);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SessionConfig::from_toml_str("room_code_length = 0").unwrap_err();
        assert!(matches!(err, SessionError::Config { .. }));

        let err = SessionConfig::from_toml_str("tiebreak_quorum = \"planet\"").unwrap_err();
        assert!(matches!(err, SessionError::Config { .. }));
    }

    #[test]
    fn test_quorum_scope_parse() {
        assert_eq!("ROOM".parse::<QuorumScope>().unwrap(), QuorumScope::Room);
        assert_eq!(" global ".parse::<QuorumScope>().unwrap(), QuorumScope::Global);
        assert!("both".parse::<QuorumScope>().is_err());
    }
}
