//! Session error types
//!
//! Every failure the coordinator can report is recoverable and carries a
//! specific reason. Callers map [`SessionError::kind`] onto their own
//! transport (the HTTP layer turns it into a status code) and can render
//! [`SessionError::to_structured`] as the response body.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

// ============================================================================
// Structured Error Response
// ============================================================================

/// Serializable error body with a machine-readable code and a recovery hint.
///
/// # Example Response
/// ```json
/// {
///   "code": "DUPLICATE_ACTION",
///   "message": "Already voted on proposal from participant 3",
///   "recovery_action": "Each participant votes once per proposal per round.",
///   "context": { "proposer_id": 3 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code (e.g., "NOT_FOUND", "UNAUTHORIZED")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// What the caller can do next
    pub recovery_action: String,

    /// Relevant context for debugging and recovery
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl StructuredError {
    /// Create a new structured error
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        recovery_action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_action: recovery_action.into(),
            context: HashMap::new(),
        }
    }

    /// Add context key-value pair
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StructuredError {}

/// Broad error category, independent of transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidInput,
    DuplicateAction,
    Conflict,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
            ErrorKind::DuplicateAction => write!(f, "duplicate_action"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Missing or failed identity, or failed step-up password check
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Unknown room, proposer, proposal, or identity
    #[error("{what} not found")]
    NotFound { what: String },

    /// Missing or malformed input
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The action was already performed (duplicate vote, exhausted room codes)
    #[error("Duplicate action: {message}")]
    DuplicateAction { message: String },

    /// The request conflicts with existing state (name already registered)
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Backing store failure
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A coordination lock was poisoned by a panicking thread
    #[error("Lock poisoned")]
    LockPoisoned,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SessionError {
    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a duplicate action error
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::DuplicateAction {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Transport-independent category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::DuplicateAction { .. } => ErrorKind::DuplicateAction,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Storage { .. } | Self::LockPoisoned | Self::Config { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::DuplicateAction { .. } => "DUPLICATE_ACTION",
            Self::Conflict { .. } => "CONFLICT",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::LockPoisoned => "LOCK_POISONED",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// Get recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => {
                "Log in again, or re-enter your password to confirm the vote."
            }
            Self::NotFound { .. } => {
                "Check the room code or proposer id. Join or create a room before taking part in a round."
            }
            Self::InvalidInput { .. } => {
                "Fix the request fields. Votes must be one of yes, no, or abstain."
            }
            Self::DuplicateAction { .. } => {
                "Each participant votes once per proposal per round. Wait for the next round."
            }
            Self::Conflict { .. } => "Choose a different name.",
            Self::Storage { .. } => "Retry the request. If it keeps failing, check the state directory.",
            Self::LockPoisoned => "Restart the server. In-progress round state will be lost.",
            Self::Config { .. } => "Fix the configuration file or ASSEMBLY_* environment variables.",
        }
    }

    /// Convert to a structured error body
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::new(self.code(), self.to_string(), self.recovery_suggestion())
            .with_context("kind", self.kind().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SessionError::unauthorized("bad password").kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(SessionError::not_found("Room").kind(), ErrorKind::NotFound);
        assert_eq!(
            SessionError::duplicate("already voted").kind(),
            ErrorKind::DuplicateAction
        );
        assert_eq!(SessionError::LockPoisoned.kind(), ErrorKind::Internal);
        assert_eq!(SessionError::storage("disk").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_not_found_message() {
        let err = SessionError::not_found("Room ABC123");
        assert_eq!(err.to_string(), "Room ABC123 not found");
    }

    #[test]
    fn test_structured_error_serialization() {
        let structured = SessionError::conflict("name taken").to_structured();
        assert_eq!(structured.code, "CONFLICT");
        assert_eq!(structured.message, "Conflict: name taken");

        let json = serde_json::to_value(&structured).unwrap();
        assert_eq!(json["context"]["kind"], "conflict");
        assert!(json["recovery_action"].as_str().unwrap().contains("different name"));
    }
}
