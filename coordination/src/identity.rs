//! Authenticated participant identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a registered participant
pub type IdentityId = u64;

/// A registered participant. Unique by name and immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    /// Delegation or seat the participant speaks for
    pub position: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(id: IdentityId, name: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: position.into(),
            created_at: Utc::now(),
        }
    }
}
