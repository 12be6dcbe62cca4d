//! Request and response bodies

use assembly_coordination::{Identity, LedgerTally};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub password: String,
    pub position: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// Issued on register and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub passcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub room_code: String,
    #[serde(default)]
    pub passcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitProposalRequest {
    pub title: String,
    pub description: String,
}

/// A ballot with its step-up password. The choice stays a string so an
/// unauthenticated caller never learns whether it would have parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotRequest {
    #[serde(default)]
    pub vote: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProposalRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyResponse {
    pub round: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveResponse {
    pub room_code: String,
    pub room_closed: bool,
}

/// Ledger tally plus the registered-identity count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResults {
    pub proposal_id: u64,
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub total_voted: u32,
    pub total_users: usize,
}

impl LedgerResults {
    pub fn new(proposal_id: u64, tally: LedgerTally, total_users: usize) -> Self {
        Self {
            proposal_id,
            yes: tally.yes,
            no: tally.no,
            abstain: tally.abstain,
            total_voted: tally.total_voted,
            total_users,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub rooms: usize,
    pub sessions: usize,
    pub started_at: DateTime<Utc>,
}
