//! Round data types and status views

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::presence::Completion;
use crate::room::RoomCode;

use super::phase::RoundPhase;

/// A proposal entered by one participant for peer voting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSubmission {
    #[serde(rename = "user_id")]
    pub author_id: IdentityId,
    #[serde(rename = "user_name")]
    pub author_name: String,
    pub title: String,
    pub description: String,
}

/// `{ready, total, all_ready}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyStatus {
    pub ready: usize,
    pub total: usize,
    pub all_ready: bool,
}

impl From<Completion> for ReadyStatus {
    fn from(c: Completion) -> Self {
        Self {
            ready: c.done,
            total: c.total,
            all_ready: c.is_complete(),
        }
    }
}

/// `{submitted, total, all_submitted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub submitted: usize,
    pub total: usize,
    pub all_submitted: bool,
}

impl From<Completion> for SubmissionStatus {
    fn from(c: Completion) -> Self {
        Self {
            submitted: c.done,
            total: c.total,
            all_submitted: c.is_complete(),
        }
    }
}

/// `{finished, total, all_voted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub finished: usize,
    pub total: usize,
    pub all_voted: bool,
}

impl From<Completion> for VotingStatus {
    fn from(c: Completion) -> Self {
        Self {
            finished: c.done,
            total: c.total,
            all_voted: c.is_complete(),
        }
    }
}

/// `{arrived, total, all_arrived}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalStatus {
    pub arrived: usize,
    pub total: usize,
    pub all_arrived: bool,
}

impl From<Completion> for ArrivalStatus {
    fn from(c: Completion) -> Self {
        Self {
            arrived: c.done,
            total: c.total,
            all_arrived: c.is_complete(),
        }
    }
}

/// `{agreed, total, all_agreed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementStatus {
    pub agreed: usize,
    pub total: usize,
    pub all_agreed: bool,
}

impl From<Completion> for AgreementStatus {
    fn from(c: Completion) -> Self {
        Self {
            agreed: c.done,
            total: c.total,
            all_agreed: c.is_complete(),
        }
    }
}

/// `{finished, total, all_complete}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiebreakStatus {
    pub finished: usize,
    pub total: usize,
    pub all_complete: bool,
}

impl From<Completion> for TiebreakStatus {
    fn from(c: Completion) -> Self {
        Self {
            finished: c.done,
            total: c.total,
            all_complete: c.is_complete(),
        }
    }
}

/// A present room member as shown in the lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStatus {
    pub id: IdentityId,
    pub name: String,
    pub position: String,
    pub ready: bool,
}

/// Uniformly drawn registered identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomProposer {
    pub user_id: IdentityId,
    pub user_name: String,
}

/// Point-in-time view of one room's round, for polling and diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub room: RoomCode,
    pub round: u32,
    pub phase: RoundPhase,
    pub ready: BTreeSet<IdentityId>,
    pub submitted: BTreeSet<IdentityId>,
    pub finished_voting: BTreeSet<IdentityId>,
    pub arrived: BTreeSet<IdentityId>,
    pub agreed: BTreeSet<IdentityId>,
    pub finished_tiebreak: BTreeSet<IdentityId>,
    pub tiebreak_armed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_uses_wire_names() {
        let submission = ProposalSubmission {
            author_id: 3,
            author_name: "carol".to_string(),
            title: "Water".to_string(),
            description: "Clean water access".to_string(),
        };
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["user_id"], 3);
        assert_eq!(json["user_name"], "carol");
    }

    #[test]
    fn test_status_from_completion() {
        let status = ReadyStatus::from(Completion::new(2, 3));
        assert_eq!(
            status,
            ReadyStatus {
                ready: 2,
                total: 3,
                all_ready: false
            }
        );
        assert!(TiebreakStatus::from(Completion::new(4, 4)).all_complete);
        assert!(!ArrivalStatus::from(Completion::new(0, 0)).all_arrived);
    }
}
