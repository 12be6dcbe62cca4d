//! Persistent ledger collaborator
//!
//! Append-only proposal and vote records that live independently of any
//! room or round. Live-round coordination never reads from the ledger.

pub mod memory;
pub mod types;

use std::sync::Arc;

use crate::error::{SessionError, SessionResult};
use crate::identity::IdentityId;
use crate::tally::VoteChoice;

pub use memory::MemoryLedger;
pub use types::{LedgerTally, LedgerWipe, Proposal, ProposalId, ProposalStatus, Vote};

/// Shared reference to a ledger
pub type SharedLedger = Arc<dyn Ledger>;

/// Durable proposals and votes
pub trait Ledger: Send + Sync {
    /// Record a new active proposal
    fn create_proposal(
        &self,
        title: &str,
        description: &str,
        proposed_by: &str,
    ) -> SessionResult<Proposal>;

    /// All proposals, newest first
    fn list_proposals(&self) -> SessionResult<Vec<Proposal>>;

    fn get_proposal(&self, id: ProposalId) -> SessionResult<Option<Proposal>>;

    /// Record a ballot. A second ballot by the same user on the same
    /// proposal is a `DuplicateAction`; an unknown proposal is `NotFound`.
    fn cast_vote(
        &self,
        proposal_id: ProposalId,
        user_id: IdentityId,
        choice: VoteChoice,
    ) -> SessionResult<Vote>;

    /// Counts for one proposal
    fn tally(&self, proposal_id: ProposalId) -> SessionResult<LedgerTally>;

    /// Remove every proposal and vote
    fn wipe(&self) -> SessionResult<LedgerWipe>;
}

/// Trimmed `(title, description)`, both required
pub fn validate_proposal(title: &str, description: &str) -> SessionResult<(String, String)> {
    let title = title.trim();
    let description = description.trim();
    if title.is_empty() || description.is_empty() {
        return Err(SessionError::invalid_input(
            "title and description are required",
        ));
    }
    Ok((title.to_string(), description.to_string()))
}

pub(crate) fn unknown_proposal(id: ProposalId) -> SessionError {
    SessionError::not_found(format!("Proposal {}", id))
}

pub(crate) fn already_voted() -> SessionError {
    SessionError::duplicate("you have already voted on this proposal")
}
