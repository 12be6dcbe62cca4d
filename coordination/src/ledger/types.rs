//! Durable proposal and vote records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::tally::VoteChoice;

/// Unique identifier for a ledger proposal
pub type ProposalId = u64;

/// Lifecycle of a ledger proposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Active,
    Closed,
}

/// A proposal recorded outside of any live round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub title: String,
    pub description: String,
    /// Display name of the author at creation time
    pub proposed_by: String,
    pub created_at: DateTime<Utc>,
    pub status: ProposalStatus,
}

/// One participant's ballot on a ledger proposal; unique per (proposal, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub user_id: IdentityId,
    pub choice: VoteChoice,
    pub voted_at: DateTime<Utc>,
}

/// Counts for one ledger proposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTally {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub total_voted: u32,
}

impl LedgerTally {
    pub fn add(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::Yes => self.yes += 1,
            VoteChoice::No => self.no += 1,
            VoteChoice::Abstain => self.abstain += 1,
        }
        self.total_voted += 1;
    }
}

impl<'a> FromIterator<&'a Vote> for LedgerTally {
    fn from_iter<I: IntoIterator<Item = &'a Vote>>(iter: I) -> Self {
        let mut tally = LedgerTally::default();
        for vote in iter {
            tally.add(vote.choice);
        }
        tally
    }
}

/// What a ledger wipe removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerWipe {
    pub proposals: usize,
    pub votes: usize,
}
