//! In-memory ledger

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::debug;

use super::{already_voted, unknown_proposal, validate_proposal, Ledger, SharedLedger};
use super::types::{LedgerTally, LedgerWipe, Proposal, ProposalId, ProposalStatus, Vote};
use crate::error::{SessionError, SessionResult};
use crate::identity::IdentityId;
use crate::tally::VoteChoice;

#[derive(Default)]
struct LedgerTables {
    next_id: ProposalId,
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: BTreeMap<(ProposalId, IdentityId), Vote>,
}

/// Ledger held in process memory; lost on restart
pub struct MemoryLedger {
    tables: RwLock<LedgerTables>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(LedgerTables {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Create a shared reference to this ledger
    pub fn shared(self) -> SharedLedger {
        Arc::new(self)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MemoryLedger {
    fn create_proposal(
        &self,
        title: &str,
        description: &str,
        proposed_by: &str,
    ) -> SessionResult<Proposal> {
        let (title, description) = validate_proposal(title, description)?;
        let mut tables = self.tables.write().map_err(|_| SessionError::LockPoisoned)?;

        let id = tables.next_id;
        tables.next_id += 1;

        let proposal = Proposal {
            id,
            title,
            description,
            proposed_by: proposed_by.to_string(),
            created_at: Utc::now(),
            status: ProposalStatus::Active,
        };
        tables.proposals.insert(id, proposal.clone());

        debug!(proposal = id, "Ledger proposal created");
        Ok(proposal)
    }

    fn list_proposals(&self) -> SessionResult<Vec<Proposal>> {
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        // ids grow with creation time
        Ok(tables.proposals.values().rev().cloned().collect())
    }

    fn get_proposal(&self, id: ProposalId) -> SessionResult<Option<Proposal>> {
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        Ok(tables.proposals.get(&id).cloned())
    }

    fn cast_vote(
        &self,
        proposal_id: ProposalId,
        user_id: IdentityId,
        choice: VoteChoice,
    ) -> SessionResult<Vote> {
        let mut tables = self.tables.write().map_err(|_| SessionError::LockPoisoned)?;
        if !tables.proposals.contains_key(&proposal_id) {
            return Err(unknown_proposal(proposal_id));
        }
        if tables.votes.contains_key(&(proposal_id, user_id)) {
            return Err(already_voted());
        }

        let vote = Vote {
            proposal_id,
            user_id,
            choice,
            voted_at: Utc::now(),
        };
        tables.votes.insert((proposal_id, user_id), vote.clone());
        Ok(vote)
    }

    fn tally(&self, proposal_id: ProposalId) -> SessionResult<LedgerTally> {
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        if !tables.proposals.contains_key(&proposal_id) {
            return Err(unknown_proposal(proposal_id));
        }
        Ok(tables
            .votes
            .range((proposal_id, IdentityId::MIN)..=(proposal_id, IdentityId::MAX))
            .map(|(_, vote)| vote)
            .collect())
    }

    fn wipe(&self) -> SessionResult<LedgerWipe> {
        let mut tables = self.tables.write().map_err(|_| SessionError::LockPoisoned)?;
        let removed = LedgerWipe {
            proposals: tables.proposals.len(),
            votes: tables.votes.len(),
        };
        tables.proposals.clear();
        tables.votes.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list_newest_first() {
        let ledger = MemoryLedger::new();
        ledger.create_proposal("Water", "Clean water", "alice").unwrap();
        ledger.create_proposal("Energy", "Solar", "bob").unwrap();

        let titles: Vec<String> = ledger
            .list_proposals()
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Energy", "Water"]);
    }

    #[test]
    fn test_create_requires_fields() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            ledger.create_proposal("", "text", "alice"),
            Err(SessionError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_vote_unique_per_user() {
        let ledger = MemoryLedger::new();
        let p = ledger.create_proposal("Water", "Clean water", "alice").unwrap();

        ledger.cast_vote(p.id, 1, VoteChoice::Yes).unwrap();
        ledger.cast_vote(p.id, 2, VoteChoice::Abstain).unwrap();
        assert!(matches!(
            ledger.cast_vote(p.id, 1, VoteChoice::No),
            Err(SessionError::DuplicateAction { .. })
        ));

        let tally = ledger.tally(p.id).unwrap();
        assert_eq!(
            tally,
            LedgerTally {
                yes: 1,
                no: 0,
                abstain: 1,
                total_voted: 2
            }
        );
    }

    #[test]
    fn test_unknown_proposal() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            ledger.cast_vote(42, 1, VoteChoice::Yes),
            Err(SessionError::NotFound { .. })
        ));
        assert!(ledger.tally(42).is_err());
    }

    #[test]
    fn test_tally_isolated_per_proposal() {
        let ledger = MemoryLedger::new();
        let a = ledger.create_proposal("Water", "Clean water", "alice").unwrap();
        let b = ledger.create_proposal("Energy", "Solar", "bob").unwrap();
        ledger.cast_vote(a.id, 1, VoteChoice::Yes).unwrap();
        ledger.cast_vote(b.id, 1, VoteChoice::No).unwrap();

        assert_eq!(ledger.tally(a.id).unwrap().yes, 1);
        assert_eq!(ledger.tally(a.id).unwrap().no, 0);
    }

    #[test]
    fn test_wipe() {
        let ledger = MemoryLedger::new();
        let p = ledger.create_proposal("Water", "Clean water", "alice").unwrap();
        ledger.cast_vote(p.id, 1, VoteChoice::Yes).unwrap();

        let removed = ledger.wipe().unwrap();
        assert_eq!(removed.proposals, 1);
        assert_eq!(removed.votes, 1);
        assert!(ledger.list_proposals().unwrap().is_empty());
    }
}
