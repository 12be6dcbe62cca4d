//! Per-room round state
//!
//! Plain data plus the mutations that define round boundaries. Quorum and
//! locking live in the coordinator; everything here assumes the caller holds
//! the coordinator's write guard.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{SessionError, SessionResult};
use crate::identity::IdentityId;
use crate::room::RoomCode;
use crate::tally::{VoteChoice, VoteCounts, VoteTally};

use super::phase::RoundPhase;
use super::types::{ProposalSubmission, RoundSnapshot};

/// One room's voting round
#[derive(Debug, Clone, Default)]
pub struct RoundState {
    pub round: u32,
    pub phase: RoundPhase,
    pub ready: BTreeSet<IdentityId>,
    pub submissions: BTreeMap<IdentityId, ProposalSubmission>,
    pub submission_votes: BTreeMap<IdentityId, VoteTally>,
    pub finished_voting: BTreeSet<IdentityId>,
    pub tiebreak_votes: BTreeMap<IdentityId, VoteTally>,
    pub finished_tiebreak: BTreeSet<IdentityId>,
    pub agreed: BTreeSet<IdentityId>,
    pub arrived: BTreeSet<IdentityId>,
    /// Set once the arrival threshold initialized the current sub-round
    pub tiebreak_armed: bool,
}

impl RoundState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to the lobby, discarding the round's proposals, votes, and
    /// tiebreak state. Readiness survives. Returns true when this started a
    /// new round rather than refreshing the current lobby.
    pub fn enter_lobby(&mut self) -> bool {
        let new_round = self.round == 0 || !self.phase.is_pre_round();
        if new_round {
            self.round += 1;
        }

        self.phase = RoundPhase::Lobby;
        self.submissions.clear();
        self.submission_votes.clear();
        self.finished_voting.clear();
        self.clear_tiebreak();
        self.arrived.clear();
        self.tiebreak_armed = false;

        new_round
    }

    /// Begin a tiebreak sub-round, discarding earlier tiebreak ballots
    pub fn start_tiebreaker(&mut self) {
        self.phase = RoundPhase::TiebreakArrival;
        self.tiebreak_votes.clear();
        self.finished_tiebreak.clear();
        self.tiebreak_armed = false;
    }

    /// Initialize the sub-round the first time everyone has arrived.
    /// Returns true only on that first call.
    pub fn arm_tiebreak(&mut self) -> bool {
        if self.tiebreak_armed {
            return false;
        }
        self.clear_tiebreak();
        self.tiebreak_armed = true;
        true
    }

    fn clear_tiebreak(&mut self) {
        self.tiebreak_votes.clear();
        self.finished_tiebreak.clear();
        self.agreed.clear();
    }

    /// Move forward to `target`. Returns the previous phase if it moved.
    pub fn advance_to(&mut self, target: RoundPhase) -> Option<RoundPhase> {
        if target <= self.phase {
            return None;
        }
        let from = self.phase;
        self.phase = target;
        Some(from)
    }

    /// Store or overwrite the author's submission for this round
    pub fn submit(&mut self, submission: ProposalSubmission) {
        self.submissions.insert(submission.author_id, submission);
    }

    fn require_submission(&self, proposer: IdentityId) -> SessionResult<()> {
        if self.submissions.contains_key(&proposer) {
            Ok(())
        } else {
            Err(SessionError::not_found(format!(
                "Proposal from participant {}",
                proposer
            )))
        }
    }

    /// One ballot per voter per proposer
    pub fn record_submission_vote(
        &mut self,
        voter: IdentityId,
        proposer: IdentityId,
        choice: VoteChoice,
    ) -> SessionResult<()> {
        self.require_submission(proposer)?;
        self.submission_votes
            .entry(proposer)
            .or_default()
            .record(voter, choice, true)
    }

    pub fn record_tiebreak_vote(
        &mut self,
        voter: IdentityId,
        proposer: IdentityId,
        choice: VoteChoice,
        dedupe: bool,
    ) -> SessionResult<()> {
        self.require_submission(proposer)?;
        self.tiebreak_votes
            .entry(proposer)
            .or_default()
            .record(voter, choice, dedupe)
    }

    pub fn submission_counts(&self, proposer: IdentityId) -> VoteCounts {
        self.submission_votes
            .get(&proposer)
            .map(VoteTally::counts)
            .unwrap_or_default()
    }

    /// Drop an identity's readiness and completion markers
    pub fn forget(&mut self, identity: IdentityId) {
        self.ready.remove(&identity);
        self.finished_voting.remove(&identity);
        self.finished_tiebreak.remove(&identity);
        self.agreed.remove(&identity);
        self.arrived.remove(&identity);
    }

    pub fn snapshot(&self, room: &RoomCode) -> RoundSnapshot {
        RoundSnapshot {
            room: room.clone(),
            round: self.round,
            phase: self.phase,
            ready: self.ready.clone(),
            submitted: self.submissions.keys().copied().collect(),
            finished_voting: self.finished_voting.clone(),
            arrived: self.arrived.clone(),
            agreed: self.agreed.clone(),
            finished_tiebreak: self.finished_tiebreak.clone(),
            tiebreak_armed: self.tiebreak_armed,
        }
    }
}
