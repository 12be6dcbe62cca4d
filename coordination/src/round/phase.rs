//! Round phases

use serde::{Deserialize, Serialize};

/// Where a room is in its voting round.
///
/// Variants are declared in round order, so `Ord` compares progress. Only
/// [`RoundPhase::Lobby`] (new round) and [`RoundPhase::TiebreakArrival`]
/// (new tiebreak sub-round) are ever entered backwards.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    #[default]
    Lobby,
    ReadyCheck,
    ProposalCollection,
    Voting,
    VoteComplete,
    TiebreakArrival,
    TiebreakAgreement,
    TiebreakVoting,
    TiebreakComplete,
    Results,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Lobby => "lobby",
            RoundPhase::ReadyCheck => "ready_check",
            RoundPhase::ProposalCollection => "proposal_collection",
            RoundPhase::Voting => "voting",
            RoundPhase::VoteComplete => "vote_complete",
            RoundPhase::TiebreakArrival => "tiebreak_arrival",
            RoundPhase::TiebreakAgreement => "tiebreak_agreement",
            RoundPhase::TiebreakVoting => "tiebreak_voting",
            RoundPhase::TiebreakComplete => "tiebreak_complete",
            RoundPhase::Results => "results",
        }
    }

    pub fn is_tiebreak(&self) -> bool {
        matches!(
            self,
            RoundPhase::TiebreakArrival
                | RoundPhase::TiebreakAgreement
                | RoundPhase::TiebreakVoting
                | RoundPhase::TiebreakComplete
        )
    }

    /// Still gathering readiness for the current round
    pub fn is_pre_round(&self) -> bool {
        matches!(self, RoundPhase::Lobby | RoundPhase::ReadyCheck)
    }
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
