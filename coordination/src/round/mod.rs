//! Round coordination
//!
//! A round moves a room through readiness, proposal collection, voting, and
//! an optional tiebreak sub-round:
//!
//! ```text
//! LOBBY → READY_CHECK → PROPOSAL_COLLECTION → VOTING → VOTE_COMPLETE
//!       → (tie?) TIEBREAK_ARRIVAL → TIEBREAK_AGREEMENT → TIEBREAK_VOTING
//!       → TIEBREAK_COMPLETE → RESULTS
//! ```
//!
//! There are no timers. Each transition happens when an aggregate check
//! (the "is everyone done?" polls) observes its threshold over the room's
//! quorum.

pub mod coordinator;
pub mod phase;
pub mod state;
pub mod types;

pub use coordinator::{SessionCoordinator, SharedCoordinator};
pub use phase::RoundPhase;
pub use state::RoundState;
pub use types::{
    AgreementStatus, ArrivalStatus, MemberStatus, ProposalSubmission, RandomProposer,
    ReadyStatus, RoundSnapshot, SubmissionStatus, TiebreakStatus, VotingStatus,
};
