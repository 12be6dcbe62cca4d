//! Assembly session coordination
//!
//! This library provides the engine behind small, synchronous, multi-round
//! voting sessions:
//! - Room registry: short-code rooms with optional passcodes
//! - Presence tracking: who is logged in right now
//! - Round coordination: readiness, proposals, voting, tie detection, and
//!   the tiebreak sub-round, gated on each room's quorum
//! - Tally engine: counts, percentages, and pass/fail/tie verdicts
//!
//! Credentials and the durable proposal ledger are collaborators behind
//! traits, with in-memory implementations here and a RocksDB
//! implementation behind the `heavy-state` feature.
//!
//! # Usage
//!
//! ```ignore
//! use assembly_coordination::{
//!     EventBus, MemoryCredentialStore, SessionConfig, SessionCoordinator,
//! };
//!
//! let credentials = MemoryCredentialStore::new(4).shared();
//! let coordinator = SessionCoordinator::new(
//!     SessionConfig::default(),
//!     credentials.clone(),
//!     EventBus::new().shared(),
//! )?
//! .shared();
//!
//! let alice = credentials.register("alice", "secret", "France")?;
//! coordinator.mark_present(alice.id)?;
//! let room = coordinator.create_room(alice.id, Some("Plenary".into()), None)?;
//! coordinator.mark_ready(alice.id)?;
//! let status = coordinator.ready_status(&room.room_code)?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod presence;
pub mod room;
pub mod round;
#[cfg(feature = "heavy-state")]
pub mod state;
pub mod tally;

pub use config::{QuorumScope, SessionConfig};
pub use credentials::{CredentialStore, MemoryCredentialStore, SharedCredentialStore};
pub use error::{ErrorKind, SessionError, SessionResult, StructuredError};
pub use events::{BallotKind, EventBus, EventFilter, SessionEvent, SharedEventBus};
pub use identity::{Identity, IdentityId};
pub use ledger::{Ledger, LedgerTally, MemoryLedger, Proposal, ProposalId, SharedLedger, Vote};
pub use presence::{Completion, PresenceTracker, Quorum};
pub use room::{Departure, Room, RoomCode, RoomInfo, RoomRegistry, RoomSummary};
pub use round::{
    AgreementStatus, ArrivalStatus, MemberStatus, ProposalSubmission, RandomProposer,
    ReadyStatus, RoundPhase, RoundSnapshot, SessionCoordinator, SharedCoordinator,
    SubmissionStatus, TiebreakStatus, VotingStatus,
};
#[cfg(feature = "heavy-state")]
pub use state::{RocksStore, SharedRocksStore, WipeReport};
pub use tally::{TiedProposal, Verdict, VerdictRow, VoteChoice, VoteCounts, VoteTally};
