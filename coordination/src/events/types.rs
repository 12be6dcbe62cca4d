//! Session event types
//!
//! Published by the coordinator at every room and round transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::room::RoomCode;
use crate::round::RoundPhase;

/// Which tally a ballot went into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotKind {
    Submission,
    Tiebreak,
}

impl std::fmt::Display for BallotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BallotKind::Submission => write!(f, "submission"),
            BallotKind::Tiebreak => write!(f, "tiebreak"),
        }
    }
}

/// All session coordination events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// An identity authenticated
    ParticipantPresent {
        identity: IdentityId,
        timestamp: DateTime<Utc>,
    },

    /// An identity logged out; `room_code` is the room it was removed from
    ParticipantLeft {
        identity: IdentityId,
        room_code: Option<RoomCode>,
        timestamp: DateTime<Utc>,
    },

    RoomCreated {
        room_code: RoomCode,
        room_name: String,
        created_by: IdentityId,
        timestamp: DateTime<Utc>,
    },

    RoomJoined {
        room_code: RoomCode,
        identity: IdentityId,
        members: usize,
        timestamp: DateTime<Utc>,
    },

    RoomLeft {
        room_code: RoomCode,
        identity: IdentityId,
        timestamp: DateTime<Utc>,
    },

    /// The last member left and the code is free again
    RoomClosed {
        room_code: RoomCode,
        timestamp: DateTime<Utc>,
    },

    RoundStarted {
        room_code: RoomCode,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    ProposalSubmitted {
        room_code: RoomCode,
        author: IdentityId,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// A ballot was counted. The choice itself is not broadcast.
    VoteRecorded {
        room_code: RoomCode,
        voter: IdentityId,
        proposer: IdentityId,
        ballot: BallotKind,
        timestamp: DateTime<Utc>,
    },

    TiebreakStarted {
        room_code: RoomCode,
        timestamp: DateTime<Utc>,
    },

    /// Everyone arrived and the tiebreak sub-round was initialized
    TiebreakArmed {
        room_code: RoomCode,
        arrived: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    PhaseAdvanced {
        room_code: RoomCode,
        from: RoundPhase,
        to: RoundPhase,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::ParticipantPresent { timestamp, .. } => *timestamp,
            SessionEvent::ParticipantLeft { timestamp, .. } => *timestamp,
            SessionEvent::RoomCreated { timestamp, .. } => *timestamp,
            SessionEvent::RoomJoined { timestamp, .. } => *timestamp,
            SessionEvent::RoomLeft { timestamp, .. } => *timestamp,
            SessionEvent::RoomClosed { timestamp, .. } => *timestamp,
            SessionEvent::RoundStarted { timestamp, .. } => *timestamp,
            SessionEvent::ProposalSubmitted { timestamp, .. } => *timestamp,
            SessionEvent::VoteRecorded { timestamp, .. } => *timestamp,
            SessionEvent::TiebreakStarted { timestamp, .. } => *timestamp,
            SessionEvent::TiebreakArmed { timestamp, .. } => *timestamp,
            SessionEvent::PhaseAdvanced { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::ParticipantPresent { .. } => "participant_present",
            SessionEvent::ParticipantLeft { .. } => "participant_left",
            SessionEvent::RoomCreated { .. } => "room_created",
            SessionEvent::RoomJoined { .. } => "room_joined",
            SessionEvent::RoomLeft { .. } => "room_left",
            SessionEvent::RoomClosed { .. } => "room_closed",
            SessionEvent::RoundStarted { .. } => "round_started",
            SessionEvent::ProposalSubmitted { .. } => "proposal_submitted",
            SessionEvent::VoteRecorded { .. } => "vote_recorded",
            SessionEvent::TiebreakStarted { .. } => "tiebreak_started",
            SessionEvent::TiebreakArmed { .. } => "tiebreak_armed",
            SessionEvent::PhaseAdvanced { .. } => "phase_advanced",
        }
    }

    /// Get the room code if this event is room-scoped
    pub fn room_code(&self) -> Option<&RoomCode> {
        match self {
            SessionEvent::ParticipantPresent { .. } => None,
            SessionEvent::ParticipantLeft { room_code, .. } => room_code.as_ref(),
            SessionEvent::RoomCreated { room_code, .. }
            | SessionEvent::RoomJoined { room_code, .. }
            | SessionEvent::RoomLeft { room_code, .. }
            | SessionEvent::RoomClosed { room_code, .. }
            | SessionEvent::RoundStarted { room_code, .. }
            | SessionEvent::ProposalSubmitted { room_code, .. }
            | SessionEvent::VoteRecorded { room_code, .. }
            | SessionEvent::TiebreakStarted { room_code, .. }
            | SessionEvent::TiebreakArmed { room_code, .. }
            | SessionEvent::PhaseAdvanced { room_code, .. } => Some(room_code),
        }
    }
}
