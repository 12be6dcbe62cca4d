//! Session coordinator - the single owner of live coordination state
//!
//! Room registry, presence set, per-room round state, and the RNG all sit
//! behind one `RwLock`. Every increment-and-check and every
//! clear-on-threshold runs under the write guard, so concurrent polls can
//! neither lose an update nor initialize a tiebreak sub-round twice.
//!
//! Status checks take the write guard too: observing a threshold is what
//! advances a room's phase.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::{QuorumScope, SessionConfig};
use crate::credentials::SharedCredentialStore;
use crate::error::{SessionError, SessionResult};
use crate::events::{BallotKind, SessionEvent, SharedEventBus};
use crate::identity::IdentityId;
use crate::presence::{Completion, PresenceTracker, Quorum};
use crate::room::{Departure, RoomCode, RoomInfo, RoomRegistry, RoomSummary};
use crate::tally::{self, TiedProposal, VerdictRow, VoteChoice, VoteCounts};

use super::phase::RoundPhase;
use super::state::RoundState;
use super::types::{
    AgreementStatus, ArrivalStatus, MemberStatus, ProposalSubmission, RandomProposer,
    ReadyStatus, RoundSnapshot, SubmissionStatus, TiebreakStatus, VotingStatus,
};

/// Shared reference to SessionCoordinator
pub type SharedCoordinator = Arc<SessionCoordinator>;

/// Everything guarded by the coordinator lock
struct CoordinatorState {
    registry: RoomRegistry,
    presence: PresenceTracker,
    rounds: HashMap<RoomCode, RoundState>,
    rng: StdRng,
}

impl CoordinatorState {
    fn room_of(&self, identity: IdentityId) -> SessionResult<RoomCode> {
        self.registry.current(identity).map(|room| room.code.clone())
    }

    fn quorum(&self, code: &RoomCode) -> SessionResult<Quorum> {
        let room = self.registry.get(code)?;
        Ok(self.presence.quorum(room))
    }

    /// Round state of a live room, created on first use
    fn round_mut(&mut self, code: &RoomCode) -> SessionResult<&mut RoundState> {
        if !self.registry.contains(code) {
            return Err(SessionError::not_found(format!("Room {}", code)));
        }
        Ok(self.rounds.entry(code.clone()).or_default())
    }

    fn round(&self, code: &RoomCode) -> SessionResult<Option<&RoundState>> {
        self.registry.get(code)?;
        Ok(self.rounds.get(code))
    }
}

/// Which per-round marker set a completion check counts
#[derive(Debug, Clone, Copy)]
enum Marker {
    Arrived,
    Agreed,
    FinishedTiebreak,
}

impl Marker {
    fn set(self, round: &RoundState) -> &BTreeSet<IdentityId> {
        match self {
            Marker::Arrived => &round.arrived,
            Marker::Agreed => &round.agreed,
            Marker::FinishedTiebreak => &round.finished_tiebreak,
        }
    }
}

/// Central state machine for rooms, presence, and voting rounds
pub struct SessionCoordinator {
    config: SessionConfig,
    credentials: SharedCredentialStore,
    events: SharedEventBus,
    state: RwLock<CoordinatorState>,
}

impl SessionCoordinator {
    /// Create a coordinator with an entropy-seeded RNG
    pub fn new(
        config: SessionConfig,
        credentials: SharedCredentialStore,
        events: SharedEventBus,
    ) -> SessionResult<Self> {
        Self::build(config, credentials, events, StdRng::from_entropy())
    }

    /// Create a coordinator whose room codes and shuffles are reproducible
    pub fn with_seed(
        config: SessionConfig,
        credentials: SharedCredentialStore,
        events: SharedEventBus,
        seed: u64,
    ) -> SessionResult<Self> {
        Self::build(config, credentials, events, StdRng::seed_from_u64(seed))
    }

    fn build(
        config: SessionConfig,
        credentials: SharedCredentialStore,
        events: SharedEventBus,
        rng: StdRng,
    ) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            credentials,
            events,
            state: RwLock::new(CoordinatorState {
                registry: RoomRegistry::new(),
                presence: PresenceTracker::new(),
                rounds: HashMap::new(),
                rng,
            }),
        })
    }

    /// Create a shared reference to this coordinator
    pub fn shared(self) -> SharedCoordinator {
        Arc::new(self)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    fn read(&self) -> SessionResult<RwLockReadGuard<'_, CoordinatorState>> {
        self.state.read().map_err(|_| SessionError::LockPoisoned)
    }

    fn write(&self) -> SessionResult<RwLockWriteGuard<'_, CoordinatorState>> {
        self.state.write().map_err(|_| SessionError::LockPoisoned)
    }

    fn advance(&self, code: &RoomCode, round: &mut RoundState, target: RoundPhase) {
        if let Some(from) = round.advance_to(target) {
            info!(room = %code, from = %from, phase = %target, "Phase advanced");
            self.events.publish(SessionEvent::PhaseAdvanced {
                room_code: code.clone(),
                from,
                to: target,
                timestamp: Utc::now(),
            });
        }
    }

    /// Bookkeeping after an identity left a room
    fn settle_departure(
        &self,
        state: &mut CoordinatorState,
        identity: IdentityId,
        departure: &Departure,
    ) {
        self.events.publish(SessionEvent::RoomLeft {
            room_code: departure.code.clone(),
            identity,
            timestamp: Utc::now(),
        });

        if departure.room_closed {
            state.rounds.remove(&departure.code);
            self.events.publish(SessionEvent::RoomClosed {
                room_code: departure.code.clone(),
                timestamp: Utc::now(),
            });
        } else if let Some(round) = state.rounds.get_mut(&departure.code) {
            round.forget(identity);
        }
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    /// Create a room with the caller as its only member
    pub fn create_room(
        &self,
        identity: IdentityId,
        name: Option<String>,
        passcode: Option<String>,
    ) -> SessionResult<RoomSummary> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let (code, departure) = state.registry.create(
            identity,
            name,
            passcode,
            &mut state.rng,
            self.config.room_code_length,
            self.config.room_code_attempts,
        )?;
        if let Some(departure) = departure {
            self.settle_departure(state, identity, &departure);
        }
        state.rounds.insert(code.clone(), RoundState::new());

        let summary = state.registry.get(&code)?.summary();
        self.events.publish(SessionEvent::RoomCreated {
            room_code: code,
            room_name: summary.room_name.clone(),
            created_by: identity,
            timestamp: Utc::now(),
        });
        Ok(summary)
    }

    /// Join a room by code, leaving any previous room
    pub fn join_room(
        &self,
        identity: IdentityId,
        code: &str,
        passcode: Option<&str>,
    ) -> SessionResult<RoomSummary> {
        let code = RoomCode::parse(code)?;
        let mut guard = self.write()?;
        let state = &mut *guard;

        let (room, departure) = state.registry.join(identity, &code, passcode)?;
        if let Some(departure) = departure {
            self.settle_departure(state, identity, &departure);
        }
        state.rounds.entry(code.clone()).or_default();

        self.events.publish(SessionEvent::RoomJoined {
            room_code: code,
            identity,
            members: room.members.len(),
            timestamp: Utc::now(),
        });
        Ok(room.summary())
    }

    pub fn leave_room(&self, identity: IdentityId) -> SessionResult<Departure> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let departure = state.registry.leave(identity)?;
        self.settle_departure(state, identity, &departure);
        Ok(departure)
    }

    pub fn current_room(&self, identity: IdentityId) -> SessionResult<RoomSummary> {
        let state = self.read()?;
        state.registry.current(identity).map(|room| room.summary())
    }

    /// Public room details; never exposes the passcode
    pub fn room_info(&self, code: &str) -> SessionResult<RoomInfo> {
        let code = RoomCode::parse(code)?;
        self.read()?.registry.info(&code)
    }

    /// The caller's room code
    pub fn room_of(&self, identity: IdentityId) -> SessionResult<RoomCode> {
        self.read()?.room_of(identity)
    }

    /// Present members of the caller's room in registration order
    pub fn room_members(&self, identity: IdentityId) -> SessionResult<Vec<MemberStatus>> {
        let state = self.read()?;
        let code = state.room_of(identity)?;
        let quorum = state.quorum(&code)?;
        let ready = state
            .rounds
            .get(&code)
            .map(|round| round.ready.clone())
            .unwrap_or_default();

        let mut members = Vec::with_capacity(quorum.total());
        // ids are assigned in registration order
        for id in &quorum.members {
            if let Some(member) = self.credentials.get(*id)? {
                members.push(MemberStatus {
                    id: member.id,
                    name: member.name,
                    position: member.position,
                    ready: ready.contains(id),
                });
            }
        }
        Ok(members)
    }

    // ========================================================================
    // Presence
    // ========================================================================

    /// Record a successful authentication
    pub fn mark_present(&self, identity: IdentityId) -> SessionResult<()> {
        let mut state = self.write()?;
        if state.presence.mark_present(identity) {
            info!(identity, "Participant present");
            self.events.publish(SessionEvent::ParticipantPresent {
                identity,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    pub fn is_present(&self, identity: IdentityId) -> SessionResult<bool> {
        Ok(self.read()?.presence.is_present(identity))
    }

    /// Log out, removing every trace of the identity from live coordination:
    /// presence, readiness, all completion markers, and room membership.
    pub fn logout(&self, identity: IdentityId) -> SessionResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        state.presence.mark_absent(identity);
        for round in state.rounds.values_mut() {
            round.forget(identity);
        }

        let departure = state.registry.leave(identity).ok();
        if let Some(departure) = &departure {
            self.settle_departure(state, identity, departure);
        }

        info!(
            identity,
            room = ?departure.as_ref().map(|d| d.code.as_str()),
            "Participant logged out"
        );
        self.events.publish(SessionEvent::ParticipantLeft {
            identity,
            room_code: departure.map(|d| d.code),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    // ========================================================================
    // Lobby and readiness
    // ========================================================================

    /// Return the caller's room to the lobby. Proposals, votes, and tiebreak
    /// state are discarded; readiness is kept. Returns the round number.
    pub fn enter_lobby(&self, identity: IdentityId) -> SessionResult<u32> {
        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        let round = state.round_mut(&code)?;

        if round.enter_lobby() {
            info!(room = %code, round = round.round, "Round started");
            self.events.publish(SessionEvent::RoundStarted {
                room_code: code,
                round: round.round,
                timestamp: Utc::now(),
            });
        } else {
            debug!(room = %code, round = round.round, "Lobby refreshed");
        }
        Ok(round.round)
    }

    /// Signal readiness for the next round; idempotent
    pub fn mark_ready(&self, identity: IdentityId) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        let round = state.round_mut(&code)?;
        round.ready.insert(identity);
        self.advance(&code, round, RoundPhase::ReadyCheck);
        Ok(())
    }

    pub fn ready_status(&self, code: &RoomCode) -> SessionResult<ReadyStatus> {
        let mut state = self.write()?;
        let quorum = state.quorum(code)?;
        let round = state.round_mut(code)?;

        let completion = Completion::new(quorum.count_marked(&round.ready), quorum.total());
        if completion.is_complete() {
            self.advance(code, round, RoundPhase::ProposalCollection);
        }
        Ok(completion.into())
    }

    // ========================================================================
    // Proposals
    // ========================================================================

    /// Store the caller's proposal for this round, replacing any earlier one
    pub fn submit_proposal(
        &self,
        identity: IdentityId,
        title: &str,
        description: &str,
    ) -> SessionResult<ProposalSubmission> {
        let title = title.trim();
        let description = description.trim();
        if title.is_empty() || description.is_empty() {
            return Err(SessionError::invalid_input(
                "title and description are required",
            ));
        }

        let author = self
            .credentials
            .get(identity)?
            .ok_or_else(|| SessionError::not_found(format!("Participant {}", identity)))?;

        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        let round = state.round_mut(&code)?;

        let submission = ProposalSubmission {
            author_id: identity,
            author_name: author.name,
            title: title.to_string(),
            description: description.to_string(),
        };
        round.submit(submission.clone());

        debug!(room = %code, identity, title = %submission.title, "Proposal submitted");
        self.events.publish(SessionEvent::ProposalSubmitted {
            room_code: code,
            author: identity,
            title: submission.title.clone(),
            timestamp: Utc::now(),
        });
        Ok(submission)
    }

    /// Submissions by present members against the room quorum
    pub fn submission_status(&self, code: &RoomCode) -> SessionResult<SubmissionStatus> {
        let mut state = self.write()?;
        let quorum = state.quorum(code)?;
        let round = state.round_mut(code)?;

        let completion = Completion::new(
            quorum.count_marked(round.submissions.keys()),
            quorum.total(),
        );
        if completion.is_complete() {
            self.advance(code, round, RoundPhase::Voting);
        }
        Ok(completion.into())
    }

    /// Everyone else's proposals, freshly shuffled on every call
    pub fn proposals_to_vote_on(
        &self,
        identity: IdentityId,
    ) -> SessionResult<Vec<ProposalSubmission>> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let code = state.room_of(identity)?;

        let mut proposals: Vec<ProposalSubmission> = state
            .rounds
            .get(&code)
            .map(|round| {
                round
                    .submissions
                    .values()
                    .filter(|s| s.author_id != identity)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        proposals.shuffle(&mut state.rng);
        Ok(proposals)
    }

    // ========================================================================
    // First vote
    // ========================================================================

    /// Count one ballot on a proposer's submission; a second ballot from the
    /// same voter is rejected with `DuplicateAction`
    pub fn record_submission_vote(
        &self,
        voter: IdentityId,
        proposer: IdentityId,
        choice: VoteChoice,
    ) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(voter)?;
        let round = state.round_mut(&code)?;

        if let Err(e) = round.record_submission_vote(voter, proposer, choice) {
            if matches!(e, SessionError::DuplicateAction { .. }) {
                warn!(room = %code, voter, proposer, "Duplicate vote rejected");
            }
            return Err(e);
        }

        self.events.publish(SessionEvent::VoteRecorded {
            room_code: code,
            voter,
            proposer,
            ballot: BallotKind::Submission,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// First-vote counts for one proposer; zeros if nobody voted
    pub fn submission_counts(
        &self,
        code: &RoomCode,
        proposer: IdentityId,
    ) -> SessionResult<VoteCounts> {
        let state = self.read()?;
        Ok(state
            .round(code)?
            .map(|round| round.submission_counts(proposer))
            .unwrap_or_default())
    }

    pub fn mark_voting_complete(&self, identity: IdentityId) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        state.round_mut(&code)?.finished_voting.insert(identity);
        Ok(())
    }

    /// Finished voters in the room quorum. Once everyone is done the room
    /// moves to vote-complete, or straight to results when nothing tied.
    pub fn voting_status(&self, code: &RoomCode) -> SessionResult<VotingStatus> {
        let mut state = self.write()?;
        let quorum = state.quorum(code)?;
        let round = state.round_mut(code)?;

        let completion =
            Completion::new(quorum.count_marked(&round.finished_voting), quorum.total());
        if completion.is_complete() {
            let tied = tally::tied_proposals(&round.submissions, &round.submission_votes);
            let next = if tied.is_empty() {
                RoundPhase::Results
            } else {
                RoundPhase::VoteComplete
            };
            self.advance(code, round, next);
        }
        Ok(completion.into())
    }

    pub fn tied_proposals(&self, code: &RoomCode) -> SessionResult<Vec<TiedProposal>> {
        let state = self.read()?;
        Ok(state
            .round(code)?
            .map(|round| tally::tied_proposals(&round.submissions, &round.submission_votes))
            .unwrap_or_default())
    }

    /// First-vote verdict rows, most yes votes first
    pub fn voting_results(&self, code: &RoomCode) -> SessionResult<Vec<VerdictRow>> {
        let state = self.read()?;
        Ok(state
            .round(code)?
            .map(|round| tally::aggregate_results(&round.submissions, &round.submission_votes))
            .unwrap_or_default())
    }

    // ========================================================================
    // Tiebreak
    // ========================================================================

    /// Tiebreak-phase progress. Global scope counts the marker across
    /// every room against all registered identities; room scope counts
    /// the room's quorum only.
    fn marker_completion(
        &self,
        state: &mut CoordinatorState,
        code: &RoomCode,
        marker: Marker,
    ) -> SessionResult<Completion> {
        match self.config.tiebreak_quorum {
            QuorumScope::Global => {
                state.round_mut(code)?;
                let marked: BTreeSet<IdentityId> = state
                    .rounds
                    .values()
                    .flat_map(|round| marker.set(round).iter().copied())
                    .collect();
                Ok(Completion::new(marked.len(), self.credentials.count()?))
            }
            QuorumScope::Room => {
                let quorum = state.quorum(code)?;
                let round = state.round_mut(code)?;
                Ok(Completion::new(
                    quorum.count_marked(marker.set(round)),
                    quorum.total(),
                ))
            }
        }
    }

    /// Start (or restart) the tiebreak sub-round for the caller's room
    pub fn start_tiebreaker(&self, identity: IdentityId) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        let round = state.round_mut(&code)?;
        round.start_tiebreaker();

        info!(room = %code, identity, "Tiebreak started");
        self.events.publish(SessionEvent::TiebreakStarted {
            room_code: code,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Arm the sub-round the first time everyone has arrived
    fn settle_arrival(
        &self,
        state: &mut CoordinatorState,
        code: &RoomCode,
    ) -> SessionResult<ArrivalStatus> {
        let completion = self.marker_completion(state, code, Marker::Arrived)?;
        if completion.is_complete() {
            let round = state.round_mut(code)?;
            if round.arm_tiebreak() {
                info!(
                    room = %code,
                    arrived = completion.done,
                    total = completion.total,
                    "Tiebreak armed"
                );
                self.events.publish(SessionEvent::TiebreakArmed {
                    room_code: code.clone(),
                    arrived: completion.done,
                    total: completion.total,
                    timestamp: Utc::now(),
                });
            }
            self.advance(code, round, RoundPhase::TiebreakAgreement);
        }
        Ok(completion.into())
    }

    pub fn arrive_at_tiebreaker(&self, identity: IdentityId) -> SessionResult<ArrivalStatus> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let code = state.room_of(identity)?;
        state.round_mut(&code)?.arrived.insert(identity);
        self.settle_arrival(state, &code)
    }

    pub fn arrival_status(&self, code: &RoomCode) -> SessionResult<ArrivalStatus> {
        let mut guard = self.write()?;
        self.settle_arrival(&mut guard, code)
    }

    pub fn agree_to_tiebreak(&self, identity: IdentityId) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        state.round_mut(&code)?.agreed.insert(identity);
        Ok(())
    }

    pub fn agreement_status(&self, code: &RoomCode) -> SessionResult<AgreementStatus> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let completion = self.marker_completion(state, code, Marker::Agreed)?;
        if completion.is_complete() {
            let round = state.round_mut(code)?;
            self.advance(code, round, RoundPhase::TiebreakVoting);
        }
        Ok(completion.into())
    }

    pub fn reset_tiebreak_agreement(&self, identity: IdentityId) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        state.round_mut(&code)?.agreed.clear();
        debug!(room = %code, identity, "Tiebreak agreement reset");
        Ok(())
    }

    pub fn record_tiebreak_vote(
        &self,
        voter: IdentityId,
        proposer: IdentityId,
        choice: VoteChoice,
    ) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(voter)?;
        let round = state.round_mut(&code)?;

        if let Err(e) =
            round.record_tiebreak_vote(voter, proposer, choice, self.config.dedupe_tiebreak_votes)
        {
            if matches!(e, SessionError::DuplicateAction { .. }) {
                warn!(room = %code, voter, proposer, "Duplicate tiebreak vote rejected");
            }
            return Err(e);
        }

        self.events.publish(SessionEvent::VoteRecorded {
            room_code: code,
            voter,
            proposer,
            ballot: BallotKind::Tiebreak,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub fn mark_tiebreak_complete(&self, identity: IdentityId) -> SessionResult<()> {
        let mut state = self.write()?;
        let code = state.room_of(identity)?;
        state.round_mut(&code)?.finished_tiebreak.insert(identity);
        Ok(())
    }

    pub fn tiebreak_status(&self, code: &RoomCode) -> SessionResult<TiebreakStatus> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let completion = self.marker_completion(state, code, Marker::FinishedTiebreak)?;
        if completion.is_complete() {
            let round = state.round_mut(code)?;
            self.advance(code, round, RoundPhase::TiebreakComplete);
        }
        Ok(completion.into())
    }

    // ========================================================================
    // Results and diagnostics
    // ========================================================================

    /// Final verdicts, preferring each proposer's tiebreak tally
    pub fn final_results(&self, code: &RoomCode) -> SessionResult<Vec<VerdictRow>> {
        let mut state = self.write()?;
        let round = state.round_mut(code)?;
        if round.phase == RoundPhase::TiebreakComplete {
            self.advance(code, round, RoundPhase::Results);
        }
        Ok(tally::final_results(
            &round.submissions,
            &round.tiebreak_votes,
            &round.submission_votes,
        ))
    }

    /// A uniformly random registered identity
    pub fn random_proposer(&self) -> SessionResult<RandomProposer> {
        let identities = self.credentials.list()?;
        let mut state = self.write()?;
        identities
            .choose(&mut state.rng)
            .map(|identity| RandomProposer {
                user_id: identity.id,
                user_name: identity.name.clone(),
            })
            .ok_or_else(|| SessionError::not_found("Registered participant"))
    }

    pub fn phase(&self, code: &RoomCode) -> SessionResult<RoundPhase> {
        let state = self.read()?;
        Ok(state
            .round(code)?
            .map(|round| round.phase)
            .unwrap_or_default())
    }

    pub fn round_snapshot(&self, code: &RoomCode) -> SessionResult<RoundSnapshot> {
        let state = self.read()?;
        Ok(state
            .round(code)?
            .map(|round| round.snapshot(code))
            .unwrap_or_else(|| RoundState::new().snapshot(code)))
    }

    pub fn room_count(&self) -> SessionResult<usize> {
        Ok(self.read()?.registry.room_count())
    }
}
