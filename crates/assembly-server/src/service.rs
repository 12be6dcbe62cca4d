//! Voting service facade
//!
//! Composes the coordinator with the credential store, the ledger, and the
//! token table. Handlers resolve a caller once and then call straight into
//! this type; nothing here knows about HTTP.

use std::sync::Arc;

use assembly_coordination::{
    AgreementStatus, ArrivalStatus, Departure, Identity, IdentityId, MemberStatus, Proposal,
    ProposalId, ProposalSubmission, RandomProposer, ReadyStatus, RoomCode, RoomInfo,
    RoomSummary, RoundSnapshot, SessionError, SessionResult, SharedCoordinator,
    SharedCredentialStore, SharedLedger, SubmissionStatus, TiebreakStatus, TiedProposal,
    VerdictRow, VoteChoice, VoteCounts, VotingStatus,
};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::api::{AuthResponse, BallotRequest, HealthResponse, LedgerResults};
use crate::auth::SessionTokens;

pub type SharedService = Arc<VotingService>;

pub struct VotingService {
    coordinator: SharedCoordinator,
    credentials: SharedCredentialStore,
    ledger: SharedLedger,
    tokens: SessionTokens,
    started_at: DateTime<Utc>,
}

impl VotingService {
    pub fn new(
        coordinator: SharedCoordinator,
        credentials: SharedCredentialStore,
        ledger: SharedLedger,
    ) -> Self {
        Self {
            coordinator,
            credentials,
            ledger,
            tokens: SessionTokens::new(),
            started_at: Utc::now(),
        }
    }

    pub fn shared(self) -> SharedService {
        Arc::new(self)
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        &self.coordinator
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Register and log in
    pub fn register(
        &self,
        name: &str,
        password: &str,
        position: &str,
    ) -> SessionResult<AuthResponse> {
        let identity = self.credentials.register(name, password, position)?;
        info!(identity = identity.id, name = %identity.name, "Participant registered");
        self.open_session(identity)
    }

    pub fn login(&self, name: &str, password: &str) -> SessionResult<AuthResponse> {
        let identity = self.credentials.authenticate(name, password)?;
        self.open_session(identity)
    }

    fn open_session(&self, identity: Identity) -> SessionResult<AuthResponse> {
        self.coordinator.mark_present(identity.id)?;
        let token = self.tokens.issue(identity.id)?;
        Ok(AuthResponse {
            token,
            user: identity,
        })
    }

    /// Identity behind a bearer token
    pub fn caller(&self, token: &str) -> SessionResult<IdentityId> {
        self.tokens.resolve(token)
    }

    /// Revoke every token of the caller and run the logout cascade
    pub fn logout(&self, caller: IdentityId) -> SessionResult<()> {
        let revoked = self.tokens.revoke_all(caller)?;
        self.coordinator.logout(caller)?;
        info!(identity = caller, revoked, "Session closed");
        Ok(())
    }

    /// Step-up password check, then the choice
    fn confirm_ballot(
        &self,
        caller: IdentityId,
        ballot: &BallotRequest,
    ) -> SessionResult<VoteChoice> {
        self.credentials.verify_password(caller, &ballot.password)?;
        ballot.vote.trim().to_lowercase().parse()
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    pub fn create_room(
        &self,
        caller: IdentityId,
        name: Option<String>,
        passcode: Option<String>,
    ) -> SessionResult<RoomSummary> {
        self.coordinator.create_room(caller, name, passcode)
    }

    pub fn join_room(
        &self,
        caller: IdentityId,
        code: &str,
        passcode: Option<&str>,
    ) -> SessionResult<RoomSummary> {
        self.coordinator.join_room(caller, code, passcode)
    }

    pub fn current_room(&self, caller: IdentityId) -> SessionResult<RoomSummary> {
        self.coordinator.current_room(caller)
    }

    pub fn room_info(&self, code: &str) -> SessionResult<RoomInfo> {
        self.coordinator.room_info(code)
    }

    pub fn leave_room(&self, caller: IdentityId) -> SessionResult<Departure> {
        self.coordinator.leave_room(caller)
    }

    pub fn room_members(&self, caller: IdentityId) -> SessionResult<Vec<MemberStatus>> {
        self.coordinator.room_members(caller)
    }

    fn room(&self, caller: IdentityId) -> SessionResult<RoomCode> {
        self.coordinator.room_of(caller)
    }

    // ========================================================================
    // Round
    // ========================================================================

    pub fn enter_lobby(&self, caller: IdentityId) -> SessionResult<u32> {
        self.coordinator.enter_lobby(caller)
    }

    /// Participants can only mark themselves ready
    pub fn mark_ready(&self, caller: IdentityId, target: IdentityId) -> SessionResult<()> {
        if caller != target {
            return Err(SessionError::unauthorized(
                "cannot mark another participant ready",
            ));
        }
        self.coordinator.mark_ready(caller)
    }

    pub fn ready_status(&self, caller: IdentityId) -> SessionResult<ReadyStatus> {
        self.coordinator.ready_status(&self.room(caller)?)
    }

    pub fn random_proposer(&self) -> SessionResult<RandomProposer> {
        self.coordinator.random_proposer()
    }

    pub fn submit_proposal(
        &self,
        caller: IdentityId,
        title: &str,
        description: &str,
    ) -> SessionResult<ProposalSubmission> {
        self.coordinator.submit_proposal(caller, title, description)
    }

    pub fn submission_status(&self, caller: IdentityId) -> SessionResult<SubmissionStatus> {
        self.coordinator.submission_status(&self.room(caller)?)
    }

    pub fn proposals_to_vote(&self, caller: IdentityId) -> SessionResult<Vec<ProposalSubmission>> {
        self.coordinator.proposals_to_vote_on(caller)
    }

    pub fn vote_on_submission(
        &self,
        caller: IdentityId,
        proposer: IdentityId,
        ballot: &BallotRequest,
    ) -> SessionResult<()> {
        let choice = self.confirm_ballot(caller, ballot)?;
        self.coordinator.record_submission_vote(caller, proposer, choice)
    }

    pub fn submission_results(
        &self,
        caller: IdentityId,
        proposer: IdentityId,
    ) -> SessionResult<VoteCounts> {
        self.coordinator.submission_counts(&self.room(caller)?, proposer)
    }

    pub fn voting_results(&self, caller: IdentityId) -> SessionResult<Vec<VerdictRow>> {
        self.coordinator.voting_results(&self.room(caller)?)
    }

    pub fn mark_voting_complete(&self, caller: IdentityId) -> SessionResult<()> {
        self.coordinator.mark_voting_complete(caller)
    }

    pub fn voting_status(&self, caller: IdentityId) -> SessionResult<VotingStatus> {
        self.coordinator.voting_status(&self.room(caller)?)
    }

    pub fn tied_proposals(&self, caller: IdentityId) -> SessionResult<Vec<TiedProposal>> {
        self.coordinator.tied_proposals(&self.room(caller)?)
    }

    // ========================================================================
    // Tiebreak
    // ========================================================================

    pub fn start_tiebreaker(&self, caller: IdentityId) -> SessionResult<()> {
        self.coordinator.start_tiebreaker(caller)
    }

    pub fn reset_tiebreak_agreement(&self, caller: IdentityId) -> SessionResult<()> {
        self.coordinator.reset_tiebreak_agreement(caller)
    }

    pub fn arrive_at_tiebreaker(&self, caller: IdentityId) -> SessionResult<ArrivalStatus> {
        self.coordinator.arrive_at_tiebreaker(caller)
    }

    pub fn arrival_status(&self, caller: IdentityId) -> SessionResult<ArrivalStatus> {
        self.coordinator.arrival_status(&self.room(caller)?)
    }

    pub fn agree_to_tiebreak(&self, caller: IdentityId) -> SessionResult<()> {
        self.coordinator.agree_to_tiebreak(caller)
    }

    pub fn agreement_status(&self, caller: IdentityId) -> SessionResult<AgreementStatus> {
        self.coordinator.agreement_status(&self.room(caller)?)
    }

    pub fn tiebreak_vote(
        &self,
        caller: IdentityId,
        proposer: IdentityId,
        ballot: &BallotRequest,
    ) -> SessionResult<()> {
        let choice = self.confirm_ballot(caller, ballot)?;
        self.coordinator.record_tiebreak_vote(caller, proposer, choice)
    }

    pub fn mark_tiebreak_complete(&self, caller: IdentityId) -> SessionResult<()> {
        self.coordinator.mark_tiebreak_complete(caller)
    }

    pub fn tiebreak_status(&self, caller: IdentityId) -> SessionResult<TiebreakStatus> {
        self.coordinator.tiebreak_status(&self.room(caller)?)
    }

    pub fn final_results(&self, caller: IdentityId) -> SessionResult<Vec<VerdictRow>> {
        self.coordinator.final_results(&self.room(caller)?)
    }

    pub fn round_snapshot(&self, caller: IdentityId) -> SessionResult<RoundSnapshot> {
        self.coordinator.round_snapshot(&self.room(caller)?)
    }

    // ========================================================================
    // Ledger
    // ========================================================================

    pub fn list_proposals(&self) -> SessionResult<Vec<Proposal>> {
        self.ledger.list_proposals()
    }

    /// Record a ledger proposal under the caller's name
    pub fn create_proposal(
        &self,
        caller: IdentityId,
        title: &str,
        description: &str,
    ) -> SessionResult<Proposal> {
        let identity = self
            .credentials
            .get(caller)?
            .ok_or_else(|| SessionError::unauthorized("identity no longer registered"))?;
        let proposal = self.ledger.create_proposal(title, description, &identity.name)?;
        info!(proposal = proposal.id, identity = caller, "Ledger proposal created");
        Ok(proposal)
    }

    pub fn cast_ledger_vote(
        &self,
        caller: IdentityId,
        proposal_id: ProposalId,
        ballot: &BallotRequest,
    ) -> SessionResult<()> {
        let choice = self.confirm_ballot(caller, ballot)?;
        self.ledger.cast_vote(proposal_id, caller, choice)?;
        Ok(())
    }

    pub fn ledger_results(&self, proposal_id: ProposalId) -> SessionResult<LedgerResults> {
        let tally = self.ledger.tally(proposal_id)?;
        Ok(LedgerResults::new(proposal_id, tally, self.credentials.count()?))
    }

    pub fn health(&self) -> SessionResult<HealthResponse> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            rooms: self.coordinator.room_count()?,
            sessions: self.tokens.active()?,
            started_at: self.started_at,
        })
    }
}
