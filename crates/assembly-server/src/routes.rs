//! HTTP routes
//!
//! Thin handlers: resolve the caller from the bearer token, call the
//! service, wrap the result in JSON. Status endpoints are plain `GET`s so
//! polling clients can hit them on a timer.

use assembly_coordination::{
    AgreementStatus, ArrivalStatus, IdentityId, MemberStatus, Proposal, ProposalId,
    ProposalSubmission, RandomProposer, ReadyStatus, RoomInfo, RoomSummary, RoundSnapshot,
    SubmissionStatus, TiebreakStatus, TiedProposal, VerdictRow, VoteCounts, VotingStatus,
};
use axum::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::{
    AuthResponse, BallotRequest, CreateProposalRequest, CreateRoomRequest, HealthResponse,
    JoinRoomRequest, LeaveResponse, LedgerResults, LobbyResponse, LoginRequest, MessageResponse,
    RegisterRequest, SubmitProposalRequest,
};
use crate::auth::bearer_token;
use crate::error::{ApiError, ApiResult};
use crate::service::SharedService;

/// Build the application router
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // sessions
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        // rooms
        .route("/api/room/create", post(create_room))
        .route("/api/room/join", post(join_room))
        .route("/api/room/current", get(current_room))
        .route("/api/room/info/:code", get(room_info))
        .route("/api/room/leave", post(leave_room))
        .route("/api/users", get(room_members))
        // lobby and proposals
        .route("/api/lobby", post(enter_lobby))
        .route("/api/users/:id/ready", post(mark_ready))
        .route("/api/ready-status", get(ready_status))
        .route("/api/random-proposer", get(random_proposer))
        .route("/api/proposal-submission", post(submit_proposal))
        .route("/api/all-proposals-submitted", get(submission_status))
        .route("/api/proposals-to-vote", get(proposals_to_vote))
        // first vote
        .route("/api/vote-on-submission/:proposer", post(vote_on_submission))
        .route("/api/submission-results/:proposer", get(submission_results))
        .route("/api/all-voting-results", get(voting_results))
        .route("/api/mark-voting-complete", post(mark_voting_complete))
        .route("/api/check-all-voted", get(voting_status))
        .route("/api/get-tied-proposals", get(tied_proposals))
        // tiebreak
        .route("/api/start-tiebreaker", post(start_tiebreaker))
        .route("/api/reset-tiebreak-agreement", post(reset_tiebreak_agreement))
        .route("/api/arrived-tiebreaker", post(arrive_at_tiebreaker))
        .route("/api/check-arrived", get(arrival_status))
        .route("/api/agree-to-tiebreak", post(agree_to_tiebreak))
        .route("/api/check-tiebreak-agreement", get(agreement_status))
        .route("/api/tiebreaker-vote/:proposer", post(tiebreak_vote))
        .route("/api/mark-tiebreaker-complete", post(mark_tiebreak_complete))
        .route("/api/check-all-tiebreaker-complete", get(tiebreak_status))
        .route("/api/final-voting-results", get(final_results))
        .route("/api/round", get(round_snapshot))
        // ledger
        .route("/api/proposals", get(list_proposals).post(create_proposal))
        .route("/api/proposals/:id/vote", post(cast_ledger_vote))
        .route("/api/proposals/:id/results", get(ledger_results))
        .with_state(service)
}

/// Authenticated caller, resolved from `Authorization: Bearer <token>`
pub struct Caller(pub IdentityId);

#[async_trait]
impl FromRequestParts<SharedService> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        service: &SharedService,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        Ok(Caller(service.caller(token)?))
    }
}

fn done(message: &str) -> Json<MessageResponse> {
    Json(MessageResponse::new(message))
}

async fn healthz(State(service): State<SharedService>) -> ApiResult<Json<HealthResponse>> {
    Ok(Json(service.health()?))
}

// ============================================================================
// Sessions
// ============================================================================

async fn register(
    State(service): State<SharedService>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let auth = service.register(&req.name, &req.password, &req.position)?;
    Ok((StatusCode::CREATED, Json(auth)))
}

async fn login(
    State(service): State<SharedService>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    Ok(Json(service.login(&req.name, &req.password)?))
}

async fn logout(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<MessageResponse>> {
    service.logout(caller)?;
    Ok(done("logged out"))
}

// ============================================================================
// Rooms
// ============================================================================

async fn create_room(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<RoomSummary>)> {
    let summary = service.create_room(caller, req.room_name, req.passcode)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn join_room(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Json(req): Json<JoinRoomRequest>,
) -> ApiResult<Json<RoomSummary>> {
    Ok(Json(service.join_room(
        caller,
        &req.room_code,
        req.passcode.as_deref(),
    )?))
}

async fn current_room(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<RoomSummary>> {
    Ok(Json(service.current_room(caller)?))
}

async fn room_info(
    State(service): State<SharedService>,
    _caller: Caller,
    Path(code): Path<String>,
) -> ApiResult<Json<RoomInfo>> {
    Ok(Json(service.room_info(&code)?))
}

async fn leave_room(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<LeaveResponse>> {
    let departure = service.leave_room(caller)?;
    Ok(Json(LeaveResponse {
        room_code: departure.code.to_string(),
        room_closed: departure.room_closed,
    }))
}

async fn room_members(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<MemberStatus>>> {
    Ok(Json(service.room_members(caller)?))
}

// ============================================================================
// Lobby and proposals
// ============================================================================

async fn enter_lobby(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<LobbyResponse>> {
    let round = service.enter_lobby(caller)?;
    Ok(Json(LobbyResponse { round }))
}

async fn mark_ready(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Path(target): Path<IdentityId>,
) -> ApiResult<Json<MessageResponse>> {
    service.mark_ready(caller, target)?;
    Ok(done("marked ready"))
}

async fn ready_status(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<ReadyStatus>> {
    Ok(Json(service.ready_status(caller)?))
}

async fn random_proposer(
    State(service): State<SharedService>,
    _caller: Caller,
) -> ApiResult<Json<RandomProposer>> {
    Ok(Json(service.random_proposer()?))
}

async fn submit_proposal(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Json(req): Json<SubmitProposalRequest>,
) -> ApiResult<(StatusCode, Json<ProposalSubmission>)> {
    let submission = service.submit_proposal(caller, &req.title, &req.description)?;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn submission_status(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<SubmissionStatus>> {
    Ok(Json(service.submission_status(caller)?))
}

async fn proposals_to_vote(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<ProposalSubmission>>> {
    Ok(Json(service.proposals_to_vote(caller)?))
}

// ============================================================================
// First vote
// ============================================================================

async fn vote_on_submission(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Path(proposer): Path<IdentityId>,
    Json(ballot): Json<BallotRequest>,
) -> ApiResult<Json<MessageResponse>> {
    service.vote_on_submission(caller, proposer, &ballot)?;
    Ok(done("vote recorded"))
}

async fn submission_results(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Path(proposer): Path<IdentityId>,
) -> ApiResult<Json<VoteCounts>> {
    Ok(Json(service.submission_results(caller, proposer)?))
}

async fn voting_results(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<VerdictRow>>> {
    Ok(Json(service.voting_results(caller)?))
}

async fn mark_voting_complete(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<MessageResponse>> {
    service.mark_voting_complete(caller)?;
    Ok(done("voting marked complete"))
}

async fn voting_status(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<VotingStatus>> {
    Ok(Json(service.voting_status(caller)?))
}

async fn tied_proposals(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<TiedProposal>>> {
    Ok(Json(service.tied_proposals(caller)?))
}

// ============================================================================
// Tiebreak
// ============================================================================

async fn start_tiebreaker(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<MessageResponse>> {
    service.start_tiebreaker(caller)?;
    Ok(done("tiebreaker started"))
}

async fn reset_tiebreak_agreement(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<MessageResponse>> {
    service.reset_tiebreak_agreement(caller)?;
    Ok(done("tiebreak agreement reset"))
}

async fn arrive_at_tiebreaker(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<ArrivalStatus>> {
    Ok(Json(service.arrive_at_tiebreaker(caller)?))
}

async fn arrival_status(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<ArrivalStatus>> {
    Ok(Json(service.arrival_status(caller)?))
}

async fn agree_to_tiebreak(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<MessageResponse>> {
    service.agree_to_tiebreak(caller)?;
    Ok(done("agreed to tiebreak"))
}

async fn agreement_status(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<AgreementStatus>> {
    Ok(Json(service.agreement_status(caller)?))
}

async fn tiebreak_vote(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Path(proposer): Path<IdentityId>,
    Json(ballot): Json<BallotRequest>,
) -> ApiResult<Json<MessageResponse>> {
    service.tiebreak_vote(caller, proposer, &ballot)?;
    Ok(done("tiebreak vote recorded"))
}

async fn mark_tiebreak_complete(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<MessageResponse>> {
    service.mark_tiebreak_complete(caller)?;
    Ok(done("tiebreak marked complete"))
}

async fn tiebreak_status(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<TiebreakStatus>> {
    Ok(Json(service.tiebreak_status(caller)?))
}

async fn final_results(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<VerdictRow>>> {
    Ok(Json(service.final_results(caller)?))
}

async fn round_snapshot(
    State(service): State<SharedService>,
    Caller(caller): Caller,
) -> ApiResult<Json<RoundSnapshot>> {
    Ok(Json(service.round_snapshot(caller)?))
}

// ============================================================================
// Ledger
// ============================================================================

async fn list_proposals(
    State(service): State<SharedService>,
    _caller: Caller,
) -> ApiResult<Json<Vec<Proposal>>> {
    Ok(Json(service.list_proposals()?))
}

async fn create_proposal(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Json(req): Json<CreateProposalRequest>,
) -> ApiResult<(StatusCode, Json<Proposal>)> {
    let proposal = service.create_proposal(caller, &req.title, &req.description)?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

async fn cast_ledger_vote(
    State(service): State<SharedService>,
    Caller(caller): Caller,
    Path(id): Path<ProposalId>,
    Json(ballot): Json<BallotRequest>,
) -> ApiResult<Json<MessageResponse>> {
    service.cast_ledger_vote(caller, id, &ballot)?;
    Ok(done("vote recorded"))
}

async fn ledger_results(
    State(service): State<SharedService>,
    _caller: Caller,
    Path(id): Path<ProposalId>,
) -> ApiResult<Json<LedgerResults>> {
    Ok(Json(service.ledger_results(id)?))
}
