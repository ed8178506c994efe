use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use securescout_jobs::PostJobRequest;
use securescout_ledger::LedgerEntry;
use securescout_payments::ReleasedPayment;
use securescout_types::{Agent, Job, JobId, Pas, Review, Scout, SecureScoutError};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/scouts", post(register_scout))
        .route("/api/v1/scouts/{account}", get(get_scout))
        .route("/api/v1/scouts/{account}/jobs", get(scout_jobs))
        .route("/api/v1/agents", post(register_agent).get(list_agents))
        .route("/api/v1/agents/{account}", get(get_agent))
        .route("/api/v1/agents/{account}/jobs", get(agent_jobs))
        .route("/api/v1/agents/{account}/earnings", get(agent_earnings))
        .route("/api/v1/agents/availability", post(set_availability))
        .route("/api/v1/agents/price", post(update_price))
        .route("/api/v1/agents/location", post(update_location))
        .route("/api/v1/jobs", post(post_job).get(list_open_jobs))
        .route("/api/v1/jobs/{job_id}", get(get_job))
        .route("/api/v1/jobs/{job_id}/apply", post(apply_for_job))
        .route("/api/v1/jobs/{job_id}/accept", post(accept_agent))
        .route("/api/v1/jobs/{job_id}/start", post(start_job))
        .route("/api/v1/jobs/{job_id}/progress", post(update_progress))
        .route("/api/v1/jobs/{job_id}/complete", post(submit_completion))
        .route("/api/v1/jobs/{job_id}/approve", post(approve_completion))
        .route("/api/v1/jobs/{job_id}/cancel", post(cancel_job))
        .route("/api/v1/jobs/{job_id}/dispute", post(dispute_job))
        .route("/api/v1/jobs/{job_id}/resolve", post(resolve_dispute))
        .route("/api/v1/jobs/{job_id}/applications", get(job_applications))
        .route("/api/v1/jobs/{job_id}/escrow", get(escrow_balance))
        .route("/api/v1/jobs/{job_id}/reviews", get(job_reviews))
        .route("/api/v1/jobs/{job_id}/rate-agent", post(rate_agent))
        .route("/api/v1/jobs/{job_id}/rate-scout", post(rate_scout))
        .route("/api/v1/jobs/{job_id}/review", post(update_review))
        .route("/api/v1/users/{account}/role", get(user_role))
        .route("/api/v1/users/{account}/reviews", get(user_reviews))
        .route("/api/v1/withdrawals/earnings", post(withdraw_earnings))
        .route("/api/v1/withdrawals/fees", post(withdraw_fees))
        .route("/api/v1/admin/pause", post(pause))
        .route("/api/v1/admin/unpause", post(unpause))
        .route("/api/v1/ledger", get(ledger_entries))
        .route("/api/v1/ledger/verify", get(ledger_verify))
        .route("/health", get(health))
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn error_response(err: SecureScoutError) -> ApiError {
    use SecureScoutError::*;
    let status = match &err {
        JobNotFound(_) | ScoutNotFound(_) | AgentNotFound(_) | ReviewNotFound(_)
        | EscrowNotFound(_) => StatusCode::NOT_FOUND,
        NotAuthorized(_) => StatusCode::FORBIDDEN,
        RegistryPaused => StatusCode::SERVICE_UNAVAILABLE,
        InvalidStateTransition { .. }
        | AlreadyRegistered(_)
        | AgentUnavailable(_)
        | DuplicateApplication { .. }
        | AgentNotApplied { .. }
        | JobNotOpen(_)
        | JobNotInProgress(_)
        | CompletionNotPending(_)
        | JobNotCancelled(_)
        | JobNotCompleted(_)
        | EscrowAlreadyFunded(_)
        | PaymentAlreadyReleased(_)
        | NothingToWithdraw(_)
        | DuplicateReview(_) => StatusCode::CONFLICT,
        EmptyBudget | InsufficientDeposit { .. } | RatingOutOfRange(_)
        | ProgressOutOfRange(_) => StatusCode::BAD_REQUEST,
        LedgerError(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Deserialize)]
struct PageQuery {
    #[serde(default)]
    start: usize,
    #[serde(default = "default_page_size")]
    count: usize,
}

fn default_page_size() -> usize {
    20
}

// ---- Registration and profiles ----

#[derive(serde::Deserialize)]
struct RegisterScoutRequest {
    caller: Uuid,
    display_name: String,
    email: String,
    location: String,
}

async fn register_scout(
    State(state): State<AppState>,
    Json(req): Json<RegisterScoutRequest>,
) -> Result<(StatusCode, Json<Scout>), ApiError> {
    let scout = state
        .hub
        .register_scout(req.caller, req.display_name, req.email, req.location)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(scout)))
}

async fn get_scout(
    State(state): State<AppState>,
    Path(account): Path<Uuid>,
) -> Result<Json<Scout>, ApiError> {
    state.hub.get_scout(account).map(Json).map_err(error_response)
}

#[derive(serde::Deserialize)]
struct RegisterAgentRequest {
    caller: Uuid,
    name: String,
    email: String,
    service_type: String,
    price: Pas,
    location: String,
}

async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let agent = state
        .hub
        .register_agent(
            req.caller,
            req.name,
            req.email,
            req.service_type,
            req.price,
            req.location,
        )
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(agent)))
}

#[derive(serde::Deserialize)]
struct ListAgentsQuery {
    #[serde(default)]
    start: usize,
    #[serde(default = "default_page_size")]
    count: usize,
    location: Option<String>,
    service: Option<String>,
    #[serde(default)]
    available: bool,
}

async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> Json<Vec<Agent>> {
    let users = state.hub.users();
    let agents = if let Some(location) = &query.location {
        users.agents_by_location(location)
    } else if let Some(service) = &query.service {
        users.agents_by_service(service)
    } else if query.available {
        users.available_agents()
    } else {
        return Json(users.agents_paginated(query.start, query.count));
    };
    Json(agents.into_iter().skip(query.start).take(query.count).collect())
}

async fn get_agent(
    State(state): State<AppState>,
    Path(account): Path<Uuid>,
) -> Result<Json<Agent>, ApiError> {
    state.hub.get_agent(account).map(Json).map_err(error_response)
}

#[derive(serde::Serialize)]
struct EarningsResponse {
    pending: Pas,
    total_earned: Pas,
}

async fn agent_earnings(
    State(state): State<AppState>,
    Path(account): Path<Uuid>,
) -> Result<Json<EarningsResponse>, ApiError> {
    let agent = state.hub.get_agent(account).map_err(error_response)?;
    Ok(Json(EarningsResponse {
        pending: state.hub.get_pending_payments(account),
        total_earned: agent.total_earnings,
    }))
}

#[derive(serde::Deserialize)]
struct AvailabilityRequest {
    caller: Uuid,
    available: bool,
}

async fn set_availability(
    State(state): State<AppState>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .set_agent_availability(req.caller, req.available)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct PriceRequest {
    caller: Uuid,
    price: Pas,
}

async fn update_price(
    State(state): State<AppState>,
    Json(req): Json<PriceRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .update_agent_price(req.caller, req.price)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct LocationRequest {
    caller: Uuid,
    location: String,
}

async fn update_location(
    State(state): State<AppState>,
    Json(req): Json<LocationRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .update_agent_location(req.caller, req.location)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Job lifecycle ----

#[derive(serde::Deserialize)]
struct PostJobBody {
    caller: Uuid,
    #[serde(flatten)]
    request: PostJobRequest,
    /// Must equal the budget; the escrow is funded at posting time.
    deposit: Pas,
}

async fn post_job(
    State(state): State<AppState>,
    Json(body): Json<PostJobBody>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state
        .hub
        .post_job_request(body.caller, body.request, body.deposit)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_open_jobs(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Json<Vec<Job>> {
    Json(state.hub.open_jobs(page.start, page.count))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, ApiError> {
    state.hub.get_job_request(job_id).map(Json).map_err(error_response)
}

async fn scout_jobs(
    State(state): State<AppState>,
    Path(account): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Json<Vec<Job>> {
    Json(state.hub.get_scout_jobs(account, page.start, page.count))
}

async fn agent_jobs(
    State(state): State<AppState>,
    Path(account): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Json<Vec<Job>> {
    Json(state.hub.get_agent_jobs(account, page.start, page.count))
}

#[derive(serde::Deserialize)]
struct CallerBody {
    caller: Uuid,
}

async fn apply_for_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<CallerBody>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .apply_for_job(req.caller, job_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct AcceptAgentRequest {
    caller: Uuid,
    agent: Uuid,
}

async fn accept_agent(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<AcceptAgentRequest>,
) -> Result<Json<Job>, ApiError> {
    state
        .hub
        .accept_agent(req.caller, job_id, req.agent)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn start_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<CallerBody>,
) -> Result<Json<Job>, ApiError> {
    state
        .hub
        .start_job(req.caller, job_id)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(serde::Deserialize)]
struct ProgressRequest {
    caller: Uuid,
    progress: u8,
    #[serde(default)]
    message: String,
}

async fn update_progress(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<ProgressRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .update_job_progress(req.caller, job_id, req.progress, req.message)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct CompletionRequest {
    caller: Uuid,
    deliverables: String,
    #[serde(default)]
    proof_urls: Vec<String>,
}

async fn submit_completion(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<Job>, ApiError> {
    state
        .hub
        .submit_job_completion(req.caller, job_id, req.deliverables, req.proof_urls)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn approve_completion(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<CallerBody>,
) -> Result<Json<ReleasedPayment>, ApiError> {
    state
        .hub
        .approve_job_completion(req.caller, job_id)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(serde::Serialize)]
struct RefundResponse {
    refunded: Pas,
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<CallerBody>,
) -> Result<Json<RefundResponse>, ApiError> {
    let refunded = state
        .hub
        .cancel_job_request(req.caller, job_id)
        .await
        .map_err(error_response)?;
    Ok(Json(RefundResponse { refunded }))
}

#[derive(serde::Deserialize)]
struct DisputeRequest {
    caller: Uuid,
    reason: String,
}

async fn dispute_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<DisputeRequest>,
) -> Result<Json<Job>, ApiError> {
    state
        .hub
        .dispute_job(req.caller, job_id, req.reason)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(serde::Deserialize)]
struct ResolveRequest {
    caller: Uuid,
    in_favor_of_agent: bool,
}

async fn resolve_dispute(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<Option<ReleasedPayment>>, ApiError> {
    state
        .hub
        .resolve_dispute(req.caller, job_id, req.in_favor_of_agent)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn job_applications(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    state
        .hub
        .get_job_applications(job_id)
        .map(Json)
        .map_err(error_response)
}

#[derive(serde::Serialize)]
struct EscrowResponse {
    balance: Pas,
}

async fn escrow_balance(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Json<EscrowResponse> {
    Json(EscrowResponse {
        balance: state.hub.get_escrow_balance(job_id),
    })
}

// ---- Ratings ----

#[derive(serde::Deserialize)]
struct RatingRequest {
    caller: Uuid,
    rating: u8,
    #[serde(default)]
    comment: String,
}

async fn rate_agent(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<RatingRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let review = state
        .hub
        .rate_agent(req.caller, job_id, req.rating, req.comment)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn rate_scout(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<RatingRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let review = state
        .hub
        .rate_scout(req.caller, job_id, req.rating, req.comment)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn update_review(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<Review>, ApiError> {
    state
        .hub
        .update_review(req.caller, job_id, req.rating, req.comment)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn job_reviews(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Json<Vec<Review>> {
    Json(state.hub.get_job_reviews(job_id))
}

#[derive(serde::Serialize)]
struct RoleResponse {
    role: Option<securescout_types::Role>,
}

async fn user_role(
    State(state): State<AppState>,
    Path(account): Path<Uuid>,
) -> Json<RoleResponse> {
    Json(RoleResponse {
        role: state.hub.users().role_of(account),
    })
}

async fn user_reviews(
    State(state): State<AppState>,
    Path(account): Path<Uuid>,
) -> Json<Vec<Review>> {
    Json(state.hub.get_user_reviews(account))
}

// ---- Withdrawals and admin ----

#[derive(serde::Serialize)]
struct WithdrawalResponse {
    amount: Pas,
}

async fn withdraw_earnings(
    State(state): State<AppState>,
    Json(req): Json<CallerBody>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let amount = state
        .hub
        .withdraw_earnings(req.caller)
        .await
        .map_err(error_response)?;
    Ok(Json(WithdrawalResponse { amount }))
}

async fn withdraw_fees(
    State(state): State<AppState>,
    Json(req): Json<CallerBody>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let amount = state
        .hub
        .withdraw_platform_fees(req.caller)
        .await
        .map_err(error_response)?;
    Ok(Json(WithdrawalResponse { amount }))
}

async fn pause(
    State(state): State<AppState>,
    Json(req): Json<CallerBody>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .emergency_pause(req.caller)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unpause(
    State(state): State<AppState>,
    Json(req): Json<CallerBody>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .emergency_unpause(req.caller)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Ledger ----

async fn ledger_entries(
    State(state): State<AppState>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    state
        .ledger
        .all_entries()
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(serde::Serialize)]
struct VerifyResponse {
    ok: bool,
    entries: usize,
}

async fn ledger_verify(State(state): State<AppState>) -> Result<Json<VerifyResponse>, ApiError> {
    let ok = state.ledger.verify_integrity().await.map_err(error_response)?;
    let entries = state.ledger.all_entries().await.map_err(error_response)?.len();
    Ok(Json(VerifyResponse { ok, entries }))
}
