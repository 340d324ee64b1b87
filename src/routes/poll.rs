use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::poll::{CreatePollRequest, CurrentPollQuery, CurrentPollResponse, PollSummary},
    error::AppError,
    services::{
        events::{self, PollEvent},
        poll_service,
    },
    state::SharedState,
};

/// Routes handling the poll lifecycle REST surface.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/poll", post(create_poll))
        .route("/poll/current", get(current_poll))
        .route("/poll/history", get(poll_history))
}

/// Open a new poll and announce it to every connected client.
#[utoipa::path(
    post,
    path = "/poll",
    tag = "poll",
    request_body = CreatePollRequest,
    responses(
        (status = 200, description = "Poll created", body = PollSummary),
        (status = 400, description = "Another poll is active or the request is invalid")
    )
)]
pub async fn create_poll(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreatePollRequest>>,
) -> Result<Json<PollSummary>, AppError> {
    let poll = poll_service::create_poll(&state, payload).await?;
    events::publish(&state, PollEvent::Started(poll.clone()));
    Ok(Json(poll.into()))
}

/// Current active poll for state recovery, with remaining time and vote status.
#[utoipa::path(
    get,
    path = "/poll/current",
    tag = "poll",
    params(
        ("student_id" = Option<String>, Query, description = "Student to report the voted flag for")
    ),
    responses(
        (status = 200, description = "Active poll or `poll: null`", body = CurrentPollResponse)
    )
)]
pub async fn current_poll(
    State(state): State<SharedState>,
    Query(query): Query<CurrentPollQuery>,
) -> Result<Json<CurrentPollResponse>, AppError> {
    let response = poll_service::current_poll(&state, query.student_id.as_deref()).await?;
    Ok(Json(response))
}

/// Ended polls, most recent first.
#[utoipa::path(
    get,
    path = "/poll/history",
    tag = "poll",
    responses(
        (status = 200, description = "Ended polls, newest first", body = Vec<PollSummary>)
    )
)]
pub async fn poll_history(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PollSummary>>, AppError> {
    let history = poll_service::poll_history(&state).await?;
    Ok(Json(history))
}
