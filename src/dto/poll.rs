use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::{PollEntity, PollOptionEntity};

/// Payload used to open a brand-new poll.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePollRequest {
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub question: String,
    /// Option texts in display order.
    #[validate(length(min = 2, message = "a poll needs at least two options"))]
    pub options: Vec<String>,
    /// Poll length in seconds.
    #[validate(range(min = 1, message = "duration must be strictly positive"))]
    pub duration_secs: u32,
}

/// Query parameters accepted by the current-poll lookup.
#[derive(Debug, Deserialize)]
pub struct CurrentPollQuery {
    /// When present, the response reports whether this student already voted.
    pub student_id: Option<String>,
}

/// Public projection of a poll option with its tally.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollOptionSummary {
    pub id: Uuid,
    pub text: String,
    pub votes: u32,
}

impl From<PollOptionEntity> for PollOptionSummary {
    fn from(value: PollOptionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            votes: value.votes,
        }
    }
}

/// Public projection of a poll exposed to REST and WebSocket clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollSummary {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<PollOptionSummary>,
    /// Epoch milliseconds at which the poll was opened.
    pub started_at_ms: u64,
    pub duration_secs: u32,
    /// Epoch milliseconds at which the poll expires.
    pub ends_at_ms: u64,
    pub is_active: bool,
}

impl From<PollEntity> for PollSummary {
    fn from(value: PollEntity) -> Self {
        Self {
            id: value.id,
            question: value.question,
            options: value.options.into_iter().map(Into::into).collect(),
            started_at_ms: value.started_at_ms,
            duration_secs: value.duration_secs,
            ends_at_ms: value.ends_at_ms,
            is_active: value.is_active,
        }
    }
}

/// Response of the current-poll lookup used for state recovery on (re)connect.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentPollResponse {
    /// The active (or just-expired) poll; `null` when none exists.
    pub poll: Option<PollSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_voted: Option<bool>,
}

impl CurrentPollResponse {
    /// Response when no poll is active.
    pub fn empty() -> Self {
        Self {
            poll: None,
            remaining_secs: None,
            has_voted: None,
        }
    }
}
