use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::dto::poll::PollSummary;

#[derive(Clone, Debug, Serialize)]
/// Named envelope carried across the broadcast hub and WebSocket connections.
pub struct ServerEvent {
    /// Event name the client dispatches on.
    pub event: String,
    /// JSON payload; `null` for bare notifications.
    pub data: Value,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Envelope without a payload.
    pub fn named(event: &str) -> Self {
        Self {
            event: event.to_string(),
            data: Value::Null,
        }
    }
}

#[derive(Debug, Serialize)]
/// Broadcast when a teacher opens a new poll.
pub struct PollStartedEvent {
    pub poll: PollSummary,
    pub remaining_secs: u64,
}

#[derive(Debug, Serialize)]
/// Broadcast once per second while a poll is running.
pub struct PollTimerEvent {
    pub poll_id: Uuid,
    pub remaining_secs: u64,
}

#[derive(Debug, Serialize)]
/// Targeted error payload for a rejected client action.
pub struct ErrorEvent {
    pub message: String,
}
