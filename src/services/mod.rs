/// OpenAPI documentation generation.
pub mod documentation;
/// Domain event publication onto the broadcast hub.
pub mod events;
/// Health check service.
pub mod health_service;
/// Poll lifecycle core: creation, voting, expiry, history.
pub mod poll_service;
/// Session roster, chat and moderation flows.
pub mod session_service;
/// Storage reconnection supervisor.
pub mod storage_supervisor;
/// Periodic countdown broadcaster.
pub mod ticker;
/// WebSocket connection and message handling service.
pub mod websocket_service;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds elapsed since the Unix epoch.
pub(crate) fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
