/// Outbound event envelopes and payloads.
pub mod events;
/// Health check payloads.
pub mod health;
/// Poll REST request and response shapes.
pub mod poll;
/// Validation helpers for DTOs.
pub mod validation;
/// Inbound WebSocket messages.
pub mod ws;
