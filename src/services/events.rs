use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::PollEntity,
    dto::{
        events::{PollStartedEvent, PollTimerEvent, ServerEvent},
        poll::PollSummary,
    },
    state::{
        SharedState,
        session::{ChatMessage, Participant},
    },
};

pub(crate) const EVENT_POLL_STARTED: &str = "poll_started";
pub(crate) const EVENT_POLL_TIMER: &str = "poll_timer";
pub(crate) const EVENT_POLL_ENDED: &str = "poll_ended";
pub(crate) const EVENT_VOTE_UPDATE: &str = "vote_update";
pub(crate) const EVENT_STUDENT_LIST: &str = "student_list";
pub(crate) const EVENT_CHAT_MESSAGE: &str = "chat_message";
pub(crate) const EVENT_CHAT_HISTORY: &str = "chat_history";
pub(crate) const EVENT_KICKED: &str = "kicked";
pub(crate) const EVENT_NAME_ERROR: &str = "name_error";
pub(crate) const EVENT_ERROR: &str = "error";

/// Domain event produced by a poll lifecycle transition.
///
/// Lifecycle call sites emit these values and [`publish`] maps them onto wire
/// envelopes, keeping the lifecycle service unaware of the transport.
#[derive(Debug)]
pub enum PollEvent {
    /// A new poll was opened.
    Started(PollEntity),
    /// A vote was accepted and the tallies changed.
    VotesUpdated(PollEntity),
    /// One second elapsed while a poll is running.
    Tick {
        /// Poll being counted down.
        poll_id: Uuid,
        /// Whole seconds left.
        remaining_secs: u64,
    },
    /// The poll reached its end time.
    Ended(PollEntity),
}

/// Fan a lifecycle event out to every connected client.
pub fn publish(state: &SharedState, event: PollEvent) {
    match event {
        PollEvent::Started(poll) => {
            let remaining_secs = u64::from(poll.duration_secs);
            let payload = PollStartedEvent {
                poll: poll.into(),
                remaining_secs,
            };
            send_event(state, EVENT_POLL_STARTED, &payload);
        }
        PollEvent::VotesUpdated(poll) => {
            let payload: PollSummary = poll.into();
            send_event(state, EVENT_VOTE_UPDATE, &payload);
        }
        PollEvent::Tick {
            poll_id,
            remaining_secs,
        } => {
            let payload = PollTimerEvent {
                poll_id,
                remaining_secs,
            };
            send_event(state, EVENT_POLL_TIMER, &payload);
        }
        PollEvent::Ended(poll) => {
            let payload: PollSummary = poll.into();
            send_event(state, EVENT_POLL_ENDED, &payload);
        }
    }
}

/// Broadcast the full participant roster (snapshot, not a diff).
pub fn broadcast_participant_list(state: &SharedState, roster: &[Participant]) {
    send_event(state, EVENT_STUDENT_LIST, &roster);
}

/// Broadcast one appended chat message.
pub fn broadcast_chat_message(state: &SharedState, message: &ChatMessage) {
    send_event(state, EVENT_CHAT_MESSAGE, message);
}

fn send_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(event, payload) {
        Ok(event) => state.hub().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize broadcast payload"),
    }
}
