use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        events::{ErrorEvent, ServerEvent},
        validation::validate_display_name,
    },
    services::{current_millis, events, websocket_service::send_message_to_websocket},
    state::{
        SharedState,
        session::{ChatMessage, ChatRole, Participant},
    },
};

/// Handle a join request.
///
/// A rejection (invalid or colliding display name) is answered on the
/// originating connection only; a success broadcasts the updated roster to
/// everyone.
pub async fn join(state: &SharedState, connection_id: Uuid, student_id: String, name: String) {
    if let Err(err) = validate_display_name(&name) {
        let message = err
            .message
            .map(|text| text.into_owned())
            .unwrap_or_else(|| "invalid display name".into());
        send_to_connection(state, connection_id, events::EVENT_NAME_ERROR, &ErrorEvent {
            message,
        });
        return;
    }

    let participant = Participant {
        connection_id,
        student_id,
        name,
    };

    match state.sessions().join(participant).await {
        Ok(roster) => {
            info!(%connection_id, "participant joined");
            events::broadcast_participant_list(state, &roster);
        }
        Err(err) => {
            send_to_connection(state, connection_id, events::EVENT_NAME_ERROR, &ErrorEvent {
                message: err.to_string(),
            });
        }
    }
}

/// Disconnect cleanup; broadcasts the roster only when the client had joined.
pub async fn leave(state: &SharedState, connection_id: Uuid) {
    if let Some(roster) = state.sessions().leave(connection_id).await {
        events::broadcast_participant_list(state, &roster);
    }
}

/// Moderation: notify, disconnect and deregister the targeted connection.
///
/// Removal and the roster broadcast never depend on delivery succeeding, so
/// kicking an already-gone connection stays a safe no-op.
pub async fn kick(state: &SharedState, target: Uuid) {
    if let Some((_, connection)) = state.connections().remove(&target) {
        send_message_to_websocket(
            &connection.tx,
            &ServerEvent::named(events::EVENT_KICKED),
            "kick notice",
        );
        let _ = connection.tx.send(Message::Close(None));
        let _ = connection.kill.send(true);
    }

    let roster = state.sessions().remove(target).await;
    events::broadcast_participant_list(state, &roster);
    info!(connection_id = %target, "participant kicked");
}

/// Append and broadcast a chat message; blank messages are dropped silently.
pub async fn post_message(state: &SharedState, sender: String, role: ChatRole, message: String) {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return;
    }

    let entry = ChatMessage {
        id: Uuid::new_v4(),
        sender,
        role,
        message: trimmed.to_owned(),
        timestamp_ms: current_millis(),
    };

    state.chat().append(entry.clone()).await;
    events::broadcast_chat_message(state, &entry);
}

/// Replay the full chat history to a newly connected client.
pub async fn send_chat_history(state: &SharedState, tx: &mpsc::UnboundedSender<Message>) {
    let history = state.chat().history().await;
    match ServerEvent::json(events::EVENT_CHAT_HISTORY, &history) {
        Ok(envelope) => send_message_to_websocket(tx, &envelope, "chat history replay"),
        Err(err) => tracing::warn!(error = %err, "failed to serialize chat history"),
    }
}

fn send_to_connection(
    state: &SharedState,
    connection_id: Uuid,
    event: &str,
    payload: &impl serde::Serialize,
) {
    let Some(connection) = state.connections().get(&connection_id) else {
        return;
    };
    let tx = connection.tx.clone();
    drop(connection);

    match ServerEvent::json(event, payload) {
        Ok(envelope) => send_message_to_websocket(&tx, &envelope, event),
        Err(err) => tracing::warn!(event, error = %err, "failed to serialize targeted payload"),
    }
}
