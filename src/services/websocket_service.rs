use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc, watch},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        events::{ErrorEvent, ServerEvent},
        ws::ClientMessage,
    },
    services::{
        events::{self, PollEvent},
        poll_service, session_service,
    },
    state::{ClientConnection, SharedState},
};

/// Handle the full lifecycle for an individual client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    let (kill_tx, mut kill_rx) = watch::channel(false);
    state.connections().insert(
        connection_id,
        ClientConnection {
            id: connection_id,
            tx: outbound_tx.clone(),
            kill: kill_tx,
        },
    );
    info!(%connection_id, "client connected");

    // Forwarder task: hub broadcasts flow into this connection's writer.
    let mut hub_rx = state.hub().subscribe();
    let forward_tx = outbound_tx.clone();
    let forwarder_task = tokio::spawn(async move {
        loop {
            match hub_rx.recv().await {
                Ok(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if forward_tx.send(Message::Text(payload.into())).is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => {
                    // Skip lagged broadcasts but keep the connection alive.
                    continue;
                }
            }
        }
    });

    session_service::send_chat_history(&state, &outbound_tx).await;

    loop {
        tokio::select! {
            changed = kill_rx.changed() => {
                if changed.is_err() || *kill_rx.borrow() {
                    info!(%connection_id, "connection closed by moderation");
                    break;
                }
            }
            message = receiver.next() => {
                let Some(message) = message else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        dispatch(&state, connection_id, &outbound_tx, &text).await;
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(frame)) => {
                        info!(%connection_id, "client closed");
                        let _ = outbound_tx.send(Message::Close(frame));
                        break;
                    }
                    Ok(Message::Binary(_)) => {}
                    Ok(Message::Pong(_)) => {}
                    Err(err) => {
                        warn!(%connection_id, error = %err, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    state.connections().remove(&connection_id);
    session_service::leave(&state, connection_id).await;
    info!(%connection_id, "client disconnected");

    forwarder_task.abort();
    finalize(writer_task, outbound_tx).await;
}

/// Route one inbound text frame to the matching service flow.
async fn dispatch(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) {
    match ClientMessage::from_json_str(text) {
        Ok(ClientMessage::Join { student_id, name }) => {
            session_service::join(state, connection_id, student_id, name).await;
        }
        Ok(ClientMessage::Chat {
            sender,
            role,
            message,
        }) => {
            session_service::post_message(state, sender, role, message).await;
        }
        Ok(ClientMessage::Kick {
            connection_id: target,
        }) => {
            session_service::kick(state, target).await;
        }
        Ok(ClientMessage::Vote {
            poll_id,
            student_id,
            option_id,
        }) => match poll_service::submit_vote(state, poll_id, &student_id, option_id).await {
            Ok(poll) => events::publish(state, PollEvent::VotesUpdated(poll)),
            Err(err) => {
                info!(%connection_id, error = %err, "vote rejected");
                send_error(outbound_tx, err.to_string());
            }
        },
        Err(err) => {
            warn!(%connection_id, error = %err, "failed to parse client message");
        }
    }
}

/// Serialize an envelope and push it onto the provided writer channel.
///
/// Serialization failures are permanent (a bug in the payload type) and are
/// only logged; a closed writer means the client is already gone.
pub(crate) fn send_message_to_websocket(
    tx: &mpsc::UnboundedSender<Message>,
    envelope: &ServerEvent,
    context: &str,
) {
    match serde_json::to_string(envelope) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => {
            warn!(context, error = %err, "failed to serialize websocket payload");
        }
    }
}

/// Report a rejected action back to the originating connection only.
fn send_error(tx: &mpsc::UnboundedSender<Message>, message: String) {
    match ServerEvent::json(events::EVENT_ERROR, &ErrorEvent { message }) {
        Ok(envelope) => send_message_to_websocket(tx, &envelope, "action rejection"),
        Err(err) => warn!(error = %err, "failed to serialize error payload"),
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
