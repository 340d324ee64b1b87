use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ServiceError;

/// A connected client that completed the join handshake.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Participant {
    /// Transport-assigned connection identifier (kick target).
    pub connection_id: Uuid,
    /// Client-generated identifier, stable across reconnects.
    pub student_id: String,
    /// Display name, unique among currently joined participants.
    pub name: String,
}

/// In-memory roster of joined participants, keyed by connection.
///
/// Owned by [`AppState`](crate::state::AppState) and only mutated through the
/// operations below; nothing survives a process restart.
#[derive(Default)]
pub struct SessionDirectory {
    participants: Mutex<IndexMap<Uuid, Participant>>,
}

impl SessionDirectory {
    /// Register a participant. Fails when the display name is already in use
    /// by another live connection (case-sensitive comparison).
    pub async fn join(&self, participant: Participant) -> Result<Vec<Participant>, ServiceError> {
        let mut guard = self.participants.lock().await;
        if guard.values().any(|existing| existing.name == participant.name) {
            return Err(ServiceError::NameConflict(format!(
                "name `{}` is already taken",
                participant.name
            )));
        }
        guard.insert(participant.connection_id, participant);
        Ok(guard.values().cloned().collect())
    }

    /// Remove the participant on disconnect. `None` when the connection never
    /// joined, so callers skip the roster broadcast.
    pub async fn leave(&self, connection_id: Uuid) -> Option<Vec<Participant>> {
        let mut guard = self.participants.lock().await;
        guard
            .shift_remove(&connection_id)
            .map(|_| guard.values().cloned().collect())
    }

    /// Remove the participant for a moderation kick. Always returns the
    /// resulting roster; removing an already-gone connection is a no-op.
    pub async fn remove(&self, connection_id: Uuid) -> Vec<Participant> {
        let mut guard = self.participants.lock().await;
        guard.shift_remove(&connection_id);
        guard.values().cloned().collect()
    }

    /// Snapshot of the roster in join order.
    pub async fn roster(&self) -> Vec<Participant> {
        let guard = self.participants.lock().await;
        guard.values().cloned().collect()
    }
}

/// Sender role attached to every chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Teacher,
    Student,
}

/// One chat entry replayed to late joiners.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: String,
    pub role: ChatRole,
    pub message: String,
    pub timestamp_ms: u64,
}

/// Append-only in-memory chat sequence, capped to bound replay size.
pub struct ChatLog {
    capacity: usize,
    messages: Mutex<Vec<ChatMessage>>,
}

impl ChatLog {
    /// Create a log retaining at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Append a message, dropping the oldest entries beyond capacity.
    pub async fn append(&self, message: ChatMessage) {
        let mut guard = self.messages.lock().await;
        guard.push(message);
        let len = guard.len();
        if len > self.capacity {
            guard.drain(..len - self.capacity);
        }
    }

    /// Full history in arrival order.
    pub async fn history(&self) -> Vec<ChatMessage> {
        let guard = self.messages.lock().await;
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(name: &str) -> Participant {
        Participant {
            connection_id: Uuid::new_v4(),
            student_id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn join_rejects_exact_name_collision_only() {
        let directory = SessionDirectory::default();
        directory.join(participant("Ada")).await.unwrap();

        let err = directory.join(participant("Ada")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NameConflict(_)));

        // Case-sensitive match: a different casing is a different name.
        let roster = directory.join(participant("ada")).await.unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[tokio::test]
    async fn roster_preserves_join_order() {
        let directory = SessionDirectory::default();
        for name in ["first", "second", "third"] {
            directory.join(participant(name)).await.unwrap();
        }

        let names: Vec<String> = directory
            .roster()
            .await
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn leave_is_noop_for_unknown_connection() {
        let directory = SessionDirectory::default();
        let joined = participant("Ada");
        let connection_id = joined.connection_id;
        directory.join(joined).await.unwrap();

        assert!(directory.leave(Uuid::new_v4()).await.is_none());
        let roster = directory.leave(connection_id).await.unwrap();
        assert!(roster.is_empty());
        // Name is free again after leaving.
        directory.join(participant("Ada")).await.unwrap();
    }

    #[tokio::test]
    async fn kick_removal_is_idempotent() {
        let directory = SessionDirectory::default();
        let joined = participant("Ada");
        let connection_id = joined.connection_id;
        directory.join(joined).await.unwrap();

        assert!(directory.remove(connection_id).await.is_empty());
        assert!(directory.remove(connection_id).await.is_empty());
    }

    #[tokio::test]
    async fn chat_log_caps_history() {
        let log = ChatLog::new(3);
        for index in 0..5u64 {
            log.append(ChatMessage {
                id: Uuid::new_v4(),
                sender: "Ada".into(),
                role: ChatRole::Student,
                message: format!("message {index}"),
                timestamp_ms: index,
            })
            .await;
        }

        let history = log.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message, "message 2");
        assert_eq!(history[2].message, "message 4");
    }
}
