mod hub;
/// Session roster and chat log components.
pub mod session;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::poll_store::PollStore,
    error::ServiceError,
    state::session::{ChatLog, SessionDirectory},
};

pub use self::hub::EventHub;

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

const EVENT_HUB_CAPACITY: usize = 64;

/// Handle used to push messages to one connected WebSocket client.
pub struct ClientConnection {
    /// Server-assigned connection identifier.
    pub id: Uuid,
    /// Writer channel feeding the connection's outbound task.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Kill switch tripped by moderation to tear the socket down.
    pub kill: watch::Sender<bool>,
}

/// Central application state storing live connections, session data and the
/// storage handle.
pub struct AppState {
    config: AppConfig,
    poll_store: RwLock<Option<Arc<dyn PollStore>>>,
    hub: EventHub,
    connections: DashMap<Uuid, ClientConnection>,
    sessions: SessionDirectory,
    chat: ChatLog,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let chat = ChatLog::new(config.chat_history_limit());
        Arc::new(Self {
            config,
            poll_store: RwLock::new(None),
            hub: EventHub::new(EVENT_HUB_CAPACITY),
            connections: DashMap::new(),
            sessions: SessionDirectory::default(),
            chat,
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current poll store, if one is installed.
    pub async fn poll_store(&self) -> Option<Arc<dyn PollStore>> {
        let guard = self.poll_store.read().await;
        guard.as_ref().cloned()
    }

    /// Poll store handle, or [`ServiceError::Degraded`] when storage is down.
    pub async fn require_poll_store(&self) -> Result<Arc<dyn PollStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        let guard = self.poll_store.read().await;
        guard.as_ref().cloned().ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn set_poll_store(&self, store: Arc<dyn PollStore>) {
        {
            let mut guard = self.poll_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub feeding every connected client.
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Registry of live WebSocket connections keyed by connection id.
    pub fn connections(&self) -> &DashMap<Uuid, ClientConnection> {
        &self.connections
    }

    /// Roster of joined participants.
    pub fn sessions(&self) -> &SessionDirectory {
        &self.sessions
    }

    /// Process-lifetime chat log.
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }
}
