use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::warn;

use crate::{
    error::ServiceError,
    services::{
        current_millis,
        events::{self, PollEvent},
        poll_service,
    },
    state::SharedState,
};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Drive the countdown broadcast for the lifetime of the process.
///
/// The loop runs unconditionally every second, idling when no poll is active,
/// and is never torn down between polls. Tick failures are logged and the
/// next tick proceeds normally.
pub async fn run(state: SharedState) {
    let mut ticker = interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(err) = tick(&state).await {
            warn!(error = %err, "countdown tick failed");
        }
    }
}

/// One evaluation of the active poll: emits a timer tick while time remains,
/// otherwise performs the expiry transition and announces the result.
pub async fn tick(state: &SharedState) -> Result<(), ServiceError> {
    let store = match state.require_poll_store().await {
        Ok(store) => store,
        // Storage outage: skip this tick instead of logging every second.
        Err(ServiceError::Degraded) => return Ok(()),
        Err(err) => return Err(err),
    };

    let Some(poll) = store.find_active_poll().await? else {
        return Ok(());
    };

    let remaining_secs = poll.remaining_seconds(current_millis());
    if remaining_secs == 0 {
        // Race with the query-path trigger: only the winner broadcasts.
        if let Some(ended) = poll_service::expire_if_due(state, &poll).await? {
            events::publish(state, PollEvent::Ended(ended));
        }
    } else {
        events::publish(
            state,
            PollEvent::Tick {
                poll_id: poll.id,
                remaining_secs,
            },
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::PollEntity, poll_store::PollStore, poll_store::memory::MemoryPollStore},
        state::AppState,
    };

    async fn state_with_store() -> (crate::state::SharedState, MemoryPollStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryPollStore::default();
        state.set_poll_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn active_poll(started_at_ms: u64, duration_secs: u32) -> PollEntity {
        PollEntity::start(
            "Tick?".into(),
            vec!["yes".into(), "no".into()],
            duration_secs,
            started_at_ms,
        )
    }

    #[tokio::test]
    async fn tick_without_store_is_a_noop() {
        let state = AppState::new(AppConfig::default());
        let mut receiver = state.hub().subscribe();

        tick(&state).await.unwrap();
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn tick_with_no_active_poll_emits_nothing() {
        let (state, _store) = state_with_store().await;
        let mut receiver = state.hub().subscribe();

        tick(&state).await.unwrap();
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn tick_broadcasts_remaining_time_for_running_poll() {
        let (state, store) = state_with_store().await;
        let poll = active_poll(current_millis(), 60);
        store.seed_poll(poll.clone()).await;

        let mut receiver = state.hub().subscribe();
        tick(&state).await.unwrap();

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event, "poll_timer");
        assert_eq!(
            event.data["poll_id"].as_str(),
            Some(poll.id.to_string().as_str())
        );
        let remaining = event.data["remaining_secs"].as_u64().unwrap();
        assert!((59..=60).contains(&remaining), "remaining was {remaining}");

        // The poll stays active while time remains.
        assert!(store.find_poll(poll.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn tick_ends_expired_poll_exactly_once() {
        let (state, store) = state_with_store().await;
        let poll = active_poll(current_millis() - 10_000, 5);
        store.seed_poll(poll.clone()).await;

        let mut receiver = state.hub().subscribe();
        tick(&state).await.unwrap();

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event, "poll_ended");
        assert_eq!(event.data["is_active"].as_bool(), Some(false));
        assert!(!store.find_poll(poll.id).await.unwrap().unwrap().is_active);

        // Further ticks observe no active poll and stay silent.
        tick(&state).await.unwrap();
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn tick_after_query_path_expiry_is_silent() {
        let (state, store) = state_with_store().await;
        let poll = active_poll(current_millis() - 10_000, 5);
        store.seed_poll(poll.clone()).await;

        // The query-path trigger wins the expiry race first.
        assert!(
            poll_service::expire_if_due(&state, &poll)
                .await
                .unwrap()
                .is_some()
        );

        let mut receiver = state.hub().subscribe();
        tick(&state).await.unwrap();
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }
}
