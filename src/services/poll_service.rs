use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{PollEntity, VoteEntity},
    dto::poll::{CreatePollRequest, CurrentPollResponse, PollSummary},
    error::ServiceError,
    services::{
        current_millis,
        events::{self, PollEvent},
    },
    state::SharedState,
};

/// Open a new poll.
///
/// Fails with [`ServiceError::Conflict`] while another poll is still active,
/// leaving the store untouched. Broadcasting the started event is left to the
/// caller.
pub async fn create_poll(
    state: &SharedState,
    request: CreatePollRequest,
) -> Result<PollEntity, ServiceError> {
    let store = state.require_poll_store().await?;

    let question = request.question.trim().to_owned();
    if question.is_empty() {
        return Err(ServiceError::InvalidInput(
            "question must not be empty".into(),
        ));
    }

    let config = state.config();
    if request.options.len() > config.max_options() {
        return Err(ServiceError::InvalidInput(format!(
            "a poll supports at most {} options",
            config.max_options()
        )));
    }
    if request.duration_secs > config.max_duration_secs() {
        return Err(ServiceError::InvalidInput(format!(
            "duration must not exceed {} seconds",
            config.max_duration_secs()
        )));
    }

    let options: Vec<String> = request
        .options
        .into_iter()
        .map(|text| text.trim().to_owned())
        .collect();
    if options.iter().any(|text| text.is_empty()) {
        return Err(ServiceError::InvalidInput(
            "option texts must not be empty".into(),
        ));
    }

    if store.find_active_poll().await?.is_some() {
        return Err(ServiceError::Conflict("poll already active".into()));
    }

    let poll = PollEntity::start(question, options, request.duration_secs, current_millis());
    store.insert_poll(poll.clone()).await?;
    info!(poll_id = %poll.id, duration_secs = poll.duration_secs, "poll opened");
    Ok(poll)
}

/// Record one student's vote and bump the matching tally.
///
/// The unique `(poll, student)` write is the sole double-vote guard; a repeat
/// attempt surfaces as [`ServiceError::DuplicateVote`] without touching any
/// tally. Returns the updated poll for broadcast by the caller.
pub async fn submit_vote(
    state: &SharedState,
    poll_id: Uuid,
    student_id: &str,
    option_id: Uuid,
) -> Result<PollEntity, ServiceError> {
    let store = state.require_poll_store().await?;

    let poll = store
        .find_poll(poll_id)
        .await?
        .filter(|poll| poll.is_active)
        .ok_or_else(|| ServiceError::InvalidState("poll not active".into()))?;

    if !poll.has_option(option_id) {
        return Err(ServiceError::InvalidState(format!(
            "option `{option_id}` does not belong to poll `{poll_id}`"
        )));
    }

    store
        .insert_vote(VoteEntity {
            poll_id,
            student_id: student_id.to_owned(),
            option_id,
        })
        .await?;

    store
        .increment_tally(poll_id, option_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("poll `{poll_id}` not found")))
}

/// Look up the active poll for state recovery on (re)connect.
///
/// Computes the clamped remaining time and, when a `student_id` is supplied,
/// whether that student already voted. A poll observed past its end time is
/// flipped inactive on the way out; this is one of the two expiry triggers.
pub async fn current_poll(
    state: &SharedState,
    student_id: Option<&str>,
) -> Result<CurrentPollResponse, ServiceError> {
    let store = state.require_poll_store().await?;

    let Some(poll) = store.find_active_poll().await? else {
        return Ok(CurrentPollResponse::empty());
    };

    let remaining_secs = poll.remaining_seconds(current_millis());

    let has_voted = match student_id {
        Some(student_id) => store.has_voted(poll.id, student_id.to_owned()).await?,
        None => false,
    };

    let poll = if remaining_secs == 0 {
        if let Some(ended) = expire_if_due(state, &poll).await? {
            events::publish(state, PollEvent::Ended(ended.clone()));
            ended
        } else {
            // The ticker won the race; report the final state regardless.
            let mut ended = poll;
            ended.is_active = false;
            ended
        }
    } else {
        poll
    };

    Ok(CurrentPollResponse {
        poll: Some(poll.into()),
        remaining_secs: Some(remaining_secs),
        has_voted: Some(has_voted),
    })
}

/// Ended polls, most recently started first.
pub async fn poll_history(state: &SharedState) -> Result<Vec<PollSummary>, ServiceError> {
    let store = state.require_poll_store().await?;
    let polls = store.list_ended_polls().await?;
    Ok(polls.into_iter().map(Into::into).collect())
}

/// Idempotent `ACTIVE -> ENDED` transition, invoked identically from the
/// query path and the ticker.
///
/// The conditional store write arbitrates racing triggers: only the winner
/// receives the final snapshot (and is expected to publish the ended event),
/// every other caller gets `None` and performs no redundant work.
pub async fn expire_if_due(
    state: &SharedState,
    poll: &PollEntity,
) -> Result<Option<PollEntity>, ServiceError> {
    if !poll.is_due(current_millis()) {
        return Ok(None);
    }

    let store = state.require_poll_store().await?;
    if store.deactivate_poll(poll.id).await? {
        let mut ended = poll.clone();
        ended.is_active = false;
        info!(poll_id = %poll.id, "poll ended");
        Ok(Some(ended))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::poll_store::{PollStore, memory::MemoryPollStore},
        state::AppState,
    };

    async fn state_with_store() -> (crate::state::SharedState, MemoryPollStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryPollStore::default();
        state.set_poll_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn request(question: &str, options: &[&str], duration_secs: u32) -> CreatePollRequest {
        CreatePollRequest {
            question: question.into(),
            options: options.iter().map(|text| (*text).into()).collect(),
            duration_secs,
        }
    }

    fn expired_poll(duration_secs: u32) -> PollEntity {
        let now = current_millis();
        let started_at_ms = now - u64::from(duration_secs) * 1000 - 5_000;
        let mut poll = PollEntity::start(
            "Expired?".into(),
            vec!["yes".into(), "no".into()],
            duration_secs,
            started_at_ms,
        );
        poll.is_active = true;
        poll
    }

    #[tokio::test]
    async fn degraded_mode_rejects_operations() {
        let state = AppState::new(AppConfig::default());
        let err = create_poll(&state, request("Q", &["A", "B"], 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn second_create_while_active_conflicts_and_leaves_store_unchanged() {
        let (state, store) = state_with_store().await;

        let first = create_poll(&state, request("Pick one", &["A", "B"], 60))
            .await
            .unwrap();

        let err = create_poll(&state, request("Another", &["C", "D"], 60))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let active = store.find_active_poll().await.unwrap().unwrap();
        assert_eq!(active.id, first.id);
        assert!(store.list_ended_polls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let (state, _store) = state_with_store().await;

        let blank_question = create_poll(&state, request("   ", &["A", "B"], 5))
            .await
            .unwrap_err();
        assert!(matches!(blank_question, ServiceError::InvalidInput(_)));

        let blank_option = create_poll(&state, request("Q", &["A", "  "], 5))
            .await
            .unwrap_err();
        assert!(matches!(blank_option, ServiceError::InvalidInput(_)));

        let too_long = create_poll(&state, request("Q", &["A", "B"], 86_400))
            .await
            .unwrap_err();
        assert!(matches!(too_long, ServiceError::InvalidInput(_)));

        let texts: Vec<String> = (0..13).map(|index| format!("option {index}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let too_many = create_poll(&state, request("Q", &refs, 5)).await.unwrap_err();
        assert!(matches!(too_many, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn vote_duplicate_and_tally_consistency() {
        let (state, store) = state_with_store().await;
        let poll = create_poll(&state, request("Pick one", &["A", "B"], 5))
            .await
            .unwrap();
        let option_a = poll.options[0].id;
        let option_b = poll.options[1].id;

        let current = current_poll(&state, Some("s1")).await.unwrap();
        let remaining = current.remaining_secs.unwrap();
        assert!((4..=5).contains(&remaining), "remaining was {remaining}");
        assert_eq!(current.has_voted, Some(false));

        let updated = submit_vote(&state, poll.id, "s1", option_a).await.unwrap();
        assert_eq!(updated.options[0].votes, 1);
        assert_eq!(updated.options[1].votes, 0);

        // Second vote for the same student fails, even on a different option.
        let err = submit_vote(&state, poll.id, "s1", option_b)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateVote(_)));

        let stored = store.find_poll(poll.id).await.unwrap().unwrap();
        assert_eq!(stored.options[0].votes, 1);
        assert_eq!(stored.options[1].votes, 0);

        // Tallies equal the persisted vote records per option.
        assert_eq!(store.votes_for_option(option_a).await, 1);
        assert_eq!(store.votes_for_option(option_b).await, 0);

        let current = current_poll(&state, Some("s1")).await.unwrap();
        assert_eq!(current.has_voted, Some(true));
    }

    #[tokio::test]
    async fn vote_for_unknown_option_is_rejected_before_any_write() {
        let (state, store) = state_with_store().await;
        let poll = create_poll(&state, request("Pick one", &["A", "B"], 60))
            .await
            .unwrap();

        let err = submit_vote(&state, poll.id, "s1", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        // No vote slot was burned: the student can still vote properly.
        assert!(!store.has_voted(poll.id, "s1".into()).await.unwrap());
        submit_vote(&state, poll.id, "s1", poll.options[0].id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn vote_on_missing_or_ended_poll_is_rejected() {
        let (state, store) = state_with_store().await;

        let err = submit_vote(&state, Uuid::new_v4(), "s1", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let poll = create_poll(&state, request("Pick one", &["A", "B"], 60))
            .await
            .unwrap();
        store.deactivate_poll(poll.id).await.unwrap();

        let err = submit_vote(&state, poll.id, "s1", poll.options[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn current_poll_without_active_poll_is_empty() {
        let (state, _store) = state_with_store().await;
        let response = current_poll(&state, None).await.unwrap();
        assert!(response.poll.is_none());
        assert!(response.remaining_secs.is_none());
        assert!(response.has_voted.is_none());
    }

    #[tokio::test]
    async fn query_observed_expiry_flips_once_and_emits_one_ended_event() {
        let (state, store) = state_with_store().await;
        let poll = expired_poll(5);
        store.seed_poll(poll.clone()).await;

        let mut receiver = state.hub().subscribe();

        let response = current_poll(&state, Some("s1")).await.unwrap();
        let snapshot = response.poll.unwrap();
        assert_eq!(snapshot.id, poll.id);
        assert!(!snapshot.is_active);
        assert_eq!(response.remaining_secs, Some(0));

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event, "poll_ended");

        // Expiry already happened: the poll is gone from the active slot and
        // no further transition or broadcast takes place.
        let response = current_poll(&state, Some("s1")).await.unwrap();
        assert!(response.poll.is_none());
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));

        // A fresh poll can be opened now that the previous one ended.
        create_poll(&state, request("Next", &["A", "B"], 5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expire_if_due_is_a_noop_for_running_polls() {
        let (state, _store) = state_with_store().await;
        let poll = create_poll(&state, request("Pick one", &["A", "B"], 60))
            .await
            .unwrap();

        assert!(expire_if_due(&state, &poll).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_lists_ended_polls_newest_first() {
        let (state, store) = state_with_store().await;

        let mut older = expired_poll(5);
        older.question = "older".into();
        older.is_active = false;
        let mut newer = expired_poll(5);
        newer.question = "newer".into();
        newer.started_at_ms = older.started_at_ms + 60_000;
        newer.is_active = false;
        store.seed_poll(older).await;
        store.seed_poll(newer).await;

        let history = poll_history(&state).await.unwrap();
        let questions: Vec<&str> = history
            .iter()
            .map(|poll| poll.question.as_str())
            .collect();
        assert_eq!(questions, vec!["newer", "older"]);
    }
}
