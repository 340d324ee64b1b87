use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::{
    models::{PollEntity, VoteEntity},
    poll_store::PollStore,
    storage::{StorageError, StorageResult},
};

/// Process-local [`PollStore`] backend.
///
/// Backs the unit tests and `--no-default-features` builds; state is lost on
/// restart, which is acceptable for both.
#[derive(Clone, Default)]
pub struct MemoryPollStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    polls: HashMap<Uuid, PollEntity>,
    votes: HashMap<(Uuid, String), VoteEntity>,
}

impl MemoryPollStore {
    /// Insert a poll directly, bypassing lifecycle checks. Test seam for
    /// constructing already-expired or already-ended polls.
    pub async fn seed_poll(&self, poll: PollEntity) {
        let mut inner = self.inner.lock().await;
        inner.polls.insert(poll.id, poll);
    }

    /// Number of stored vote records referencing `option_id`.
    pub async fn votes_for_option(&self, option_id: Uuid) -> usize {
        let inner = self.inner.lock().await;
        inner
            .votes
            .values()
            .filter(|vote| vote.option_id == option_id)
            .count()
    }
}

impl PollStore for MemoryPollStore {
    fn insert_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            inner.polls.insert(poll.id, poll);
            Ok(())
        })
    }

    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().await;
            Ok(inner.polls.get(&id).cloned())
        })
    }

    fn find_active_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().await;
            Ok(inner.polls.values().find(|poll| poll.is_active).cloned())
        })
    }

    fn list_ended_polls(&self) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().await;
            let mut polls: Vec<PollEntity> = inner
                .polls
                .values()
                .filter(|poll| !poll.is_active)
                .cloned()
                .collect();
            polls.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
            Ok(polls)
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            let key = (vote.poll_id, vote.student_id.clone());
            if inner.votes.contains_key(&key) {
                return Err(StorageError::duplicate(format!(
                    "student `{}` already voted in poll `{}`",
                    vote.student_id, vote.poll_id
                )));
            }
            inner.votes.insert(key, vote);
            Ok(())
        })
    }

    fn has_voted(
        &self,
        poll_id: Uuid,
        student_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().await;
            Ok(inner.votes.contains_key(&(poll_id, student_id)))
        })
    }

    fn increment_tally(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            let Some(poll) = inner.polls.get_mut(&poll_id) else {
                return Ok(None);
            };
            let Some(option) = poll.options.iter_mut().find(|option| option.id == option_id)
            else {
                return Ok(None);
            };
            option.votes += 1;
            Ok(Some(poll.clone()))
        })
    }

    fn deactivate_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            match inner.polls.get_mut(&id) {
                Some(poll) if poll.is_active => {
                    poll.is_active = false;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_poll(started_at_ms: u64, is_active: bool) -> PollEntity {
        let mut poll = PollEntity::start(
            "Favourite crate?".into(),
            vec!["serde".into(), "tokio".into()],
            60,
            started_at_ms,
        );
        poll.is_active = is_active;
        poll
    }

    #[tokio::test]
    async fn second_vote_for_same_pair_is_rejected() {
        let store = MemoryPollStore::default();
        let poll = sample_poll(0, true);
        let option_id = poll.options[0].id;
        store.seed_poll(poll.clone()).await;

        let vote = VoteEntity {
            poll_id: poll.id,
            student_id: "s1".into(),
            option_id,
        };
        store.insert_vote(vote.clone()).await.unwrap();
        let err = store.insert_vote(vote).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { .. }));

        // Same student, different poll id: allowed.
        let other = VoteEntity {
            poll_id: Uuid::new_v4(),
            student_id: "s1".into(),
            option_id,
        };
        store.insert_vote(other).await.unwrap();
    }

    #[tokio::test]
    async fn deactivate_flips_exactly_once() {
        let store = MemoryPollStore::default();
        let poll = sample_poll(0, true);
        store.seed_poll(poll.clone()).await;

        assert!(store.deactivate_poll(poll.id).await.unwrap());
        assert!(!store.deactivate_poll(poll.id).await.unwrap());
        assert!(!store.deactivate_poll(Uuid::new_v4()).await.unwrap());

        let stored = store.find_poll(poll.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn ended_polls_are_listed_newest_first() {
        let store = MemoryPollStore::default();
        store.seed_poll(sample_poll(1_000, false)).await;
        store.seed_poll(sample_poll(3_000, false)).await;
        store.seed_poll(sample_poll(2_000, true)).await;

        let ended = store.list_ended_polls().await.unwrap();
        let starts: Vec<u64> = ended.iter().map(|poll| poll.started_at_ms).collect();
        assert_eq!(starts, vec![3_000, 1_000]);
    }

    #[tokio::test]
    async fn increment_tally_targets_one_option() {
        let store = MemoryPollStore::default();
        let poll = sample_poll(0, true);
        let first = poll.options[0].id;
        store.seed_poll(poll.clone()).await;

        let updated = store.increment_tally(poll.id, first).await.unwrap().unwrap();
        assert_eq!(updated.options[0].votes, 1);
        assert_eq!(updated.options[1].votes, 0);

        assert!(
            store
                .increment_tally(poll.id, Uuid::new_v4())
                .await
                .unwrap()
                .is_none()
        );
    }
}
