/// In-memory backend used by tests and storage-less builds.
pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB backend.
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{PollEntity, VoteEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for polls and votes.
pub trait PollStore: Send + Sync {
    /// Persist a freshly created poll.
    fn insert_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a poll by id.
    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;
    /// Load the poll currently flagged active, if any.
    fn find_active_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;
    /// All ended polls, most recently started first.
    fn list_ended_polls(&self) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>>;
    /// Record a vote; fails with [`StorageError::Duplicate`] when the
    /// `(poll_id, student_id)` pair already voted.
    ///
    /// [`StorageError::Duplicate`]: crate::dao::storage::StorageError::Duplicate
    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether a vote exists for the given poll and student.
    fn has_voted(
        &self,
        poll_id: Uuid,
        student_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Atomically bump the tally of one option, returning the updated poll.
    /// `None` when the poll or option does not exist.
    fn increment_tally(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;
    /// Conditionally flip `is_active` from `true` to `false`. Returns `true`
    /// only for the caller whose write performed the flip, making the
    /// expiry transition idempotent across racing triggers.
    fn deactivate_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the underlying connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
