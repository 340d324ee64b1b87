use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One selectable answer inside a poll, with its running tally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOptionEntity {
    /// Identifier scoped to the owning poll.
    pub id: Uuid,
    /// Text shown to students.
    pub text: String,
    /// Number of accepted votes for this option.
    pub votes: u32,
}

/// Aggregate poll entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollEntity {
    /// Primary key of the poll.
    pub id: Uuid,
    /// Question asked by the teacher.
    pub question: String,
    /// Ordered options with embedded tallies; membership never changes after creation.
    pub options: Vec<PollOptionEntity>,
    /// Server timestamp (epoch milliseconds) at creation.
    pub started_at_ms: u64,
    /// Configured poll length in seconds.
    pub duration_secs: u32,
    /// `started_at_ms + duration_secs * 1000`, fixed at creation.
    pub ends_at_ms: u64,
    /// At most one poll in the whole store carries `true`.
    pub is_active: bool,
}

impl PollEntity {
    /// Build a fresh active poll starting now, with zeroed tallies and fresh option ids.
    pub fn start(question: String, option_texts: Vec<String>, duration_secs: u32, now_ms: u64) -> Self {
        let options = option_texts
            .into_iter()
            .map(|text| PollOptionEntity {
                id: Uuid::new_v4(),
                text,
                votes: 0,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            question,
            options,
            started_at_ms: now_ms,
            duration_secs,
            ends_at_ms: now_ms + u64::from(duration_secs) * 1000,
            is_active: true,
        }
    }

    /// Whole seconds left before the poll expires, clamped at zero.
    pub fn remaining_seconds(&self, now_ms: u64) -> u64 {
        let elapsed_secs = now_ms.saturating_sub(self.started_at_ms) / 1000;
        u64::from(self.duration_secs).saturating_sub(elapsed_secs)
    }

    /// Whether the poll has run out of time at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.remaining_seconds(now_ms) == 0
    }

    /// Whether `option_id` belongs to this poll.
    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

/// Immutable vote record; uniqueness on `(poll_id, student_id)` is the
/// double-vote guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Poll the vote belongs to.
    pub poll_id: Uuid,
    /// Client-generated stable student identifier.
    pub student_id: String,
    /// Chosen option; must reference an option of `poll_id`.
    pub option_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_started_at(started_at_ms: u64, duration_secs: u32) -> PollEntity {
        let mut poll = PollEntity::start(
            "Pick one".into(),
            vec!["A".into(), "B".into()],
            duration_secs,
            started_at_ms,
        );
        poll.is_active = true;
        poll
    }

    #[test]
    fn fresh_poll_has_zeroed_tallies_and_distinct_option_ids() {
        let poll = poll_started_at(1_000_000, 30);
        assert_eq!(poll.options.len(), 2);
        assert!(poll.options.iter().all(|option| option.votes == 0));
        assert_ne!(poll.options[0].id, poll.options[1].id);
        assert_eq!(poll.ends_at_ms, 1_000_000 + 30_000);
        assert!(poll.is_active);
    }

    #[test]
    fn remaining_seconds_counts_down_and_clamps_at_zero() {
        let poll = poll_started_at(1_000_000, 5);

        assert_eq!(poll.remaining_seconds(1_000_000), 5);
        assert_eq!(poll.remaining_seconds(1_000_999), 5);
        assert_eq!(poll.remaining_seconds(1_001_000), 4);
        assert_eq!(poll.remaining_seconds(1_004_999), 1);
        assert_eq!(poll.remaining_seconds(1_005_000), 0);
        // Long past the end: still zero, never negative.
        assert_eq!(poll.remaining_seconds(2_000_000), 0);
    }

    #[test]
    fn remaining_seconds_is_monotonically_non_increasing() {
        let poll = poll_started_at(0, 10);
        let mut previous = u64::MAX;
        for now_ms in (0..12_000).step_by(250) {
            let remaining = poll.remaining_seconds(now_ms);
            assert!(remaining <= previous, "remaining time went up at {now_ms}ms");
            previous = remaining;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn clock_before_start_is_treated_as_no_elapsed_time() {
        let poll = poll_started_at(5_000, 7);
        assert_eq!(poll.remaining_seconds(1_000), 7);
        assert!(!poll.is_due(1_000));
    }

    #[test]
    fn option_membership_lookup() {
        let poll = poll_started_at(0, 5);
        assert!(poll.has_option(poll.options[0].id));
        assert!(!poll.has_option(Uuid::new_v4()));
    }
}
