use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save poll `{id}`")]
    SavePoll {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load poll `{id}`")]
    LoadPoll {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to look up the active poll")]
    FindActivePoll {
        #[source]
        source: MongoError,
    },
    #[error("failed to list ended polls")]
    ListPolls {
        #[source]
        source: MongoError,
    },
    #[error("student `{student_id}` already voted in poll `{poll_id}`")]
    DuplicateVote { poll_id: Uuid, student_id: String },
    #[error("failed to save vote for poll `{poll_id}`")]
    SaveVote {
        poll_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to look up vote for poll `{poll_id}`")]
    LookupVote {
        poll_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update tally for poll `{id}`")]
    UpdateTally {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to end poll `{id}`")]
    EndPoll {
        id: Uuid,
        #[source]
        source: MongoError,
    },
}
