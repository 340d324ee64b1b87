use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPollDocument, MongoVoteDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    models::{PollEntity, VoteEntity},
    poll_store::PollStore,
    storage::StorageResult,
};

const POLL_COLLECTION_NAME: &str = "polls";
const VOTE_COLLECTION_NAME: &str = "votes";

#[derive(Clone)]
pub struct MongoPollStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPollStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let poll_collection = database.collection::<MongoPollDocument>(POLL_COLLECTION_NAME);
        let poll_index = mongodb::IndexModel::builder()
            .keys(doc! {"is_active": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("poll_active_idx".to_owned()))
                    .build(),
            )
            .build();

        poll_collection
            .create_index(poll_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: POLL_COLLECTION_NAME,
                index: "is_active",
                source,
            })?;

        // The unique compound index is the double-vote arbiter; every other
        // guard in the service layer is defense in depth on top of it.
        let vote_collection = database.collection::<MongoVoteDocument>(VOTE_COLLECTION_NAME);
        let vote_index = mongodb::IndexModel::builder()
            .keys(doc! {"poll_id": 1, "student_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("vote_poll_student_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        vote_collection
            .create_index(vote_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: VOTE_COLLECTION_NAME,
                index: "poll_id,student_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn poll_collection(&self) -> Collection<MongoPollDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPollDocument>(POLL_COLLECTION_NAME)
    }

    async fn vote_collection(&self) -> Collection<MongoVoteDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoVoteDocument>(VOTE_COLLECTION_NAME)
    }

    async fn insert_poll(&self, poll: PollEntity) -> MongoResult<()> {
        let id = poll.id;
        let document: MongoPollDocument = poll.into();
        let collection = self.poll_collection().await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SavePoll { id, source })?;
        Ok(())
    }

    async fn find_poll(&self, id: Uuid) -> MongoResult<Option<PollEntity>> {
        let collection = self.poll_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadPoll { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_active_poll(&self) -> MongoResult<Option<PollEntity>> {
        let collection = self.poll_collection().await;
        let document = collection
            .find_one(doc! {"is_active": true})
            .await
            .map_err(|source| MongoDaoError::FindActivePoll { source })?;
        Ok(document.map(Into::into))
    }

    async fn list_ended_polls(&self) -> MongoResult<Vec<PollEntity>> {
        let collection = self.poll_collection().await;
        let documents: Vec<MongoPollDocument> = collection
            .find(doc! {"is_active": false})
            .sort(doc! {"started_at": -1})
            .await
            .map_err(|source| MongoDaoError::ListPolls { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPolls { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_vote(&self, vote: VoteEntity) -> MongoResult<()> {
        let poll_id = vote.poll_id;
        let student_id = vote.student_id.clone();
        let document: MongoVoteDocument = vote.into();
        let collection = self.vote_collection().await;

        collection.insert_one(&document).await.map_err(|source| {
            if is_duplicate_key(&source) {
                MongoDaoError::DuplicateVote {
                    poll_id,
                    student_id: student_id.clone(),
                }
            } else {
                MongoDaoError::SaveVote { poll_id, source }
            }
        })?;
        Ok(())
    }

    async fn has_voted(&self, poll_id: Uuid, student_id: &str) -> MongoResult<bool> {
        let collection = self.vote_collection().await;
        let document = collection
            .find_one(doc! {
                "poll_id": uuid_as_binary(poll_id),
                "student_id": student_id,
            })
            .await
            .map_err(|source| MongoDaoError::LookupVote { poll_id, source })?;
        Ok(document.is_some())
    }

    async fn increment_tally(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
    ) -> MongoResult<Option<PollEntity>> {
        let collection = self.poll_collection().await;
        let document = collection
            .find_one_and_update(
                doc! {
                    "_id": uuid_as_binary(poll_id),
                    "options.id": uuid_as_binary(option_id),
                },
                doc! {"$inc": {"options.$.votes": 1}},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateTally {
                id: poll_id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn deactivate_poll(&self, id: Uuid) -> MongoResult<bool> {
        let collection = self.poll_collection().await;
        // Filtering on `is_active` makes the flip conditional: racing expiry
        // triggers resolve in the database, only one write matches.
        let result = collection
            .update_one(
                doc! {"_id": uuid_as_binary(id), "is_active": true},
                doc! {"$set": {"is_active": false}},
            )
            .await
            .map_err(|source| MongoDaoError::EndPoll { id, source })?;
        Ok(result.modified_count > 0)
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == 11000
    )
}

impl PollStore for MongoPollStore {
    fn insert_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_poll(poll).await.map_err(Into::into) })
    }

    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_poll(id).await.map_err(Into::into) })
    }

    fn find_active_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_active_poll().await.map_err(Into::into) })
    }

    fn list_ended_polls(&self) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_ended_polls().await.map_err(Into::into) })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_vote(vote).await.map_err(Into::into) })
    }

    fn has_voted(
        &self,
        poll_id: Uuid,
        student_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .has_voted(poll_id, &student_id)
                .await
                .map_err(Into::into)
        })
    }

    fn increment_tally(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .increment_tally(poll_id, option_id)
                .await
                .map_err(Into::into)
        })
    }

    fn deactivate_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.deactivate_poll(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
