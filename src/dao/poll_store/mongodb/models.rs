use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{PollEntity, PollOptionEntity, VoteEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPollDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    question: String,
    options: Vec<PollOptionEntity>,
    started_at: DateTime,
    duration_secs: u32,
    ends_at: DateTime,
    is_active: bool,
}

impl From<PollEntity> for MongoPollDocument {
    fn from(value: PollEntity) -> Self {
        Self {
            id: value.id,
            question: value.question,
            options: value.options,
            started_at: DateTime::from_millis(value.started_at_ms as i64),
            duration_secs: value.duration_secs,
            ends_at: DateTime::from_millis(value.ends_at_ms as i64),
            is_active: value.is_active,
        }
    }
}

impl From<MongoPollDocument> for PollEntity {
    fn from(value: MongoPollDocument) -> Self {
        Self {
            id: value.id,
            question: value.question,
            options: value.options,
            started_at_ms: value.started_at.timestamp_millis().max(0) as u64,
            duration_secs: value.duration_secs,
            ends_at_ms: value.ends_at.timestamp_millis().max(0) as u64,
            is_active: value.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    pub poll_id: Uuid,
    pub student_id: String,
    pub option_id: Uuid,
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            poll_id: value.poll_id,
            student_id: value.student_id,
            option_id: value.option_id,
        }
    }
}

impl From<MongoVoteDocument> for VoteEntity {
    fn from(value: MongoVoteDocument) -> Self {
        Self {
            poll_id: value.poll_id,
            student_id: value.student_id,
            option_id: value.option_id,
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
