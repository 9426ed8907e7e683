use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, from_document, serde_helpers::chrono_datetime_as_bson_datetime};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{Coll, Id};

/// Core vote data. Votes are never modified once cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: Id,
    pub election_id: Id,
    pub position_id: Id,
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}

/// Vote counts keyed by `(position_id, candidate_id)`.
pub type VoteCounts = HashMap<(Id, Id), u64>;

#[derive(Deserialize)]
struct VoteCountKey {
    position_id: Id,
    candidate_id: Id,
}

#[derive(Deserialize)]
struct VoteCountRow {
    #[serde(rename = "_id")]
    key: VoteCountKey,
    count: u64,
}

/// Count the votes cast in an election, grouped by position and candidate.
/// Candidates with no votes are absent from the result.
pub async fn count_votes(votes: &Coll<Vote>, election_id: Id) -> Result<VoteCounts> {
    let pipeline = vec![
        doc! {
            "$match": { "election_id": election_id },
        },
        doc! {
            "$group": {
                "_id": { "position_id": "$position_id", "candidate_id": "$candidate_id" },
                "count": { "$sum": 1 },
            },
        },
    ];

    let mut cursor = votes.aggregate(pipeline, None).await?;
    let mut counts = VoteCounts::new();
    while let Some(row) = cursor.try_next().await? {
        let row: VoteCountRow = from_document(row)?;
        counts.insert((row.key.position_id, row.key.candidate_id), row.count);
    }
    Ok(counts)
}
