use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::model::mongodb::{Coll, Id};

/// Fetch a document by ID, or fail with 404 naming it as `what`.
pub async fn find_by_id<T>(coll: &Coll<T>, id: Id, what: &str) -> Result<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    coll.find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("{what} {id}")))
}

/// Fetch every matching document in creation order.
pub async fn find_in_order<T>(coll: &Coll<T>, filter: impl Into<Option<Document>>) -> Result<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let oldest_first = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let docs = coll.find(filter, oldest_first).await?.try_collect().await?;
    Ok(docs)
}

/// Refuse to delete `what` while any dependants exist. Each dependant is a count with singular
/// and plural nouns, e.g. `(3, "vote", "votes")`.
pub fn ensure_no_dependants(what: &str, dependants: &[(u64, &str, &str)]) -> Result<()> {
    let blocking: Vec<String> = dependants
        .iter()
        .filter(|(count, _, _)| *count > 0)
        .map(|(count, singular, plural)| {
            format!("{count} {}", if *count == 1 { singular } else { plural })
        })
        .collect();
    if blocking.is_empty() {
        Ok(())
    } else {
        Err(Error::conflict(format!(
            "Cannot delete {what}: it still has {}",
            blocking.join(" and ")
        )))
    }
}
