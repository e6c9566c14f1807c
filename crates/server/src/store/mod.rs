// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

//! The record table: a key-value store with a single partition key.

mod filesystem;
mod memory;

pub use filesystem::*;
pub use memory::*;

use std::fmt::{self, Debug};

use gatehouse_type::{Record, RecordId};

use async_trait::async_trait;

/// Largest serialized item the table accepts.
pub const MAX_ITEM_SIZE: usize = 400 * 1024;

#[derive(Debug)]
pub enum Error {
    ItemTooLarge { size: usize },
    Internal(anyhow::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ItemTooLarge { size } => write!(
                f,
                "Item size of {size} bytes has exceeded the maximum allowed size of {MAX_ITEM_SIZE} bytes"
            ),
            Error::Internal(e) => write!(f, "Storage backend failure: {e:#}"),
        }
    }
}

impl std::error::Error for Error {}

/// Serializes `record`, rejecting items over [`MAX_ITEM_SIZE`].
pub(crate) fn encode(record: &Record) -> Result<Vec<u8>, Error> {
    let buf = serde_json::to_vec(record)
        .map_err(|e| Error::Internal(anyhow::Error::new(e).context("failed to encode record")))?;
    if buf.len() > MAX_ITEM_SIZE {
        return Err(Error::ItemTooLarge { size: buf.len() });
    }
    Ok(buf)
}

/// Point operations on the record table.
///
/// Every operation acts on at most one item and is atomic with respect to
/// other operations on the same item. Concurrent writers to one key race,
/// and the last write wins.
#[async_trait]
pub trait Table: Send + Sync + Debug {
    /// Returns the item keyed by `id`, if any.
    async fn get(&self, id: &RecordId) -> Result<Option<Record>, Error>;

    /// Writes `record`, replacing any item with the same key, and returns
    /// the written item.
    async fn put(&self, record: Record) -> Result<Record, Error>;

    /// Removes the item keyed by `id` and returns it, if there was one.
    async fn delete(&self, id: &RecordId) -> Result<Option<Record>, Error>;

    /// Returns every item in the table in no particular order.
    async fn scan(&self) -> Result<Vec<Record>, Error>;

    /// Irrecoverably removes the table and all of its data.
    async fn destroy(&self) -> Result<(), Error>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use serde_json::{json, Map, Value};

    pub(crate) fn record(id: &str, fields: Value) -> Record {
        Record {
            id: id.parse().unwrap(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Exercises the behavior every [Table] implementation must share.
    pub(crate) async fn conformance(table: &dyn Table) {
        let a: RecordId = "a".parse().unwrap();
        let b: RecordId = "b".parse().unwrap();

        assert!(table.get(&a).await.unwrap().is_none());
        assert!(table.delete(&a).await.unwrap().is_none());
        assert!(table.scan().await.unwrap().is_empty());

        let first = record("a", json!({"name": "milk"}));
        assert_eq!(table.put(first.clone()).await.unwrap(), first);
        assert_eq!(table.get(&a).await.unwrap(), Some(first));

        let second = record("a", json!({"name": "eggs", "done": true}));
        assert_eq!(table.put(second.clone()).await.unwrap(), second);
        assert_eq!(table.get(&a).await.unwrap(), Some(second.clone()));

        let other = record("b", json!({}));
        _ = table.put(other.clone()).await.unwrap();
        let mut all = table.scan().await.unwrap();
        all.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(all, vec![second.clone(), other]);

        assert_eq!(table.delete(&a).await.unwrap(), Some(second));
        assert!(table.get(&a).await.unwrap().is_none());
        assert!(table.get(&b).await.unwrap().is_some());

        let mut fields = Map::new();
        _ = fields.insert("blob".into(), Value::String("x".repeat(MAX_ITEM_SIZE)));
        assert!(matches!(
            table.put(Record { id: a.clone(), fields }).await,
            Err(Error::ItemTooLarge { .. })
        ));
        assert!(table.get(&a).await.unwrap().is_none());

        let odd = record("../weird/ id", json!({"n": 1}));
        _ = table.put(odd.clone()).await.unwrap();
        assert_eq!(table.get(&odd.id).await.unwrap(), Some(odd.clone()));

        table.destroy().await.unwrap();
        assert!(table.scan().await.unwrap().is_empty());
        assert!(table.get(&odd.id).await.unwrap().is_none());

        // A destroyed table starts over empty.
        _ = table.put(odd.clone()).await.unwrap();
        assert_eq!(table.scan().await.unwrap(), vec![odd]);
        table.destroy().await.unwrap();
    }
}
