// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use super::{encode, Error, Table};

use std::collections::HashMap;

use gatehouse_type::{Record, RecordId};

use async_std::sync::RwLock;
use async_trait::async_trait;
use tracing::trace;

/// An in-memory [Table].
#[derive(Debug, Default)]
pub struct Memory(RwLock<HashMap<RecordId, Record>>);

#[async_trait]
impl Table for Memory {
    async fn get(&self, id: &RecordId) -> Result<Option<Record>, Error> {
        Ok(self.0.read().await.get(id).cloned())
    }

    async fn put(&self, record: Record) -> Result<Record, Error> {
        _ = encode(&record)?;
        trace!(target: "app::store::Memory::put", "put item `{}`", record.id);
        _ = self
            .0
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &RecordId) -> Result<Option<Record>, Error> {
        trace!(target: "app::store::Memory::delete", "delete item `{id}`");
        Ok(self.0.write().await.remove(id))
    }

    async fn scan(&self) -> Result<Vec<Record>, Error> {
        Ok(self.0.read().await.values().cloned().collect())
    }

    async fn destroy(&self) -> Result<(), Error> {
        self.0.write().await.clear();
        Ok(())
    }
}
