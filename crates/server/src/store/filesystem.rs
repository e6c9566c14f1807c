// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use super::{encode, Error, Table};

use std::io;
use std::path::Path;

use gatehouse_type::{Record, RecordId};

use anyhow::Context as _;
use async_std::fs::{self, File};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use camino::{Utf8Path, Utf8PathBuf};
use cap_async_std::fs_utf8::Dir;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

const RECORDS: &str = "records";
const SUFFIX: &str = ".json";

fn internal(e: io::Error, context: &'static str) -> Error {
    Error::Internal(anyhow::Error::new(e).context(context))
}

/// A [Table] keeping one JSON document per item in a directory.
#[derive(Debug)]
pub struct Filesystem {
    root: Dir,
}

async fn upsert_dir(root: &Dir, path: impl AsRef<Utf8Path>) -> io::Result<()> {
    let path = path.as_ref();
    if !root.is_dir(path).await {
        root.create_dir(path)
    } else {
        Ok(())
    }
}

impl Filesystem {
    /// Opens the table rooted at `path`, creating it if necessary.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("failed to create store at `{}`", path.display()))?;
        let store = Self::open_existing(path).await?;
        upsert_dir(&store.root, RECORDS)
            .await
            .context("failed to create records directory")?;
        Ok(store)
    }

    /// Opens the table rooted at `path`, failing if `path` does not exist.
    pub async fn open_existing(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open store at `{}`", path.display()))?;
        Ok(Self {
            root: Dir::from_std_file(file),
        })
    }

    fn item_path(id: &RecordId) -> Utf8PathBuf {
        let name = URL_SAFE_NO_PAD.encode(id.as_str());
        Utf8Path::new(RECORDS).join(format!("{name}{SUFFIX}"))
    }

    /// A unique sibling of `path` which [Table::scan] skips.
    fn tmp_path(path: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{path}.{:016x}.tmp", rand::random::<u64>()))
    }

    /// Atomically replaces the file at `path` with `buf`.
    async fn replace(&self, path: &Utf8Path, buf: &[u8]) -> io::Result<()> {
        let tmp = Self::tmp_path(path);
        self.root.write(&tmp, buf).await?;
        if let Err(e) = self.root.rename(&tmp, &self.root, path).await {
            _ = self.root.remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    async fn read(&self, path: &Utf8Path) -> Result<Option<Record>, Error> {
        match self.root.read(path).await {
            Ok(buf) => serde_json::from_slice(&buf)
                .with_context(|| format!("failed to decode item at `{path}`"))
                .map(Some)
                .map_err(Error::Internal),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(internal(e, "failed to read item")),
        }
    }

    /// Reads a JSON document stored next to the records, if present.
    pub async fn load_json<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<Option<T>> {
        match self.root.read(name).await {
            Ok(buf) => serde_json::from_slice(&buf)
                .with_context(|| format!("failed to decode `{name}`"))
                .map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context(format!("failed to read `{name}`"))),
        }
    }

    /// Atomically writes a JSON document next to the records.
    pub async fn save_json(&self, name: &str, val: &impl Serialize) -> anyhow::Result<()> {
        let buf = serde_json::to_vec_pretty(val).context("failed to encode value to JSON")?;
        self.replace(Utf8Path::new(name), &buf)
            .await
            .with_context(|| format!("failed to write `{name}`"))
    }

    /// Removes a JSON document stored next to the records.
    pub async fn remove_json(&self, name: &str) -> anyhow::Result<()> {
        match self.root.remove_file(name).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(anyhow::Error::new(e).context(format!("failed to remove `{name}`")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Table for Filesystem {
    async fn get(&self, id: &RecordId) -> Result<Option<Record>, Error> {
        self.read(&Self::item_path(id)).await
    }

    async fn put(&self, record: Record) -> Result<Record, Error> {
        let buf = encode(&record)?;
        let path = Self::item_path(&record.id);
        trace!(target: "app::store::Filesystem::put", "put item `{}` at `{path}`", record.id);
        self.replace(&path, &buf).await.map_err(|e| {
            debug!(target: "app::store::Filesystem::put", "failed to write item: `{:?}`", e);
            internal(e, "failed to write item")
        })?;
        Ok(record)
    }

    async fn delete(&self, id: &RecordId) -> Result<Option<Record>, Error> {
        let path = Self::item_path(id);
        trace!(target: "app::store::Filesystem::delete", "delete item `{id}` at `{path}`");

        // Moving the item aside claims it. A put racing with us lands as a new
        // item and a racing delete finds nothing.
        let claimed = Self::tmp_path(&path);
        match self.root.rename(&path, &self.root, &claimed).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(internal(e, "failed to remove item")),
        }
        let record = self.read(&claimed).await;
        self.root
            .remove_file(&claimed)
            .await
            .map_err(|e| internal(e, "failed to remove item"))?;
        record
    }

    async fn scan(&self) -> Result<Vec<Record>, Error> {
        let mut entries = self
            .root
            .read_dir(RECORDS)
            .await
            .map_err(|e| internal(e, "failed to read records directory"))?;
        let mut records = vec![];
        while let Some(entry) = entries.next() {
            let name = entry
                .and_then(|entry| entry.file_name())
                .map_err(|e| internal(e, "failed to read directory entry"))?;
            if !name.ends_with(SUFFIX) {
                continue;
            }
            if let Some(record) = self.read(&Utf8Path::new(RECORDS).join(name)).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn destroy(&self) -> Result<(), Error> {
        debug!(target: "app::store::Filesystem::destroy", "removing all records");
        match self.root.remove_dir_all(RECORDS).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(internal(e, "failed to remove records directory"))
            }
            _ => {}
        }
        upsert_dir(&self.root, RECORDS)
            .await
            .map_err(|e| internal(e, "failed to create records directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{conformance, record};
    use super::*;

    use futures::future::join_all;
    use serde_json::json;

    #[async_std::test]
    async fn filesystem() {
        let dir = tempfile::tempdir().unwrap();
        conformance(&Filesystem::open(dir.path()).await.unwrap()).await;
    }

    #[async_std::test]
    async fn persistence() {
        let dir = tempfile::tempdir().unwrap();
        let rec = record("persisted", json!({"name": "milk"}));
        {
            let table = Filesystem::open(dir.path()).await.unwrap();
            _ = table.put(rec.clone()).await.unwrap();
        }
        let table = Filesystem::open(dir.path()).await.unwrap();
        assert_eq!(table.get(&rec.id).await.unwrap(), Some(rec.clone()));
        assert_eq!(table.scan().await.unwrap(), vec![rec]);
    }

    #[async_std::test]
    async fn json_documents() {
        let dir = tempfile::tempdir().unwrap();
        let table = Filesystem::open(dir.path()).await.unwrap();
        assert_eq!(table.load_json::<u32>("doc.json").await.unwrap(), None);
        table.save_json("doc.json", &42u32).await.unwrap();
        assert_eq!(table.load_json::<u32>("doc.json").await.unwrap(), Some(42));
        table.remove_json("doc.json").await.unwrap();
        table.remove_json("doc.json").await.unwrap();
        assert_eq!(table.load_json::<u32>("doc.json").await.unwrap(), None);

        // Documents never show up as items
        assert!(table.scan().await.unwrap().is_empty());
    }

    #[async_std::test]
    async fn destroy() {
        let dir = tempfile::tempdir().unwrap();
        let table = Filesystem::open(dir.path()).await.unwrap();
        let rec = record("a", json!({}));
        _ = table.put(rec.clone()).await.unwrap();
        table.destroy().await.unwrap();
        assert!(table.get(&rec.id).await.unwrap().is_none());
        assert_eq!(
            std::fs::read_dir(dir.path().join(RECORDS)).unwrap().count(),
            0
        );

        // The table stays usable after teardown.
        _ = table.put(rec.clone()).await.unwrap();
        assert_eq!(table.scan().await.unwrap(), vec![rec]);
    }

    #[async_std::test]
    async fn open_existing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(Filesystem::open_existing(&missing).await.is_err());
        assert!(!missing.exists());

        _ = Filesystem::open(&missing).await.unwrap();
        assert!(Filesystem::open_existing(&missing).await.is_ok());
    }

    #[async_std::test]
    async fn concurrent_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let table = Filesystem::open(dir.path()).await.unwrap();
        let rec = record("contended", json!({"name": "milk"}));
        _ = table.put(rec.clone()).await.unwrap();

        let deleted = join_all((0..8).map(|_| table.delete(&rec.id))).await;
        let deleted: Vec<_> = deleted.into_iter().filter_map(Result::unwrap).collect();
        assert_eq!(deleted, vec![rec.clone()]);

        // Nothing is left behind, not even claimed files.
        assert!(table.scan().await.unwrap().is_empty());
        assert_eq!(
            std::fs::read_dir(dir.path().join(RECORDS)).unwrap().count(),
            0
        );
    }
}
