//! Local fallback store: JSON arrays in a key/value area.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;

use super::{
    document_id, ChangeFeed, Collection, Document, DocumentStore, FileArea, KeyValueArea,
    MemoryArea, SnapshotStream,
};
use crate::error::StoreResult;

/// Same-device store. Every mutation rewrites the whole collection array
/// (last write wins) and then notifies the collection's feed.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<LocalInner>,
}

struct LocalInner {
    area: Arc<dyn KeyValueArea>,
    feed: ChangeFeed,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(area: Arc<dyn KeyValueArea>) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                area,
                feed: ChangeFeed::new(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// File-backed store rooted at `dir`.
    pub fn open_dir(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(FileArea::open(dir)?)))
    }

    /// Ephemeral store (primarily for tests).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryArea::new()))
    }

    /// The underlying area, shared with other same-device state.
    pub fn area(&self) -> Arc<dyn KeyValueArea> {
        Arc::clone(&self.inner.area)
    }

    /// Full collection array; empty when the key is absent.
    pub fn read(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        match self.inner.area.get_item(collection.storage_key())? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Overwrite the whole collection array.
    pub fn write_all(&self, collection: Collection, documents: &[Document]) -> StoreResult<()> {
        let raw = serde_json::to_string(documents)?;
        self.inner.area.set_item(collection.storage_key(), &raw)
    }

    /// Wake every watcher of `collection`.
    pub fn notify(&self, collection: Collection) {
        self.inner.feed.notify(collection);
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        self.read(collection)
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        Ok(self
            .read(collection)?
            .into_iter()
            .find(|document| document_id(document) == Some(id)))
    }

    async fn put(&self, collection: Collection, id: &str, document: Document) -> StoreResult<()> {
        {
            let _guard = self.inner.write_lock.lock().await;
            let mut documents = self.read(collection)?;
            match documents
                .iter()
                .position(|existing| document_id(existing) == Some(id))
            {
                Some(index) => documents[index] = document,
                None => documents.push(document),
            }
            self.write_all(collection, &documents)?;
        }
        tracing::debug!(collection = collection.name(), id, "Saved document locally");
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        {
            let _guard = self.inner.write_lock.lock().await;
            let mut documents = self.read(collection)?;
            let before = documents.len();
            documents.retain(|existing| document_id(existing) != Some(id));
            if documents.len() == before {
                tracing::debug!(collection = collection.name(), id, "Nothing to delete locally");
                return Ok(());
            }
            self.write_all(collection, &documents)?;
        }
        tracing::debug!(collection = collection.name(), id, "Deleted document locally");
        self.notify(collection);
        Ok(())
    }

    async fn watch(&self, collection: Collection) -> StoreResult<SnapshotStream> {
        // Subscribe before the first read so no write can slip in between.
        let mut changes = self.inner.feed.subscribe(collection);
        let store = self.clone();
        Ok(SnapshotStream::spawn(move |sender| async move {
            if sender.send(store.read(collection)).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(()) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Local watcher lagged, re-reading collection");
                    }
                    Err(RecvError::Closed) => break,
                }
                if sender.send(store.read(collection)).await.is_err() {
                    break;
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn put_replaces_by_id_or_appends() {
        let store = LocalStore::in_memory();
        store
            .put(Collection::Records, "a", json!({ "id": "a", "v": 1 }))
            .await
            .unwrap();
        store
            .put(Collection::Records, "b", json!({ "id": "b", "v": 1 }))
            .await
            .unwrap();
        store
            .put(Collection::Records, "a", json!({ "id": "a", "v": 2 }))
            .await
            .unwrap();

        assert_eq!(
            store.read(Collection::Records).unwrap(),
            vec![json!({ "id": "a", "v": 2 }), json!({ "id": "b", "v": 1 })]
        );
        assert_eq!(
            store.get(Collection::Records, "b").await.unwrap(),
            Some(json!({ "id": "b", "v": 1 }))
        );
        assert!(store.read(Collection::Users).unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_unknown_id_does_not_write_or_notify() {
        let store = LocalStore::in_memory();
        let mut changes = store.inner.feed.subscribe(Collection::Records);

        store.delete(Collection::Records, "missing").await.unwrap();

        assert_eq!(store.area().get_item("app_records").unwrap(), None);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_array_is_reported() {
        let area = Arc::new(MemoryArea::new());
        area.set_item("app_users", "{not json").unwrap();
        let store = LocalStore::new(area);
        assert!(store.list(Collection::Users).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_failures_propagate() {
        let area = Arc::new(MemoryArea::new());
        let store = LocalStore::new(area.clone());
        area.deny_writes(true);

        let result = store
            .put(Collection::Users, "u", json!({ "id": "u" }))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watch_emits_current_state_then_changes() {
        let store = LocalStore::in_memory();
        store
            .put(Collection::Users, "a", json!({ "id": "a" }))
            .await
            .unwrap();

        let mut stream = store.watch(Collection::Users).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 1);

        store
            .put(Collection::Users, "b", json!({ "id": "b" }))
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_backed_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open_dir(dir.path()).unwrap();
        store
            .put(Collection::Records, "OLP-1", json!({ "id": "OLP-1" }))
            .await
            .unwrap();

        let reopened = LocalStore::open_dir(dir.path()).unwrap();
        assert_eq!(
            reopened.read(Collection::Records).unwrap(),
            vec![json!({ "id": "OLP-1" })]
        );
    }
}
