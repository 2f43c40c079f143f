//! # Storage Layer
//!
//! Both backends implement [`DocumentStore`] over schemaless JSON documents,
//! so the persistence façade can swap them per call:
//!
//! - [`FirestoreStore`]: remote document database over REST.
//! - [`MemoryRemoteStore`]: push-based in-process remote with failure
//!   injection and call counters.
//! - [`LocalStore`]: same-device fallback. Each collection is one JSON array
//!   stored under a fixed key of a [`KeyValueArea`], with a per-collection
//!   [`ChangeFeed`] so open watchers see every local write.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//! ├── app_records.json          # [AuditRecord, ...]
//! ├── app_users.json            # [UserProfile, ...]
//! └── app_current_session.json  # UserProfile of the logged-in operator
//! ```

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreResult;

mod area;
mod feed;
mod firestore;
mod local;
mod memory;

pub use area::{FileArea, KeyValueArea, MemoryArea};
pub use feed::ChangeFeed;
pub use firestore::FirestoreStore;
pub use local::LocalStore;
pub use memory::{FailureMode, MemoryRemoteStore, Operation};

/// A stored document: a JSON object carrying its own `id`.
pub type Document = Value;

const SNAPSHOT_BUFFER: usize = 16;

/// Logical collections shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Records,
    Users,
}

impl Collection {
    pub const ALL: [Self; 2] = [Self::Records, Self::Users];

    /// Remote collection name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Records => "records",
            Self::Users => "users",
        }
    }

    /// Local storage key.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Records => "app_records",
            Self::Users => "app_users",
        }
    }
}

/// Id of a stored document, if it has a string `id` field.
pub fn document_id(document: &Document) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

/// Keyed document operations shared by every backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of a collection.
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>>;

    /// One document by id.
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>>;

    /// Insert or fully replace the document keyed by `id`.
    async fn put(&self, collection: Collection, id: &str, document: Document) -> StoreResult<()>;

    /// Remove the document keyed by `id`. Absent ids are not an error.
    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()>;

    /// Stream of full snapshots: the current contents first, then one
    /// snapshot per change.
    async fn watch(&self, collection: Collection) -> StoreResult<SnapshotStream>;
}

/// Sending half handed to snapshot producers.
pub type SnapshotSender = mpsc::Sender<StoreResult<Vec<Document>>>;

/// Receiving end of [`DocumentStore::watch`].
///
/// Dropping the stream stops its producer task.
pub struct SnapshotStream {
    receiver: mpsc::Receiver<StoreResult<Vec<Document>>>,
    producer: JoinHandle<()>,
}

impl SnapshotStream {
    /// Run `producer` on the current runtime, feeding a new stream.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(SnapshotSender) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        let producer = tokio::spawn(producer(sender));
        Self { receiver, producer }
    }

    /// Next snapshot, or `None` once the producer has finished.
    pub async fn next(&mut self) -> Option<StoreResult<Vec<Document>>> {
        self.receiver.recv().await
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_and_keys() {
        assert_eq!(Collection::Records.name(), "records");
        assert_eq!(Collection::Users.storage_key(), "app_users");
    }

    #[test]
    fn document_id_reads_string_ids_only() {
        assert_eq!(document_id(&serde_json::json!({ "id": "OLP-1" })), Some("OLP-1"));
        assert_eq!(document_id(&serde_json::json!({ "id": 7 })), None);
        assert_eq!(document_id(&serde_json::json!([])), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_stream_stops_producer() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let mut stream = SnapshotStream::spawn(move |sender| async move {
            let _guard = done_tx;
            let _ = sender.send(Ok(Vec::new())).await;
            std::future::pending::<()>().await;
        });

        assert!(stream.next().await.unwrap().unwrap().is_empty());
        drop(stream);

        // The producer's captured sender is dropped when the task is aborted.
        assert!(done_rx.await.is_err());
    }
}
