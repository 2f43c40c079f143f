//! In-process remote store with failure injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;

use super::{ChangeFeed, Collection, Document, DocumentStore, SnapshotStream};
use crate::error::{StoreError, StoreResult};

/// Failure every call returns while set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    #[default]
    None,
    NotProvisioned,
    PermissionDenied,
    Unavailable,
}

impl FailureMode {
    fn error(self) -> Option<StoreError> {
        match self {
            Self::None => None,
            Self::NotProvisioned => Some(StoreError::NotProvisioned(
                "The database (default) does not exist for project olpar-test".to_string(),
            )),
            Self::PermissionDenied => Some(StoreError::PermissionDenied(
                "Missing or insufficient permissions.".to_string(),
            )),
            Self::Unavailable => Some(StoreError::Unavailable(
                "remote temporarily unavailable".to_string(),
            )),
        }
    }
}

/// Remote calls counted by [`MemoryRemoteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Put,
    Delete,
    Watch,
}

impl Operation {
    const COUNT: usize = 5;

    const fn index(self) -> usize {
        match self {
            Self::List => 0,
            Self::Get => 1,
            Self::Put => 2,
            Self::Delete => 3,
            Self::Watch => 4,
        }
    }
}

/// Push-based remote kept in memory. Behaves like a realtime document
/// database: watchers get the current contents and then every change.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    collections: Mutex<HashMap<Collection, BTreeMap<String, Document>>>,
    feed: ChangeFeed,
    failure: Mutex<FailureMode>,
    calls: [AtomicUsize; Operation::COUNT],
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `mode`. Open watchers observe the
    /// failure on their next change.
    pub fn fail_with(&self, mode: FailureMode) {
        *self
            .inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mode;
        for collection in Collection::ALL {
            self.inner.feed.notify(collection);
        }
    }

    /// Insert a document without counting a call.
    pub fn seed(&self, collection: Collection, document: Document) {
        let id = super::document_id(&document).unwrap_or_default().to_string();
        self.collections()
            .entry(collection)
            .or_default()
            .insert(id, document);
        self.inner.feed.notify(collection);
    }

    /// Current contents without counting a call.
    pub fn snapshot(&self, collection: Collection) -> Vec<Document> {
        self.collections()
            .get(&collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.inner.calls[operation.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.inner
            .calls
            .iter()
            .map(|count| count.load(Ordering::SeqCst))
            .sum()
    }

    fn collections(&self) -> MutexGuard<'_, HashMap<Collection, BTreeMap<String, Document>>> {
        self.inner
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current_failure(&self) -> Option<StoreError> {
        self.inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .error()
    }

    fn begin(&self, operation: Operation) -> StoreResult<()> {
        self.inner.calls[operation.index()].fetch_add(1, Ordering::SeqCst);
        self.current_failure().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl DocumentStore for MemoryRemoteStore {
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        self.begin(Operation::List)?;
        Ok(self.snapshot(collection))
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        self.begin(Operation::Get)?;
        Ok(self
            .collections()
            .get(&collection)
            .and_then(|documents| documents.get(id).cloned()))
    }

    async fn put(&self, collection: Collection, id: &str, document: Document) -> StoreResult<()> {
        self.begin(Operation::Put)?;
        self.collections()
            .entry(collection)
            .or_default()
            .insert(id.to_string(), document);
        self.inner.feed.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.begin(Operation::Delete)?;
        let removed = self
            .collections()
            .get_mut(&collection)
            .and_then(|documents| documents.remove(id));
        if removed.is_some() {
            self.inner.feed.notify(collection);
        }
        Ok(())
    }

    async fn watch(&self, collection: Collection) -> StoreResult<SnapshotStream> {
        self.begin(Operation::Watch)?;
        let mut changes = self.inner.feed.subscribe(collection);
        let store = self.clone();
        Ok(SnapshotStream::spawn(move |sender| async move {
            if sender.send(Ok(store.snapshot(collection))).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                if let Some(error) = store.current_failure() {
                    let _ = sender.send(Err(error)).await;
                    break;
                }
                if sender.send(Ok(store.snapshot(collection))).await.is_err() {
                    break;
                }
            }
        }))
    }
}
