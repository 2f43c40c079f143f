//! Dual-mode persistence service shared by every client.
//!
//! Each call first tries the remote store when it is eligible, records the
//! outcome in the shared [`CloudHealth`], and falls back to the local store
//! on failure. Readers of the users collection always see at least one
//! administrator.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Subscription;
use crate::config::{AppConfig, RemoteConfig};
use crate::error::{Error, Result, StoreError, StoreResult};
use crate::health::{CloudHealth, CloudStatus};
use crate::models::{ensure_default_admin, AuditRecord, ClientValidationStatus, UserProfile};
use crate::store::{
    Collection, Document, DocumentStore, FirestoreStore, LocalStore, SnapshotStream,
};

type Deliver = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// Persistence façade over the remote and local document stores.
#[derive(Clone)]
pub struct Persistence {
    local: LocalStore,
    remote: Option<Arc<dyn DocumentStore>>,
    remote_config: Option<RemoteConfig>,
    health: Arc<CloudHealth>,
    mirror_remote_writes: bool,
}

impl Persistence {
    /// Local-only persistence.
    pub fn new(local: LocalStore) -> Self {
        Self {
            local,
            remote: None,
            remote_config: None,
            health: Arc::new(CloudHealth::new()),
            mirror_remote_writes: false,
        }
    }

    /// Attach a remote store. It is only used while `config` carries a
    /// credential that looks real.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn DocumentStore>, config: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self.remote_config = Some(config);
        self
    }

    /// Share an existing health tracker instead of a fresh one.
    #[must_use]
    pub fn with_health(mut self, health: Arc<CloudHealth>) -> Self {
        self.health = health;
        self
    }

    /// Also write successful remote mutations into the local store.
    #[must_use]
    pub const fn with_mirror_remote_writes(mut self, mirror: bool) -> Self {
        self.mirror_remote_writes = mirror;
        self
    }

    /// Build the service described by `config`, storing local data under
    /// `config.data_dir` or `default_data_dir`.
    pub fn open(config: &AppConfig, default_data_dir: &Path) -> Result<Self> {
        let data_dir = config
            .data_dir
            .clone()
            .unwrap_or_else(|| default_data_dir.to_path_buf());
        let local = LocalStore::open_dir(&data_dir)?;
        let persistence =
            Self::new(local).with_mirror_remote_writes(config.mirror_remote_writes);

        match config.usable_remote() {
            Some(remote) => {
                tracing::info!(
                    "Remote store enabled for project {} (database {})",
                    remote.project_id,
                    remote.database()
                );
                let store = FirestoreStore::new(remote)?;
                Ok(persistence.with_remote(Arc::new(store), remote.clone()))
            }
            None => {
                tracing::info!(
                    "Running in local-only mode (data in {})",
                    data_dir.display()
                );
                Ok(persistence)
            }
        }
    }

    pub const fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn health(&self) -> Arc<CloudHealth> {
        Arc::clone(&self.health)
    }

    /// Current cloud connectivity snapshot.
    pub fn cloud_status(&self) -> CloudStatus {
        self.health.snapshot()
    }

    /// Whether the next operation will try the remote store. Re-evaluated on
    /// every call.
    pub fn is_cloud_enabled(&self) -> bool {
        self.eligible_remote().is_some()
    }

    fn eligible_remote(&self) -> Option<&Arc<dyn DocumentStore>> {
        let credential_ok = self
            .remote_config
            .as_ref()
            .is_some_and(RemoteConfig::looks_like_credential);
        if !credential_ok || self.health.is_not_found() {
            return None;
        }
        self.remote.as_ref()
    }

    fn remote_failed(&self, collection: Collection, operation: &str, error: &StoreError) {
        self.health.record_failure(error);
        tracing::debug!(
            collection = collection.name(),
            operation,
            "Remote call failed, using local store: {error}"
        );
    }

    // Records

    pub async fn get_records(&self) -> Result<Vec<AuditRecord>> {
        let documents = self.list_documents(Collection::Records).await?;
        Ok(decode_documents(Collection::Records, documents))
    }

    /// Insert or replace the record keyed by its id.
    pub async fn save_record(&self, record: &AuditRecord) -> Result<()> {
        record.validate()?;
        self.put_document(Collection::Records, &record.id, record)
            .await
    }

    pub async fn delete_record(&self, id: &str) -> Result<()> {
        self.delete_document(Collection::Records, id).await
    }

    pub async fn get_record_by_id(&self, id: &str) -> Result<Option<AuditRecord>> {
        self.get_document(Collection::Records, id)
            .await?
            .map(|document| serde_json::from_value(document).map_err(Error::from))
            .transpose()
    }

    /// Owner confirmation: mark the record `verified`.
    pub async fn verify_record(&self, id: &str) -> Result<Option<AuditRecord>> {
        self.set_record_status(id, ClientValidationStatus::Verified)
            .await
    }

    /// Admin edit of the owner-facing status.
    pub async fn set_record_status(
        &self,
        id: &str,
        status: ClientValidationStatus,
    ) -> Result<Option<AuditRecord>> {
        self.update_record(id, |record| record.client_validation_status = status)
            .await
    }

    /// Load a record, apply `edit` and save it back under the same id.
    /// `None` when no record has that id.
    pub async fn update_record<F>(&self, id: &str, edit: F) -> Result<Option<AuditRecord>>
    where
        F: FnOnce(&mut AuditRecord) + Send,
    {
        let Some(mut record) = self.get_record_by_id(id).await? else {
            return Ok(None);
        };
        edit(&mut record);
        record.id = id.to_string();
        self.save_record(&record).await?;
        Ok(Some(record))
    }

    /// Deliver the full record list now and after every change.
    pub async fn on_records_update<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<AuditRecord>) + Send + Sync + 'static,
    {
        let deliver: Deliver = Arc::new(move |documents| {
            callback(decode_documents(Collection::Records, documents));
        });
        self.subscribe(Collection::Records, deliver).await
    }

    // Users

    /// Every profile, with the default administrator injected when no
    /// administrator is stored. The injected profile is never written back.
    pub async fn get_users(&self) -> Result<Vec<UserProfile>> {
        let documents = self.list_documents(Collection::Users).await?;
        Ok(ensure_default_admin(decode_documents(
            Collection::Users,
            documents,
        )))
    }

    pub async fn save_user(&self, user: &UserProfile) -> Result<()> {
        self.put_document(Collection::Users, &user.id, user).await
    }

    /// Edit a profile in place. The injected administrator can be edited
    /// too; saving it stores it like any other profile.
    pub async fn update_user<F>(&self, id: &str, edit: F) -> Result<UserProfile>
    where
        F: FnOnce(&mut UserProfile) + Send,
    {
        let mut user = self
            .get_users()
            .await?
            .into_iter()
            .find(|user| user.id == id)
            .ok_or_else(|| Error::UserNotFound(id.to_string()))?;
        edit(&mut user);
        user.id = id.to_string();
        user.validate()?;
        self.save_user(&user).await?;
        Ok(user)
    }

    /// Delete a profile. `acting_user_id` is the logged-in operator, who may
    /// not delete their own profile.
    pub async fn delete_user(&self, id: &str, acting_user_id: Option<&str>) -> Result<()> {
        if acting_user_id == Some(id) {
            return Err(Error::SelfDeletion(id.to_string()));
        }
        self.delete_document(Collection::Users, id).await
    }

    /// Deliver the normalized user list now and after every change.
    pub async fn on_users_update<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<UserProfile>) + Send + Sync + 'static,
    {
        let deliver: Deliver = Arc::new(move |documents| {
            callback(ensure_default_admin(decode_documents(
                Collection::Users,
                documents,
            )));
        });
        self.subscribe(Collection::Users, deliver).await
    }

    // Document plumbing

    async fn list_documents(&self, collection: Collection) -> Result<Vec<Document>> {
        if let Some(remote) = self.eligible_remote() {
            match remote.list(collection).await {
                Ok(documents) => {
                    self.health.mark_connected();
                    return Ok(documents);
                }
                Err(error) => self.remote_failed(collection, "list", &error),
            }
        }
        Ok(self.local.list(collection).await?)
    }

    async fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        if let Some(remote) = self.eligible_remote() {
            match remote.get(collection, id).await {
                Ok(Some(document)) => {
                    self.health.mark_connected();
                    return Ok(Some(document));
                }
                // Records written while offline only exist locally.
                Ok(None) => self.health.mark_connected(),
                Err(error) => self.remote_failed(collection, "get", &error),
            }
        }
        Ok(self.local.get(collection, id).await?)
    }

    async fn put_document<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: &str,
        value: &T,
    ) -> Result<()> {
        let document = serde_json::to_value(value)?;
        if let Some(remote) = self.eligible_remote() {
            match remote.put(collection, id, document.clone()).await {
                Ok(()) => {
                    self.health.mark_connected();
                    if self.mirror_remote_writes {
                        if let Err(error) = self.local.put(collection, id, document).await {
                            tracing::warn!(
                                collection = collection.name(),
                                id,
                                "Failed to mirror remote write locally: {error}"
                            );
                        }
                    }
                    return Ok(());
                }
                Err(error) => self.remote_failed(collection, "put", &error),
            }
        }
        Ok(self.local.put(collection, id, document).await?)
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<()> {
        if let Some(remote) = self.eligible_remote() {
            match remote.delete(collection, id).await {
                Ok(()) => {
                    self.health.mark_connected();
                    if self.mirror_remote_writes {
                        if let Err(error) = self.local.delete(collection, id).await {
                            tracing::warn!(
                                collection = collection.name(),
                                id,
                                "Failed to mirror remote delete locally: {error}"
                            );
                        }
                    }
                    return Ok(());
                }
                Err(error) => self.remote_failed(collection, "delete", &error),
            }
        }
        Ok(self.local.delete(collection, id).await?)
    }

    /// Deliver the first snapshot before returning, then pump the rest on a
    /// background task.
    async fn subscribe(&self, collection: Collection, callback: Deliver) -> Result<Subscription> {
        let active = Arc::new(AtomicBool::new(true));
        let deliver: Deliver = {
            let active = Arc::clone(&active);
            Arc::new(move |documents| {
                if active.load(Ordering::SeqCst) {
                    callback(documents);
                }
            })
        };

        if let Some(remote) = self.eligible_remote() {
            match open_watch(&**remote, collection).await {
                Ok((documents, stream)) => {
                    self.health.mark_connected();
                    deliver(documents);
                    let task = tokio::spawn(self.clone().pump_remote(collection, stream, deliver));
                    return Ok(Subscription::new(active, task));
                }
                Err(error) => self.remote_failed(collection, "watch", &error),
            }
        }

        let (documents, stream) = open_watch(&self.local, collection).await?;
        deliver(documents);
        let task = tokio::spawn(pump_local(collection, stream, deliver));
        Ok(Subscription::new(active, task))
    }

    /// Forward remote snapshots until the remote fails, then continue as a
    /// local subscription starting with the current local list.
    async fn pump_remote(self, collection: Collection, mut stream: SnapshotStream, deliver: Deliver) {
        while let Some(snapshot) = stream.next().await {
            match snapshot {
                Ok(documents) => {
                    self.health.mark_connected();
                    deliver(documents);
                }
                Err(error) => {
                    self.remote_failed(collection, "watch", &error);
                    break;
                }
            }
        }
        drop(stream);

        match open_watch(&self.local, collection).await {
            Ok((documents, stream)) => {
                deliver(documents);
                pump_local(collection, stream, deliver).await;
            }
            Err(error) => tracing::warn!(
                collection = collection.name(),
                "Local fallback subscription failed: {error}"
            ),
        }
    }
}

/// Open `store`'s watch and wait for its initial snapshot.
async fn open_watch(
    store: &dyn DocumentStore,
    collection: Collection,
) -> StoreResult<(Vec<Document>, SnapshotStream)> {
    let mut stream = store.watch(collection).await?;
    match stream.next().await {
        Some(Ok(documents)) => Ok((documents, stream)),
        Some(Err(error)) => Err(error),
        None => Err(StoreError::Unavailable(format!(
            "{} watch closed before its first snapshot",
            collection.name()
        ))),
    }
}

async fn pump_local(collection: Collection, mut stream: SnapshotStream, deliver: Deliver) {
    while let Some(snapshot) = stream.next().await {
        match snapshot {
            Ok(documents) => deliver(documents),
            Err(error) => tracing::warn!(
                collection = collection.name(),
                "Failed to re-read local collection: {error}"
            ),
        }
    }
}

/// Decode stored documents, skipping (and logging) malformed entries.
fn decode_documents<T: DeserializeOwned>(collection: Collection, documents: Vec<Document>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|document| match serde_json::from_value(document) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(
                    collection = collection.name(),
                    "Skipping malformed document: {error}"
                );
                None
            }
        })
        .collect()
}
