//! Remote adapter for the Firestore REST API.
//!
//! The REST surface has no push channel, so [`DocumentStore::watch`] polls
//! the collection and emits a snapshot whenever its contents change.
//! Transient poll failures are retried on the next tick; only provisioning
//! and permission failures end the stream.

mod codec;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::MissedTickBehavior;

use super::{Collection, Document, DocumentStore, SnapshotStream};
use crate::config::RemoteConfig;
use crate::error::{StoreError, StoreResult};

use codec::{decode_document, encode_document};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_SIZE: u32 = 300;

#[derive(Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    documents_url: String,
    api_key: String,
    poll_interval: Duration,
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FirestoreStore")
            .field("documents_url", &self.documents_url)
            .field("api_key", &"[REDACTED]")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FirestoreStore {
    pub fn new(config: &RemoteConfig) -> StoreResult<Self> {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            documents_url: documents_url(base_url, &config.project_id, config.database()),
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval(),
        })
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.documents_url, collection.name())
    }

    fn document_url(&self, collection: Collection, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id)
        )
    }

    async fn list_page(
        &self,
        collection: Collection,
        page_token: Option<&str>,
    ) -> StoreResult<ListResponse> {
        let mut query = vec![
            ("key", self.api_key.clone()),
            ("pageSize", PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .get(self.collection_url(collection))
            .query(&query)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<ListResponse>()
            .await
            .map_err(|error| StoreError::InvalidPayload(error.to_string()))
    }
}

fn documents_url(base_url: &str, project_id: &str, database: &str) -> String {
    format!(
        "{}/v1/projects/{}/databases/{}/documents",
        base_url.trim_end_matches('/'),
        urlencoding::encode(project_id),
        urlencoding::encode(database)
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Timeouts and connection failures are transient.
fn transport_error(error: reqwest::Error) -> StoreError {
    if error.is_timeout() || error.is_connect() {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Http(error)
    }
}

async fn ensure_success(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

/// Map an error response onto the health-relevant failure classes.
fn classify_error(status: StatusCode, body: &str) -> StoreError {
    let (message, code) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().to_string(), String::new()),
    };
    let detail = if message.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", message.trim(), status.as_u16())
    };

    let lowered = message.to_ascii_lowercase();
    if lowered.contains("database") && lowered.contains("does not exist") {
        StoreError::NotProvisioned(detail)
    } else if matches!(status, StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED)
        || code == "PERMISSION_DENIED"
    {
        StoreError::PermissionDenied(detail)
    } else {
        StoreError::Unavailable(detail)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(collection, page_token.as_deref()).await?;
            for resource in &page.documents {
                documents.push(decode_document(resource)?);
            }
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(documents)
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let response = self
            .client
            .get(self.document_url(collection, id))
            .query(&[("key", self.api_key.as_str())])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return match classify_error(status, &body) {
                error @ StoreError::NotProvisioned(_) => Err(error),
                _ => Ok(None),
            };
        }
        let response = ensure_success(response).await?;
        let resource = response
            .json::<Value>()
            .await
            .map_err(|error| StoreError::InvalidPayload(error.to_string()))?;
        decode_document(&resource).map(Some)
    }

    async fn put(&self, collection: Collection, id: &str, document: Document) -> StoreResult<()> {
        let body = encode_document(&document)?;
        let response = self
            .client
            .patch(self.document_url(collection, id))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        tracing::debug!(collection = collection.name(), id, "Saved document remotely");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.document_url(collection, id))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        tracing::debug!(collection = collection.name(), id, "Deleted document remotely");
        Ok(())
    }

    async fn watch(&self, collection: Collection) -> StoreResult<SnapshotStream> {
        let store = self.clone();
        Ok(SnapshotStream::spawn(move |sender| async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Vec<Document>> = None;
            loop {
                ticker.tick().await;
                match store.list(collection).await {
                    Ok(snapshot) => {
                        if last.as_ref() == Some(&snapshot) {
                            continue;
                        }
                        last = Some(snapshot.clone());
                        if sender.send(Ok(snapshot)).await.is_err() {
                            break;
                        }
                    }
                    Err(error) if error.failure_class().is_none() => {
                        tracing::warn!(
                            collection = collection.name(),
                            %error,
                            "Remote poll failed; retrying on next tick"
                        );
                    }
                    Err(error) => {
                        let _ = sender.send(Err(error)).await;
                        break;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::store::document_id;

    const API_KEY: &str = "AIzaSyA1b2C3d4E5f6G7h8I9j0K1l2M3n4O5p6";
    const MISSING_DOCUMENT: &str = r#"{"error":{"code":404,"message":"Document \"projects/olpar-demo/databases/(default)/documents/records/OLP-404\" not found.","status":"NOT_FOUND"}}"#;
    const MISSING_DATABASE: &str = r#"{"error":{"code":404,"message":"The database (default) does not exist for project olpar-demo","status":"NOT_FOUND"}}"#;

    /// HTTP server answering each connection with the next scripted
    /// response; the last one repeats once the script runs out.
    struct ScriptedServer {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedServer {
        async fn spawn(responses: Vec<(&'static str, String)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind test server");
            let address = listener.local_addr().expect("local address");
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&requests);

            tokio::spawn(async move {
                let mut served = 0_usize;
                while let Ok((mut socket, _)) = listener.accept().await {
                    let request = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request);
                    let (status_line, body) = &responses[served.min(responses.len() - 1)];
                    served += 1;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self {
                base_url: format!("http://{address}"),
                requests,
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn store(&self) -> FirestoreStore {
            let mut config = RemoteConfig::new(API_KEY, "olpar-demo");
            config.base_url = Some(self.base_url.clone());
            let mut store = FirestoreStore::new(&config).unwrap();
            store.poll_interval = Duration::from_millis(20);
            store
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await.unwrap_or(0);
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(head_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buffer[..head_end]).to_ascii_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buffer.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn request_body(request: &str) -> Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn resource(id: &str) -> Value {
        json!({
            "name": format!("projects/olpar-demo/databases/(default)/documents/records/{id}"),
            "fields": { "status": { "stringValue": "pending" } }
        })
    }

    fn ok(body: Value) -> (&'static str, String) {
        ("200 OK", body.to_string())
    }

    async fn next_snapshot(stream: &mut SnapshotStream) -> Option<StoreResult<Vec<Document>>> {
        tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("snapshot within timeout")
    }

    #[test]
    fn builds_document_urls() {
        let mut config = RemoteConfig::new("AIzaSyA1b2C3d4E5f6G7h8I9j0K1l2M3n4O5p6", "olpar-demo");
        config.base_url = Some("http://localhost:8080".to_string());
        let store = FirestoreStore::new(&config).unwrap();

        assert_eq!(
            store.document_url(Collection::Records, "OLP 1"),
            "http://localhost:8080/v1/projects/olpar-demo/databases/%28default%29/documents/records/OLP%201"
        );
        assert_eq!(store.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = RemoteConfig::new("AIzaSyA1b2C3d4E5f6G7h8I9j0K1l2M3n4O5p6", "olpar-demo");
        let store = FirestoreStore::new(&config).unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("AIzaSyA1b2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn classifies_missing_database() {
        let body = r#"{"error":{"code":404,"message":"The database (default) does not exist for project olpar-demo","status":"NOT_FOUND"}}"#;
        assert!(matches!(
            classify_error(StatusCode::NOT_FOUND, body),
            StoreError::NotProvisioned(_)
        ));
    }

    #[test]
    fn classifies_permission_failures() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, body),
            StoreError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, r#"{"error":{"status":"PERMISSION_DENIED"}}"#),
            StoreError::PermissionDenied(_)
        ));
    }

    #[test]
    fn everything_else_is_transient() {
        let error = classify_error(StatusCode::SERVICE_UNAVAILABLE, "upstream overloaded");
        match error {
            StoreError::Unavailable(detail) => assert_eq!(detail, "upstream overloaded (503)"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            classify_error(StatusCode::NOT_FOUND, ""),
            StoreError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = ScriptedServer::spawn(vec![
            ok(json!({ "documents": [resource("OLP-1")], "nextPageToken": "page-2" })),
            ok(json!({ "documents": [resource("OLP-2")] })),
        ])
        .await;

        let documents = server.store().list(Collection::Records).await.unwrap();

        let ids: Vec<_> = documents.iter().filter_map(document_id).collect();
        assert_eq!(ids, vec!["OLP-1", "OLP-2"]);
        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /v1/projects/olpar-demo/databases/%28default%29/documents/records?"));
        assert!(requests[0].contains("pageSize=300"));
        assert!(!requests[0].contains("pageToken"));
        assert!(requests[1].contains("pageToken=page-2"));
    }

    #[tokio::test]
    async fn get_maps_missing_document_to_none_but_not_missing_database() {
        let server = ScriptedServer::spawn(vec![
            ("404 Not Found", MISSING_DOCUMENT.to_string()),
            ("404 Not Found", MISSING_DATABASE.to_string()),
            ok(resource("OLP-7")),
        ])
        .await;
        let store = server.store();

        assert_eq!(store.get(Collection::Records, "OLP-404").await.unwrap(), None);
        assert!(matches!(
            store.get(Collection::Records, "OLP-404").await,
            Err(StoreError::NotProvisioned(_))
        ));
        assert_eq!(
            store.get(Collection::Records, "OLP-7").await.unwrap(),
            Some(json!({ "id": "OLP-7", "status": "pending" }))
        );
    }

    #[tokio::test]
    async fn put_patches_encoded_fields() {
        let server = ScriptedServer::spawn(vec![ok(json!({}))]).await;

        server
            .store()
            .put(
                Collection::Users,
                "user 1",
                json!({ "id": "user 1", "pin": "1234", "active": true }),
            )
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with(
            "PATCH /v1/projects/olpar-demo/databases/%28default%29/documents/users/user%201?key="
        ));
        assert_eq!(
            request_body(&requests[0]),
            json!({ "fields": {
                "id": { "stringValue": "user 1" },
                "pin": { "stringValue": "1234" },
                "active": { "booleanValue": true }
            } })
        );
    }

    #[tokio::test]
    async fn watch_skips_unchanged_polls_and_survives_transient_failures() {
        let server = ScriptedServer::spawn(vec![
            ok(json!({})),
            ok(json!({ "documents": [] })),
            (
                "503 Service Unavailable",
                r#"{"error":{"code":503,"message":"The service is currently unavailable.","status":"UNAVAILABLE"}}"#
                    .to_string(),
            ),
            ok(json!({ "documents": [resource("OLP-9")] })),
        ])
        .await;
        let mut stream = server.store().watch(Collection::Records).await.unwrap();

        assert_eq!(next_snapshot(&mut stream).await.unwrap().unwrap(), Vec::<Document>::new());
        let changed = next_snapshot(&mut stream).await.unwrap().unwrap();
        assert_eq!(changed, vec![json!({ "id": "OLP-9", "status": "pending" })]);

        // Two identical empty polls and one failed poll produced a single
        // emission before the change.
        assert!(server.requests().len() >= 4);
    }

    #[tokio::test]
    async fn watch_ends_on_permission_failure() {
        let server = ScriptedServer::spawn(vec![(
            "403 Forbidden",
            r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#
                .to_string(),
        )])
        .await;
        let mut stream = server.store().watch(Collection::Users).await.unwrap();

        assert!(matches!(
            next_snapshot(&mut stream).await,
            Some(Err(StoreError::PermissionDenied(_)))
        ));
        assert!(next_snapshot(&mut stream).await.is_none());
    }
}
