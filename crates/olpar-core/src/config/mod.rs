//! Runtime configuration.
//!
//! [`AppConfig`] is read from an optional JSON file and then overridden by
//! `OLPAR_*` environment variables. The remote section is only used when its
//! API key looks like a real credential.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option, parse_flag};

/// Placeholder key shipped in templates; never treated as a credential.
pub const PLACEHOLDER_API_KEY: &str = "AIzaSy_REPLACE_WITH_WEB_API_KEY";

const API_KEY_PREFIX: &str = "AIzaSy";
const API_KEY_MIN_LEN: usize = 30;
const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Remote document database connection settings.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub database: Option<String>,
    /// Override for the REST endpoint (emulators, proxies)
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("base_url", &self.base_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

impl RemoteConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Whether the API key is syntactically a real credential: not the
    /// placeholder, correct prefix, and longer than the minimum length.
    pub fn looks_like_credential(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty()
            && key != PLACEHOLDER_API_KEY
            && key.starts_with(API_KEY_PREFIX)
            && key.len() > API_KEY_MIN_LEN
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    fn normalize(&mut self) {
        self.api_key = self.api_key.trim().to_string();
        self.project_id = self.project_id.trim().to_string();
        self.database = normalize_text_option(self.database.take());
        self.base_url = normalize_text_option(self.base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
    }

    fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            if !is_http_url(base_url) {
                return Err(Error::Config(
                    "remote base_url must include http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Directory holding the local store files
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Also write successful remote upserts/deletes into the local store
    #[serde(default)]
    pub mirror_remote_writes: bool,
}

impl AppConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|error| Error::Config(format!("failed to parse {}: {error}", path.display())))
    }

    /// Parse and normalize a JSON payload.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let mut config =
            serde_json::from_str::<Self>(raw).map_err(|error| format!("invalid JSON: {error}"))?;
        config.normalize();
        config.validate().map_err(|error| error.to_string())?;
        Ok(config)
    }

    /// Apply `OLPAR_*` overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = normalize_text_option(lookup("OLPAR_DATA_DIR")) {
            self.data_dir = Some(PathBuf::from(dir));
        }

        let api_key = normalize_text_option(lookup("OLPAR_API_KEY"));
        let project_id = normalize_text_option(lookup("OLPAR_PROJECT_ID"));
        let database = normalize_text_option(lookup("OLPAR_DATABASE"));
        let base_url = normalize_text_option(lookup("OLPAR_REMOTE_BASE_URL"));
        if api_key.is_some() || project_id.is_some() || database.is_some() || base_url.is_some() {
            let remote = self.remote.get_or_insert_with(RemoteConfig::default);
            if let Some(api_key) = api_key {
                remote.api_key = api_key;
            }
            if let Some(project_id) = project_id {
                remote.project_id = project_id;
            }
            if database.is_some() {
                remote.database = database;
            }
            if base_url.is_some() {
                remote.base_url = base_url;
            }
            remote.normalize();
        }

        if let Some(flag) = lookup("OLPAR_MIRROR_REMOTE_WRITES") {
            self.mirror_remote_writes = parse_flag(&flag);
        }
        self
    }

    /// Remote settings, only when they look usable.
    pub fn usable_remote(&self) -> Option<&RemoteConfig> {
        self.remote
            .as_ref()
            .filter(|remote| remote.looks_like_credential() && !remote.project_id.is_empty())
    }

    fn normalize(&mut self) {
        if let Some(remote) = self.remote.as_mut() {
            remote.normalize();
        }
    }

    fn validate(&self) -> Result<()> {
        self.remote.as_ref().map_or(Ok(()), RemoteConfig::validate)
    }
}
