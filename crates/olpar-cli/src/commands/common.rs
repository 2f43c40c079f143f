use std::path::{Path, PathBuf};

use olpar_core::session::SessionStore;
use olpar_core::{AppConfig, AuditRecord, Persistence, UserProfile};
use serde::Serialize;

use crate::error::CliError;

/// Everything a command needs: the persistence service and the session area.
#[derive(Clone)]
pub struct Context {
    pub persistence: Persistence,
    pub sessions: SessionStore,
}

impl Context {
    /// Load config (file, then `OLPAR_*` env), apply the `--data-dir`
    /// override, and open the stores.
    pub fn open(data_dir: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self, CliError> {
        let config_path = config_path.map_or_else(default_config_path, Path::to_path_buf);
        let mut config = AppConfig::load_from_path(&config_path)?.with_env_overrides();
        if data_dir.is_some() {
            config.data_dir = data_dir;
        }
        Self::from_config(&config)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, CliError> {
        let persistence = Persistence::open(config, &default_data_dir())?;
        let sessions = SessionStore::for_persistence(&persistence);
        Ok(Self {
            persistence,
            sessions,
        })
    }

    /// Logged-in operator, or [`CliError::NotLoggedIn`].
    pub fn require_session(&self) -> Result<UserProfile, CliError> {
        self.sessions.load()?.ok_or(CliError::NotLoggedIn)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("olpar")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("olpar")
        .join("config.json")
}

pub fn normalize_record_identifier(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyRecordId);
    }
    Ok(trimmed.to_string())
}

pub async fn load_record(context: &Context, id: &str) -> Result<AuditRecord, CliError> {
    let id = normalize_record_identifier(id)?;
    context
        .persistence
        .get_record_by_id(&id)
        .await?
        .ok_or(CliError::RecordNotFound(id))
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub timestamp: String,
    pub relative_time: String,
    pub client: String,
    pub client_type: String,
    pub comuna: String,
    pub auditor: Option<String>,
    pub status: String,
}

pub fn record_to_list_item(
    record: &AuditRecord,
    users: &[UserProfile],
    now_ms: i64,
) -> RecordListItem {
    RecordListItem {
        id: record.id.clone(),
        timestamp: record.timestamp.clone(),
        relative_time: record.created_at().map_or_else(String::new, |created| {
            format_relative_time(created.timestamp_millis(), now_ms)
        }),
        client: record.client.contact_name.clone(),
        client_type: record.client.client_type.clone(),
        comuna: record.client.comuna.clone(),
        auditor: record.auditor_display_name(users),
        status: record.client_validation_status.as_str().to_string(),
    }
}

pub fn format_record_lines(items: &[RecordListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{}  {:<9} {:<28} {:<12} {} ({})",
                item.id,
                item.status,
                olpar_core::util::compact_text(&item.client),
                item.comuna,
                item.auditor.as_deref().unwrap_or("-"),
                item.relative_time
            )
        })
        .collect()
}

/// Records captured by the profile with this id or display name. Stored
/// values that match no profile are compared verbatim.
pub fn filter_by_auditor(
    records: Vec<AuditRecord>,
    auditor: &str,
    users: &[UserProfile],
) -> Vec<AuditRecord> {
    let profile = users
        .iter()
        .find(|user| user.id == auditor || user.name == auditor);
    records
        .into_iter()
        .filter(|record| match profile {
            Some(profile) => record.is_owned_by(profile),
            None => record.auditor_id.as_deref() == Some(auditor),
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
