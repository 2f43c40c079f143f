//! Audit record model

use std::cmp::Ordering;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserProfile;
use crate::error::{Error, Result};

/// Remote documents are capped at 1 MiB, images included.
pub const MAX_IMAGE_BYTES: usize = 600 * 1024;

/// Owner-facing confirmation state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientValidationStatus {
    #[default]
    Pending,
    Verified,
    Reported,
}

impl ClientValidationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Reported => "reported",
        }
    }
}

impl std::str::FromStr for ClientValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "reported" => Ok(Self::Reported),
            other => Err(format!("unknown validation status: {other}")),
        }
    }
}

/// A GPS capture. `manually_adjusted` is set when the pin was dragged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
    pub accuracy: f64,
    /// Capture time (Unix ms)
    #[serde(rename = "timestamp")]
    pub captured_at_ms: i64,
    #[serde(rename = "isManual", default, skip_serializing_if = "std::ops::Not::not")]
    pub manually_adjusted: bool,
}

impl Coords {
    /// Whether every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && self.accuracy.is_finite()
    }

    /// Move the capture to a corrected position.
    #[must_use]
    pub const fn adjusted(self, lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            manually_adjusted: true,
            ..self
        }
    }
}

/// Commercial and location metadata of the audited client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientInfo {
    pub client_type: String,
    pub contact_name: String,
    pub city: String,
    pub comuna: String,
    pub neighborhood: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub open_time: String,
    pub close_time: String,
    pub observations: String,
}

impl ClientInfo {
    /// Opening hours as `open-close`, empty when neither is set.
    pub fn hours(&self) -> String {
        if self.open_time.is_empty() && self.close_time.is_empty() {
            String::new()
        } else {
            format!("{}-{}", self.open_time, self.close_time)
        }
    }
}

/// Data-URI encoded photos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordImages {
    pub facade: Option<String>,
    pub interior: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Facade,
    Interior,
}

/// Encode an image file as a data URI. The MIME type follows the extension.
pub fn image_data_uri(file_name: &str, bytes: &[u8]) -> Result<String> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();
    let mime_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => {
            return Err(Error::InvalidInput(format!(
                "unsupported image type: {file_name}"
            )))
        }
    };
    if bytes.is_empty() {
        return Err(Error::InvalidInput(format!("image is empty: {file_name}")));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(Error::InvalidInput(format!(
            "image is larger than {} KiB: {file_name}",
            MAX_IMAGE_BYTES / 1024
        )));
    }
    Ok(format!(
        "data:{mime_type};base64,{}",
        BASE64_STANDARD.encode(bytes)
    ))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiValidation {
    pub facade: bool,
}

/// One field-captured audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    /// Creation time, RFC 3339
    pub timestamp: String,
    #[serde(default)]
    pub client: ClientInfo,
    #[serde(default)]
    pub gps_outside: Option<Coords>,
    #[serde(default)]
    pub gps_inside: Option<Coords>,
    #[serde(default)]
    pub drift_meters: f64,
    #[serde(default)]
    pub plus_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_validation: Option<AiValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<RecordImages>,
    /// Capturing operator. Profile id for new captures, display name on
    /// records written by older clients.
    #[serde(rename = "auditorId", default, skip_serializing_if = "Option::is_none")]
    pub auditor_id: Option<String>,
    #[serde(default)]
    pub client_validation_status: ClientValidationStatus,
}

impl AuditRecord {
    /// Start a new pending record captured now by `auditor`.
    pub fn new(client: ClientInfo, gps: Option<Coords>, auditor: Option<&UserProfile>) -> Self {
        Self {
            id: Self::generate_id(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            client,
            gps_outside: gps,
            gps_inside: gps,
            drift_meters: 0.0,
            plus_code: None,
            ai_validation: None,
            images: None,
            auditor_id: auditor.map(|profile| profile.id.clone()),
            client_validation_status: ClientValidationStatus::Pending,
        }
    }

    /// `OLP-` followed by six digits in 100000..=999999.
    pub fn generate_id() -> String {
        let bytes = Uuid::new_v4().into_bytes();
        let seed = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        format!("OLP-{}", 100_000 + seed % 900_000)
    }

    /// Reject values that cannot be stored faithfully. JSON has no encoding
    /// for NaN or infinity.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("record id cannot be empty".to_string()));
        }
        let coords_ok = [self.gps_outside, self.gps_inside]
            .iter()
            .flatten()
            .all(Coords::is_finite);
        if !coords_ok || !self.drift_meters.is_finite() {
            return Err(Error::InvalidInput(format!(
                "record {} has non-finite coordinates",
                self.id
            )));
        }
        Ok(())
    }

    /// Replace one photo, keeping the other.
    pub fn set_image(&mut self, slot: ImageSlot, data_uri: String) {
        let images = self.images.get_or_insert_with(RecordImages::default);
        match slot {
            ImageSlot::Facade => images.facade = Some(data_uri),
            ImageSlot::Interior => images.interior = Some(data_uri),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Utc))
    }

    /// Whether `profile` captured this record. Matches on profile id, or on
    /// display name for records that stored a name.
    pub fn is_owned_by(&self, profile: &UserProfile) -> bool {
        self.auditor_id
            .as_deref()
            .is_some_and(|owner| owner == profile.id || owner == profile.name)
    }

    /// Resolve the auditor's current display name.
    ///
    /// Falls back to the stored value when no profile matches its id.
    pub fn auditor_display_name(&self, users: &[UserProfile]) -> Option<String> {
        let owner = self.auditor_id.as_deref()?;
        Some(
            users
                .iter()
                .find(|user| user.id == owner)
                .map_or_else(|| owner.to_string(), |user| user.name.clone()),
        )
    }
}

/// Sort records by creation time, newest first.
///
/// Timestamps that fail to parse sort after parseable ones, by raw text.
pub fn sort_newest_first(records: &mut [AuditRecord]) {
    records.sort_by(|a, b| match (a.created_at(), b.created_at()) {
        (Some(a_time), Some(b_time)) => b_time.cmp(&a_time),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.timestamp.cmp(&a.timestamp),
    });
}

/// Owner-facing confirmation link for a record.
pub fn verification_link(base_url: &str, record_id: &str) -> String {
    format!(
        "{}#mode=client&id={}",
        base_url.trim_end_matches('#'),
        urlencoding::encode(record_id)
    )
}
