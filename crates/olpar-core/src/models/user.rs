//! Operator profile model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::unix_timestamp_millis;

/// Id of the built-in administrator profile.
pub const DEFAULT_ADMIN_ID: &str = "admin-main";

/// Avatar color tags offered when creating a profile.
pub const AVATAR_PALETTE: &[&str] = &[
    "bg-blue-600",
    "bg-emerald-600",
    "bg-amber-500",
    "bg-rose-600",
    "bg-purple-600",
    "bg-slate-900",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Auditor,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auditor" => Ok(Self::Auditor),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// An authorized operator or administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    /// 4-digit PIN, compared in plaintext
    pub pin: String,
    #[serde(default)]
    pub avatar_color: String,
    #[serde(default)]
    pub role: Role,
}

impl UserProfile {
    /// Create a profile with a system-generated `user-<epoch ms>` id.
    pub fn new(
        name: impl Into<String>,
        pin: impl Into<String>,
        role: Role,
        avatar_color: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("user-{}", unix_timestamp_millis()),
            name: name.into(),
            pin: pin.into(),
            avatar_color: avatar_color.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn pin_matches(&self, pin: &str) -> bool {
        self.pin == pin
    }

    /// Check the fields an operator can edit.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("user id cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("user name cannot be empty".to_string()));
        }
        if self.pin.len() != 4 || !self.pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidInput(
                "PIN must be exactly 4 digits".to_string(),
            ));
        }
        Ok(())
    }
}

/// The built-in administrator, always visible to readers.
pub fn default_admin() -> UserProfile {
    UserProfile {
        id: DEFAULT_ADMIN_ID.to_string(),
        name: "Administrador Olpar".to_string(),
        pin: "2025".to_string(),
        avatar_color: "bg-slate-900".to_string(),
        role: Role::Admin,
    }
}

/// Guarantee at least one admin in a list read from storage.
///
/// An empty list becomes `[default_admin]`; a list without any admin gets the
/// default admin prepended. Lists that already have an admin are untouched.
pub fn ensure_default_admin(mut users: Vec<UserProfile>) -> Vec<UserProfile> {
    if !users.iter().any(UserProfile::is_admin) {
        users.insert(0, default_admin());
    }
    users
}
