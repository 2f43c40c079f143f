//! Operator session persistence and PIN login.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::UserProfile;
use crate::services::Persistence;
use crate::store::KeyValueArea;

const SESSION_KEY: &str = "app_current_session";

/// Logged-in operator profile, stored in the same area as the local store.
#[derive(Clone)]
pub struct SessionStore {
    area: Arc<dyn KeyValueArea>,
}

impl SessionStore {
    pub fn new(area: Arc<dyn KeyValueArea>) -> Self {
        Self { area }
    }

    /// Session store sharing `persistence`'s local area.
    pub fn for_persistence(persistence: &Persistence) -> Self {
        Self::new(persistence.local().area())
    }

    pub fn load(&self) -> Result<Option<UserProfile>> {
        match self.area.get_item(SESSION_KEY)? {
            Some(raw) if !raw.trim().is_empty() => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    pub fn save(&self, profile: &UserProfile) -> Result<()> {
        let serialized = serde_json::to_string(profile)?;
        Ok(self.area.set_item(SESSION_KEY, &serialized)?)
    }

    pub fn clear(&self) -> Result<()> {
        Ok(self.area.remove_item(SESSION_KEY)?)
    }
}

/// Check `pin` against the profile `user_id` and start a session for it.
pub async fn login(
    persistence: &Persistence,
    sessions: &SessionStore,
    user_id: &str,
    pin: &str,
) -> Result<UserProfile> {
    let profile = persistence
        .get_users()
        .await?
        .into_iter()
        .find(|user| user.id == user_id)
        .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;

    if !profile.pin_matches(pin) {
        tracing::warn!(user_id, "Rejected login with wrong PIN");
        return Err(Error::InvalidCredentials(user_id.to_string()));
    }

    sessions.save(&profile)?;
    tracing::info!(user_id, "Operator logged in");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{default_admin, DEFAULT_ADMIN_ID};
    use crate::store::LocalStore;

    fn setup() -> (Persistence, SessionStore) {
        let persistence = Persistence::new(LocalStore::in_memory());
        let sessions = SessionStore::for_persistence(&persistence);
        (persistence, sessions)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn default_admin_can_log_in() {
        let (persistence, sessions) = setup();
        assert_eq!(sessions.load().unwrap(), None);

        let profile = login(&persistence, &sessions, DEFAULT_ADMIN_ID, "2025")
            .await
            .unwrap();
        assert_eq!(profile, default_admin());
        assert_eq!(sessions.load().unwrap(), Some(default_admin()));

        sessions.clear().unwrap();
        sessions.clear().unwrap();
        assert_eq!(sessions.load().unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wrong_pin_and_unknown_user_are_rejected() {
        let (persistence, sessions) = setup();

        let error = login(&persistence, &sessions, DEFAULT_ADMIN_ID, "0000")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidCredentials(_)));

        let error = login(&persistence, &sessions, "user-404", "2025")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::UserNotFound(_)));
        assert_eq!(sessions.load().unwrap(), None);
    }
}
