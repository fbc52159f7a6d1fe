use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::UserIdentity;
use crate::theme::Theme;

/// On-disk shape of the session file. The theme preference rides along so a
/// restart restores both without re-login.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedSession {
    token: Option<String>,
    user: Option<UserIdentity>,
    #[serde(default)]
    theme: Theme,
}

/// The one piece of state shared by every view. Logged-in iff a token is
/// held. All mutation goes through the methods below, and every mutation is
/// written to disk before it returns.
pub struct SessionStore {
    path: PathBuf,
    state: RwLock<PersistedSession>,
}

impl SessionStore {
    /// Load the persisted session, or start anonymous if the file is
    /// missing or unreadable. A corrupt session file must never block
    /// startup.
    pub fn open(path: PathBuf) -> SessionStore {
        let state = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        SessionStore {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::data_dir().context("could not determine the user data directory")?;
        Ok(base.join("growtwitter").join("session.json"))
    }

    pub fn is_logged_in(&self) -> bool {
        self.read().token.is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.read().user.clone()
    }

    pub fn username(&self) -> Option<String> {
        self.read().user.as_ref().map(|u| u.username.clone())
    }

    pub fn theme(&self) -> Theme {
        self.read().theme
    }

    /// Record a successful credential exchange.
    pub fn login(&self, token: String, user: UserIdentity) {
        let mut state = self.write();
        state.token = Some(token);
        state.user = Some(user);
        self.persist(&state);
    }

    /// Clear the session unconditionally. Safe to call repeatedly; also
    /// invoked by the gateway when any response comes back 401.
    pub fn logout(&self) {
        let mut state = self.write();
        state.token = None;
        state.user = None;
        self.persist(&state);
    }

    /// Merge display-field changes into the identity. The token is never
    /// touched; a logged-out store ignores the update.
    pub fn update_identity(&self, name: String, image_url: Option<String>) {
        let mut state = self.write();
        if let Some(user) = state.user.as_mut() {
            user.name = name;
            user.image_url = image_url;
            self.persist(&state);
        }
    }

    pub fn set_theme(&self, theme: Theme) {
        let mut state = self.write();
        state.theme = theme;
        self.persist(&state);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PersistedSession> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, PersistedSession> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &PersistedSession) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "could not create session directory");
                return;
            }
        }
        match serde_json::to_string_pretty(state) {
            Ok(raw) => {
                if let Err(e) = fs::write(&self.path, raw) {
                    warn!(path = %self.path.display(), error = %e, "could not persist session");
                }
            }
            Err(e) => warn!(error = %e, "could not serialize session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> UserIdentity {
        UserIdentity {
            id: "u1".to_string(),
            username: "ada".to_string(),
            name: "Ada Lovelace".to_string(),
            image_url: None,
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::open(dir.path().join("session.json"))
    }

    #[test]
    fn test_starts_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.is_logged_in());
        assert!(store.token().is_none());
        assert!(store.identity().is_none());
    }

    #[test]
    fn test_login_then_reload_restores_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::open(path.clone());
        store.login("tok-123".to_string(), identity());
        assert!(store.is_logged_in());

        // A fresh store over the same file sees the persisted session.
        let reloaded = SessionStore::open(path);
        assert!(reloaded.is_logged_in());
        assert_eq!(reloaded.token().as_deref(), Some("tok-123"));
        assert_eq!(reloaded.username().as_deref(), Some("ada"));
    }

    #[test]
    fn test_logout_clears_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.login("tok".to_string(), identity());

        store.logout();
        assert!(!store.is_logged_in());
        assert!(store.identity().is_none());

        store.logout();
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_logout_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::open(path.clone());
        store.login("tok".to_string(), identity());
        store.logout();

        let reloaded = SessionStore::open(path);
        assert!(!reloaded.is_logged_in());
    }

    #[test]
    fn test_update_identity_keeps_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.login("tok".to_string(), identity());

        store.update_identity("Countess Ada".to_string(), Some("http://a/b.png".to_string()));

        assert_eq!(store.token().as_deref(), Some("tok"));
        let user = store.identity().unwrap();
        assert_eq!(user.name, "Countess Ada");
        assert_eq!(user.image_url.as_deref(), Some("http://a/b.png"));
        assert_eq!(user.username, "ada");
    }

    #[test]
    fn test_update_identity_without_session_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.update_identity("Nobody".to_string(), None);
        assert!(store.identity().is_none());
    }

    #[test]
    fn test_theme_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::open(path.clone());
        assert_eq!(store.theme(), Theme::Dark);
        store.set_theme(Theme::Light);

        let reloaded = SessionStore::open(path);
        assert_eq!(reloaded.theme(), Theme::Light);
    }

    #[test]
    fn test_corrupt_file_starts_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let store = SessionStore::open(path);
        assert!(!store.is_logged_in());
        assert_eq!(store.theme(), Theme::Dark);
    }
}
