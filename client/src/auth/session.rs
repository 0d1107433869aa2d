use chrono::Utc;
use shared::CurrentUser;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::jwt;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Session expired, please log in again")]
    Expired,
    #[error("Token store error: {0}")]
    Store(#[from] io::Error),
}

/// File-backed persistence for the bearer token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>, io::Error> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes the token readable by the owner only.
    pub fn save(&self, token: &str) -> Result<(), io::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path)?;
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(token.as_bytes())
    }

    pub fn clear(&self) -> Result<(), io::Error> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<CurrentUser>,
}

/// Authentication state shared by everything that talks to the backend.
///
/// Clones share the same state, so a logout triggered by one caller (an
/// expired token, a 401) is seen by all of them.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    store: Option<TokenStore>,
}

impl Session {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Restores a previously saved token, if any.
    pub fn with_store(store: TokenStore) -> Result<Self, SessionError> {
        let token = store.load()?;
        if token.is_some() {
            log::debug!("Restored token from {}", store.path().display());
        }
        Ok(Self {
            state: Arc::new(Mutex::new(SessionState { token, user: None })),
            store: Some(store),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn login(&self, token: String) -> Result<(), SessionError> {
        if let Some(store) = &self.store {
            store.save(&token)?;
        }
        let mut state = self.lock();
        state.token = Some(token);
        state.user = None;
        Ok(())
    }

    pub fn set_user(&self, user: CurrentUser) {
        self.lock().user = Some(user);
    }

    pub fn user(&self) -> Option<CurrentUser> {
        self.lock().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock()
            .token
            .as_deref()
            .is_some_and(|token| !jwt::is_expired(token, Utc::now()))
    }

    /// Drops the token from memory and from the store.
    pub fn logout(&self) {
        {
            let mut state = self.lock();
            state.token = None;
            state.user = None;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                log::error!(
                    "Failed to remove token file {}: {}",
                    store.path().display(),
                    e
                );
            }
        }
    }

    /// Token for an authenticated call. An expired token ends the session
    /// here, before anything is sent.
    pub fn bearer_token(&self) -> Result<String, SessionError> {
        let token = self.token().ok_or(SessionError::NotLoggedIn)?;
        if jwt::is_expired(&token, Utc::now()) {
            log::warn!("Stored token has expired, logging out");
            self.logout();
            return Err(SessionError::Expired);
        }
        Ok(token)
    }
}
