//! Bearer-token session and the login/logout flow.
//!
//! There is no dedicated auth endpoint: a token is valid when an
//! authenticated `GET /list` succeeds. A token can be remembered in
//! client storage and is read back at startup for a silent re-login.

use crate::api::{ApiError, WatchtowerApi};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Storage key holding the remembered token
pub const TOKEN_KEY: &str = "token";

/// The in-memory bearer token, shared with the API client
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_token(&self, token: &str) {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token.to_string();
    }

    pub fn clear(&self) {
        self.set_token("");
    }
}

/// Durable client-side key/value storage
pub trait TokenStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Remove every stored key, not only the token
    fn clear(&mut self) -> Result<()>;
}

/// One file per key inside a storage directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(anyhow!("Invalid storage key: {:?}", key));
        }
        Ok(self.dir.join(key))
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let value = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        std::fs::write(&path, value)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // The token is stored in plaintext; keep it owner-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

pub struct AuthManager<S: TokenStore> {
    session: Arc<Session>,
    store: S,
}

impl<S: TokenStore> AuthManager<S> {
    pub fn new(session: Arc<Session>, store: S) -> Self {
        Self { session, store }
    }

    /// Re-authenticate with a remembered token, if there is one.
    /// Any failure, including an unreadable store, means "not logged in".
    pub fn check_login(&mut self, api: &dyn WatchtowerApi) -> bool {
        let saved = match self.store.get(TOKEN_KEY) {
            Ok(Some(token)) => token,
            _ => return false,
        };
        self.log_in(api, &saved, false).unwrap_or(false)
    }

    /// Validate `secret` with an authenticated list request.
    ///
    /// Only the status counts: a 2xx with an unexpected body still accepts
    /// the token. Returns `Ok(false)` when the server rejects the token and
    /// an error when it could not be reached. The in-memory token is cleared
    /// in both cases.
    pub fn log_in(&mut self, api: &dyn WatchtowerApi, secret: &str, remember: bool) -> Result<bool> {
        if secret.is_empty() {
            self.session.clear();
            return Ok(false);
        }

        self.session.set_token(secret);
        match api.list() {
            Ok(_) | Err(ApiError::Decode(_)) => {
                if remember {
                    self.store.set(TOKEN_KEY, secret)?;
                }
                Ok(true)
            }
            Err(e) if e.is_status() => {
                self.session.clear();
                Ok(false)
            }
            Err(e) => {
                self.session.clear();
                Err(anyhow!(e).context("Login probe failed"))
            }
        }
    }

    /// Drop the token and wipe everything in client storage.
    pub fn log_out(&mut self) -> Result<()> {
        self.session.clear();
        self.store.clear()
    }
}
