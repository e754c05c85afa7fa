//! Secure session persistence with keyring and file fallback
//!
//! The adapter owns the persisted token set. Read failures are swallowed and
//! treated as "no session" so the app falls open to the logged-out state;
//! write failures are logged but non-fatal, leaving the session memory-only
//! for the remainder of the process.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::types::Session;

const SERVICE_NAME: &str = "njambe";
const SESSION_KEY: &str = "session";

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// OS native keyring
    Keyring,
    /// JSON file in the user config directory
    File,
}

/// Persists and retrieves the opaque session token set.
pub struct SessionStore {
    backend: StorageBackend,
    file_path: Option<PathBuf>,
}

impl SessionStore {
    /// Create a new session store, preferring the OS keyring.
    pub fn new() -> Result<Self, AuthError> {
        if Self::test_keyring() {
            Ok(Self {
                backend: StorageBackend::Keyring,
                file_path: None,
            })
        } else {
            let file_path = Self::storage_file_path()?;
            Ok(Self {
                backend: StorageBackend::File,
                file_path: Some(file_path),
            })
        }
    }

    /// Create a file-backed store at an explicit path. Used on targets
    /// without a keyring and by tests.
    pub fn with_file(path: PathBuf) -> Self {
        Self {
            backend: StorageBackend::File,
            file_path: Some(path),
        }
    }

    fn test_keyring() -> bool {
        keyring::Entry::new(SERVICE_NAME, SESSION_KEY).is_ok()
    }

    fn storage_file_path() -> Result<PathBuf, AuthError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AuthError::Config("Could not find config directory".to_string()))?;

        let app_dir = config_dir.join("njambe");
        fs::create_dir_all(&app_dir)
            .map_err(|e| AuthError::Config(format!("Failed to create config directory: {}", e)))?;

        Ok(app_dir.join("session.json"))
    }

    /// Retrieve the persisted session, if any. Never fails: storage errors
    /// mean "no session".
    pub fn load(&self) -> Option<Session> {
        let result = match self.backend {
            StorageBackend::Keyring => self.load_keyring(),
            StorageBackend::File => self.load_file(),
        };
        match result {
            Ok(session) => session,
            Err(e) => {
                debug!("Session load failed, treating as logged out: {}", e);
                None
            }
        }
    }

    /// Persist the session. Failures are logged and otherwise ignored.
    pub fn save(&self, session: &Session) {
        let result = match self.backend {
            StorageBackend::Keyring => self.save_keyring(session),
            StorageBackend::File => self.save_file(session),
        };
        if let Err(e) = result {
            warn!("Failed to persist session, keeping it in memory only: {}", e);
        }
    }

    /// Remove any persisted session. Failures are logged and otherwise ignored.
    pub fn clear(&self) {
        let result = match self.backend {
            StorageBackend::Keyring => self.clear_keyring(),
            StorageBackend::File => self.clear_file(),
        };
        if let Err(e) = result {
            warn!("Failed to clear persisted session: {}", e);
        }
    }

    /// The backend selected at construction.
    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    fn load_keyring(&self) -> anyhow::Result<Option<Session>> {
        let entry = keyring::Entry::new(SERVICE_NAME, SESSION_KEY)?;
        match entry.get_password() {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_keyring(&self, session: &Session) -> anyhow::Result<()> {
        let entry = keyring::Entry::new(SERVICE_NAME, SESSION_KEY)?;
        let data = serde_json::to_string(session)?;
        entry.set_password(&data)?;
        Ok(())
    }

    fn clear_keyring(&self) -> anyhow::Result<()> {
        let entry = keyring::Entry::new(SERVICE_NAME, SESSION_KEY)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn file_path(&self) -> anyhow::Result<&PathBuf> {
        self.file_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No file path set"))
    }

    fn load_file(&self) -> anyhow::Result<Option<Session>> {
        let path = self.file_path()?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save_file(&self, session: &Session) -> anyhow::Result<()> {
        let path = self.file_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        fs::write(path, contents)?;

        // Session tokens are user-only on disk
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    fn clear_file(&self) -> anyhow::Result<()> {
        let path = self.file_path()?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
