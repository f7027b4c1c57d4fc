//! API credentials and the persisted session token.
//!
//! Both are pre-flight requirements: they are checked before any network
//! call and fail with a configuration error when absent.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppError, Result};

pub const API_ID_VAR: &str = "TELEGRAM_API_ID";
pub const API_HASH_VAR: &str = "TELEGRAM_API_HASH";

/// Application credentials issued by the chat service.
#[derive(Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"***")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// # Errors
    /// Returns a configuration error if either variable is missing or invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup.
    ///
    /// # Errors
    /// Returns a configuration error if either value is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_id = lookup(API_ID_VAR).filter(|v| !v.trim().is_empty());
        let api_hash = lookup(API_HASH_VAR).filter(|v| !v.trim().is_empty());

        let (Some(api_id), Some(api_hash)) = (api_id, api_hash) else {
            return Err(AppError::config(format!(
                "{API_ID_VAR} and {API_HASH_VAR} must be set in environment"
            )));
        };

        let api_id = api_id
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("{API_ID_VAR} must be an integer")))?;

        Ok(Self {
            api_id,
            api_hash: api_hash.trim().to_string(),
        })
    }
}

/// Opaque session token returned by the remote after authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// File-backed session token storage.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the token, treating an absent or blank file as "not logged in".
    ///
    /// # Errors
    /// Returns a configuration error if no session is stored.
    pub fn load(&self) -> Result<SessionToken> {
        self.load_optional()?.ok_or_else(|| {
            AppError::config("Not authenticated. Run 'tg-export authenticate' first")
        })
    }

    /// Load the token if one is stored.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn load_optional(&self) -> Result<Option<SessionToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| AppError::io(format!("Failed to read {}", self.path.display()), e))?;
        let token = raw.trim();

        Ok((!token.is_empty()).then(|| SessionToken::new(token)))
    }

    /// Persist the token.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self, token: &SessionToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AppError::io("Failed to create session directory", e))?;
            }
        }

        fs::write(&self.path, token.as_str())
            .map_err(|e| AppError::io(format!("Failed to write {}", self.path.display()), e))?;

        tracing::info!(path = %self.path.display(), "Session saved");
        Ok(())
    }
}
