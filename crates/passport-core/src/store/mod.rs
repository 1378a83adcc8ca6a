//! Persisted slot storage.
//!
//! A slot is a named string value with its own optional expiry, the same
//! model as a browser cookie. The session manager mirrors its state into
//! five slots (see [`slots`]); backends decide where they live:
//! - `MemoryStore`: process memory, for tests and short-lived hosts
//! - `CookieStore`: a cookie jar scoped to the console domain
//! - `FileStore`: a JSON jar file on disk
//! - `KeyringStore`: the OS keychain
//!
//! Reading an expired slot behaves as if it were never written.

pub mod cookie;
pub mod file;
pub mod keyring;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::cookie::CookieStore;
pub use self::file::FileStore;
pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;

/// Slot names shared with the browser client. Do not rename.
pub mod slots {
    /// Credential record as JSON
    pub const SIGN_INFO: &str = "ACCOUNT_SIGNIN_INFO_KEY";
    /// Profile record as JSON
    pub const USER_BASIC_INFO: &str = "ACCOUNT_USER_BASIC_INFO_KEY";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const USER_ID: &str = "userId";
    /// Tenant id
    pub const ENTITY_ID: &str = "entityId";

    pub const ALL: [&str; 5] = [SIGN_INFO, USER_BASIC_INFO, ACCESS_TOKEN, USER_ID, ENTITY_ID];
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt slot data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] ::keyring::Error),

    #[error("Expiry out of range: {0}")]
    Expiry(String),
}

/// Key-value storage with per-slot expiry.
pub trait SlotStore: Send + Sync {
    /// Read a slot. Expired slots read as `None`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Create or overwrite a slot. `None` leaves the lifetime to the backend.
    fn set(&self, key: &str, value: &str, expires: Option<DateTime<Utc>>) -> Result<(), StoreError>;

    /// Remove a slot. Removing an absent slot is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// A slot value with its expiry, as kept by the memory, file and keychain backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSlot {
    pub value: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSlot {
    pub fn new(value: &str, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.to_string(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}
