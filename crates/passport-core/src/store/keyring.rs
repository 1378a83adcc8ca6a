use std::sync::Arc;

use ::keyring::Entry;
use chrono::{DateTime, Utc};

use super::{SlotStore, StoreError, StoredSlot};
use crate::clock::{Clock, SystemClock};

const SERVICE_NAME: &str = "gwin-passport";

/// Slot store backed by the OS keychain, one entry per slot.
///
/// The keychain has no notion of expiry, so each entry holds a JSON
/// [`StoredSlot`] and expiry is checked on read.
pub struct KeyringStore {
    service: String,
    clock: Arc<dyn Clock>,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a separate keychain service, e.g. one per account environment
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: &str, now: DateTime<Utc>) -> Result<Option<String>, StoreError> {
    let slot: StoredSlot = serde_json::from_str(raw)?;
    Ok((!slot.is_expired(now)).then_some(slot.value))
}

impl SlotStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(raw) => decode(&raw, self.clock.now()),
            Err(::keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str, expires: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&StoredSlot::new(value, expires))?;
        self.entry(key)?.set_password(&raw)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
