//! JSON-file slot store.
//!
//! All slots live in one pretty-printed JSON object keyed by slot name. The
//! file is re-read on every access so several processes see each other's
//! writes; within one process a mutex serializes read-modify-write cycles.
//!
//! A jar that no longer parses is reported by `get` and replaced by the next
//! `set` or `remove`, so a damaged file cannot pin a stale session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{SlotStore, StoreError, StoredSlot};
use crate::clock::{Clock, SystemClock};

type Jar = BTreeMap<String, StoredSlot>;

pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Jar, StoreError> {
        if !self.path.exists() {
            return Ok(Jar::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Jar::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load the jar for a read-modify-write cycle. A corrupt jar reads as
    /// empty; the flag tells the caller the file must be rewritten.
    fn load_for_write(&self) -> Result<(Jar, bool), StoreError> {
        match self.load() {
            Ok(jar) => Ok((jar, false)),
            Err(StoreError::Json(e)) => {
                warn!(path = %self.path.display(), error = %e, "Replacing corrupt slot file");
                Ok((Jar::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, jar: &Jar) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(jar)?;
        std::fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), slots = jar.len(), "Saved slot file");
        Ok(())
    }
}

impl SlotStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        Ok(self
            .load()?
            .remove(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.value))
    }

    fn set(&self, key: &str, value: &str, expires: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let (mut jar, _) = self.load_for_write()?;
        jar.retain(|_, slot| !slot.is_expired(now));
        jar.insert(key.to_string(), StoredSlot::new(value, expires));
        self.save(&jar)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut jar, corrupt) = self.load_for_write()?;
        if jar.remove(key).is_some() || corrupt {
            self.save(&jar)?;
        }
        Ok(())
    }
}
