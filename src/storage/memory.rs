//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::Storage;
use crate::error::ConsoleError;
use crate::Result;

/// Map-backed storage.
///
/// Clones share the same underlying map, so a host (or a test) can keep a
/// handle and inspect what the console persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
    read_only: bool,
}

impl MemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose writes always fail.
    ///
    /// Mirrors a host where persistence is unavailable (quota exceeded,
    /// private browsing, read-only media).
    pub fn read_only() -> Self {
        Self {
            values: Arc::default(),
            read_only: true,
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.read_only {
            return Err(ConsoleError::Storage(format!(
                "unable to write '{}': storage is read-only",
                key
            )));
        }
        let mut values = self
            .values
            .lock()
            .map_err(|_| ConsoleError::LockPoisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ConsoleError::LockPoisoned)?;
        values.remove(key);
        Ok(())
    }
}
