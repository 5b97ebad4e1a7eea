//! Persisted console settings and write-through storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ConsoleError;
use crate::output::Output;
use crate::storage::Storage;
use crate::Result;

/// Storage key (after the instance prefix) holding the settings object.
pub const SETTINGS_KEY: &str = "cfg";

/// Persisted console state.
///
/// Loaded once at startup and merged over the defaults, so a stored object
/// missing some fields (or carrying unknown ones) still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub win_top: f64,
    pub win_left: f64,
    pub win_w: f64,
    pub win_h: f64,
    pub visible: bool,
    pub catch_errors: bool,
    /// History ring capacity.
    pub hist_max: usize,
    /// Index of the most recently written history slot, `-1` before the first write.
    pub hist_mem_idx: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            win_top: 90.0,
            win_left: 30.0,
            win_w: 400.0,
            win_h: 400.0,
            visible: true,
            catch_errors: false,
            hist_max: 100,
            hist_mem_idx: -1,
        }
    }
}

impl Settings {
    /// Structured form for display.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Update one field by its persisted name, e.g. `winTop` or `catchErrors`.
    pub fn set_field(&mut self, key: &str, value: Value) -> Result<()> {
        let mut object = match self.to_value() {
            Value::Object(object) => object,
            _ => return Err(ConsoleError::Dispatch("settings are not an object".into())),
        };
        if !object.contains_key(key) {
            return Err(ConsoleError::InvalidArgument {
                command: "setting".to_string(),
                value: key.to_string(),
            });
        }
        object.insert(key.to_string(), value.clone());
        let updated: Settings =
            serde_json::from_value(Value::Object(object)).map_err(|_| {
                ConsoleError::InvalidArgument {
                    command: key.to_string(),
                    value: value.to_string(),
                }
            })?;
        if updated.hist_max == 0 {
            return Err(ConsoleError::InvalidArgument {
                command: key.to_string(),
                value: value.to_string(),
            });
        }
        *self = updated;
        Ok(())
    }
}

/// Namespaced write-through access to the host's [`Storage`].
///
/// A failed write is traced to the console once per session and otherwise
/// ignored; reads never fail.
pub struct Persistence {
    storage: Box<dyn Storage>,
    prefix: String,
    output: Output,
    write_failed: bool,
}

impl Persistence {
    /// Create a persistence layer writing keys under `prefix`.
    pub fn new(storage: Box<dyn Storage>, prefix: impl Into<String>, output: Output) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            output,
            write_failed: false,
        }
    }

    /// Key prefix applied to every entry.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.storage.get(&self.key(key))
    }

    /// Write a value. Returns `false` if the write failed.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let full = self.key(key);
        match self.storage.set(&full, value) {
            Ok(()) => true,
            Err(e) => {
                self.write_failure(&full, e);
                false
            }
        }
    }

    /// Remove a value. Returns `false` if the removal failed.
    pub fn remove(&mut self, key: &str) -> bool {
        let full = self.key(key);
        match self.storage.remove(&full) {
            Ok(()) => true,
            Err(e) => {
                self.write_failure(&full, e);
                false
            }
        }
    }

    fn write_failure(&mut self, key: &str, error: ConsoleError) {
        warn!(key, error = %error, "storage write failed");
        if !self.write_failed {
            self.write_failed = true;
            self.output
                .trace(format!("Unable to write to storage: {}", error));
        }
    }

    /// Check whether any write has failed this session.
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// Load settings, merging the stored object over the defaults.
    pub fn load_settings(&self) -> Settings {
        let Some(raw) = self.get(SETTINGS_KEY) else {
            return Settings::default();
        };
        match serde_json::from_str::<Settings>(&raw) {
            Ok(mut settings) => {
                if settings.hist_max == 0 {
                    settings.hist_max = Settings::default().hist_max;
                }
                debug!(prefix = %self.prefix, "settings loaded");
                settings
            }
            Err(e) => {
                warn!(error = %e, "stored settings unreadable, using defaults");
                Settings::default()
            }
        }
    }

    /// Persist settings.
    pub fn save_settings(&mut self, settings: &Settings) -> bool {
        match serde_json::to_string(settings) {
            Ok(json) => self.set(SETTINGS_KEY, &json),
            Err(e) => {
                self.write_failure(SETTINGS_KEY, e.into());
                false
            }
        }
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("prefix", &self.prefix)
            .field("write_failed", &self.write_failed)
            .finish_non_exhaustive()
    }
}
