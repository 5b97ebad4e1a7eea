//! Key-value persistence backends.
//!
//! The console persists its settings and history slots as string values
//! under namespaced keys. Hosts supply a [`Storage`] implementation:
//!
//! - [`MemoryStorage`]: process-local map, nothing survives a restart
//! - [`FileStorage`]: a JSON object on disk, rewritten on every `set`
//!
//! # Example
//!
//! ```
//! use nvlv_console::storage::{MemoryStorage, Storage};
//!
//! let mut storage = MemoryStorage::new();
//! storage.set("nvlv_gbl_hist0", ".cls").unwrap();
//! assert_eq!(storage.get("nvlv_gbl_hist0").as_deref(), Some(".cls"));
//! ```

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::Result;

/// String key-value store used for write-through persistence.
pub trait Storage: Send {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`.
    fn remove(&mut self, key: &str) -> Result<()>;
}
