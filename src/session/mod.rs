//! Session state module.
//!
//! This module provides the per-console state that outlives a single
//! command: instance identification, the relay's connection state, the
//! shared evaluation environment, and persisted settings.

mod context;
mod id;
mod state;
mod store;

pub use context::{is_path, is_variable_name, EvalContext};
pub use id::InstanceId;
pub use state::ConnectionState;
pub use store::{Persistence, Settings, SETTINGS_KEY};
