//! Console instance identifier.

use std::fmt;
use std::str::FromStr;

use crate::error::ConsoleError;

/// Identifier namespacing one console's persisted state.
///
/// Two consoles embedded in the same host with different identifiers never
/// see each other's settings or history. Identifiers are short ASCII tokens
/// (letters, digits, `-`, `_`) so they can be spliced into storage keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    /// Identifier used when the host does not name its console.
    pub const GLOBAL: &'static str = "gbl";

    /// The shared default identifier.
    pub fn global() -> Self {
        Self(Self::GLOBAL.to_string())
    }

    /// Get the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix applied to every storage key owned by this instance.
    pub fn storage_prefix(&self) -> String {
        format!("nvlv_{}_", self.0)
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstanceId {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= 64
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ConsoleError::InvalidArgument {
                command: "instance id".to_string(),
                value: s.to_string(),
            })
        }
    }
}
