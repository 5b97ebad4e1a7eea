//! Alias-to-handler registry.

use std::sync::Arc;

use tracing::debug;

use crate::console::ConsoleCore;
use crate::Result;

/// A command handler.
///
/// Receives the console state and the whitespace-separated arguments that
/// followed the alias. Returning `Ok(true)` scrolls the output to the bottom.
pub type Handler = Arc<dyn Fn(&mut ConsoleCore, &[String]) -> Result<bool> + Send + Sync>;

/// A registered command.
#[derive(Clone)]
pub struct CommandEntry {
    pub alias: String,
    pub handler: Handler,
    pub quick_pick: bool,
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("alias", &self.alias)
            .field("quick_pick", &self.quick_pick)
            .finish_non_exhaustive()
    }
}

/// Ordered command table plus the quick-pick list.
///
/// The quick-pick list holds command aliases and free-form snippets, most
/// recently added first, each at most once.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
    quick_picks: Vec<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias`.
    ///
    /// Re-registering keeps the alias's position and quick-pick membership
    /// and only swaps the handler.
    pub fn register<F>(&mut self, alias: &str, handler: F, quick_pick: bool)
    where
        F: Fn(&mut ConsoleCore, &[String]) -> Result<bool> + Send + Sync + 'static,
    {
        self.register_handler(alias, Arc::new(handler), quick_pick);
    }

    /// Register a shared handler.
    pub fn register_handler(&mut self, alias: &str, handler: Handler, quick_pick: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.alias == alias) {
            debug!(alias, "replacing command handler");
            entry.handler = handler;
            return;
        }
        self.entries.push(CommandEntry {
            alias: alias.to_string(),
            handler,
            quick_pick,
        });
        if quick_pick {
            self.add_quick_pick(alias);
        }
    }

    fn add_quick_pick(&mut self, value: &str) -> bool {
        if self.quick_picks.iter().any(|q| q == value) {
            return false;
        }
        self.quick_picks.insert(0, value.to_string());
        true
    }

    /// Add a free-form quick-pick value. Returns `false` if it was already listed.
    pub fn add_snippet(&mut self, value: &str) -> bool {
        self.add_quick_pick(value)
    }

    /// Look up a handler.
    pub fn get(&self, alias: &str) -> Option<Handler> {
        self.entries
            .iter()
            .find(|e| e.alias == alias)
            .map(|e| e.handler.clone())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.iter().any(|e| e.alias == alias)
    }

    /// Aliases in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.alias.as_str())
    }

    /// Quick-pick values, most recent first.
    pub fn quick_picks(&self) -> &[String] {
        &self.quick_picks
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
