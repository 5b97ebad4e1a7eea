//! Command registry, built-ins and the expression fallback.
//!
//! A submitted line is split on whitespace. If the first token is a
//! registered alias its handler runs with the remaining tokens; otherwise the
//! whole line goes to [`evaluate`].
//!
//! # Example
//!
//! ```
//! use nvlv_console::command::{tokenize, CommandRegistry};
//!
//! let mut registry = CommandRegistry::new();
//! registry.register(".ping", |core, _args| {
//!     core.output().trace("pong");
//!     Ok(true)
//! }, true);
//!
//! let (alias, args) = tokenize(".ping now").unwrap();
//! assert!(registry.contains(alias));
//! assert_eq!(args, vec!["now".to_string()]);
//! ```

pub mod builtins;
mod expr;
mod registry;
pub mod remote;

pub use expr::{evaluate, Evaluation};
pub use registry::{CommandEntry, CommandRegistry, Handler};

/// Split a line into its first token and the remaining arguments.
///
/// Returns `None` for a blank line.
pub fn tokenize(line: &str) -> Option<(&str, Vec<String>)> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    Some((first, tokens.map(str::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("   "), None);
        assert_eq!(tokenize(".cls"), Some((".cls", vec![])));
        assert_eq!(
            tokenize("-  -gdb-start   dev_0"),
            Some(("-", vec!["-gdb-start".to_string(), "dev_0".to_string()]))
        );
    }
}
