//! Shared evaluation environment.

use std::collections::BTreeMap;

use serde_json::Value;

/// Variables visible to command handlers and the expression fallback.
///
/// The host owns the console and can seed this environment with values it
/// wants to inspect from the prompt.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    vars: BTreeMap<String, Value>,
}

impl EvalContext {
    /// Create a new empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Set a variable, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    /// Remove a variable.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Variable names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Resolve a path such as `target.frames[0].func`.
    ///
    /// Returns `None` when the root variable is missing or any segment
    /// does not resolve.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = split_path(path)?.into_iter();
        let root = match segments.next()? {
            Segment::Key(name) => self.vars.get(name)?,
            Segment::Index(_) => return None,
        };
        segments.try_fold(root, |value, segment| match segment {
            Segment::Key(key) => value.get(key),
            Segment::Index(i) => value.get(i),
        })
    }

    /// Export all variables as one JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.vars.clone().into_iter().collect())
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn split_path(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            if !is_identifier(key) {
                return None;
            }
            segments.push(Segment::Key(key));
        } else if segments.is_empty() {
            return None;
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let index = rest.get(1..close)?.trim().parse().ok()?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Check whether `path` is a syntactically valid lookup path.
pub fn is_path(path: &str) -> bool {
    split_path(path).is_some()
}

/// Check whether `name` is a valid variable name.
pub fn is_variable_name(name: &str) -> bool {
    is_identifier(name)
}
