//! Free-form expression fallback.
//!
//! Input that does not start with a registered alias is evaluated against
//! the console's [`EvalContext`]. The grammar is deliberately small:
//!
//! ```text
//! expr       := assignment | value
//! assignment := name '=' value
//! value      := json-literal | 'single quoted' | path
//! path       := name ( '.' key | '[' index ']' )*
//! ```

use serde_json::Value;

use crate::error::ConsoleError;
use crate::session::{is_path, is_variable_name, EvalContext};
use crate::Result;

/// Result of evaluating a line.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// A value to echo.
    Value(Value),
    /// Evaluated for effect; nothing to echo.
    Quiet,
}

/// Evaluate `source` against `env`.
pub fn evaluate(source: &str, env: &mut EvalContext) -> Result<Evaluation> {
    let source = source.trim();
    if let Some((name, rhs)) = split_assignment(source) {
        let value = value(rhs, env)?;
        env.set(name, value);
        return Ok(Evaluation::Quiet);
    }
    value(source, env).map(Evaluation::Value)
}

fn value(source: &str, env: &EvalContext) -> Result<Value> {
    let source = source.trim();
    if source.is_empty() {
        return Err(ConsoleError::Expression("empty expression".into()));
    }
    if let Some(text) = single_quoted(source) {
        return Ok(Value::String(text));
    }
    if let Ok(literal) = serde_json::from_str::<Value>(source) {
        return Ok(literal);
    }
    if is_path(source) {
        return env
            .lookup(source)
            .cloned()
            .ok_or_else(|| ConsoleError::Undefined(source.to_string()));
    }
    Err(ConsoleError::Expression(format!(
        "unable to evaluate '{}'",
        source
    )))
}

/// Split `name = value`, ignoring `=` inside quotes and comparison operators.
fn split_assignment(source: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let bytes = source.as_bytes();
    for (i, c) in source.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    return None;
                }
                let name = source[..i].trim();
                return is_variable_name(name).then(|| (name, &source[i + 1..]));
            }
            _ => {}
        }
    }
    None
}

fn single_quoted(source: &str) -> Option<String> {
    let inner = source.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            '\'' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(src: &str, env: &mut EvalContext) -> Result<Evaluation> {
        evaluate(src, env)
    }

    #[test]
    fn test_literals() {
        let mut env = EvalContext::new();
        assert_eq!(eval("42", &mut env).unwrap(), Evaluation::Value(json!(42)));
        assert_eq!(
            eval(r#"{"a": [1, true]}"#, &mut env).unwrap(),
            Evaluation::Value(json!({"a": [1, true]}))
        );
        assert_eq!(eval("null", &mut env).unwrap(), Evaluation::Value(Value::Null));
    }

    #[test]
    fn test_single_quoted() {
        let mut env = EvalContext::new();
        assert_eq!(
            eval(r"'it\'s here'", &mut env).unwrap(),
            Evaluation::Value(json!("it's here"))
        );
        assert!(eval("'a'b'", &mut env).is_err());
    }

    #[test]
    fn test_assignment_is_quiet_then_visible() {
        let mut env = EvalContext::new();
        assert_eq!(eval("target = 'dev_0'", &mut env).unwrap(), Evaluation::Quiet);
        assert_eq!(eval("target", &mut env).unwrap(), Evaluation::Value(json!("dev_0")));
    }

    #[test]
    fn test_assign_from_path() {
        let mut env = EvalContext::new();
        env.set("frames", json!([{"func": "main.main"}]));
        eval("f = frames[0].func", &mut env).unwrap();
        assert_eq!(env.get("f"), Some(&json!("main.main")));
    }

    #[test]
    fn test_equals_inside_string_is_not_assignment() {
        let mut env = EvalContext::new();
        assert_eq!(
            eval("'a = b'", &mut env).unwrap(),
            Evaluation::Value(json!("a = b"))
        );
    }

    #[test]
    fn test_undefined_variable() {
        let mut env = EvalContext::new();
        let err = eval("nothing.here", &mut env).unwrap_err();
        assert!(matches!(err, ConsoleError::Undefined(ref name) if name == "nothing.here"));
    }

    #[test]
    fn test_garbage() {
        let mut env = EvalContext::new();
        assert!(matches!(
            eval("foo bar", &mut env),
            Err(ConsoleError::Expression(_))
        ));
        assert!(eval("a == b", &mut env).is_err());
        assert!(eval("", &mut env).is_err());
    }
}
