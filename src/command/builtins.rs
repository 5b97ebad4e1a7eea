//! Console built-in commands.

use serde_json::Value;

use super::CommandRegistry;
use crate::console::ConsoleCore;
use crate::error::ConsoleError;
use crate::modal::Purpose;
use crate::Result;

fn invalid(command: &str, value: &str) -> ConsoleError {
    ConsoleError::InvalidArgument {
        command: command.to_string(),
        value: value.to_string(),
    }
}

/// Resolve a coordinate argument against `current`.
///
/// A plain number is absolute. A number carrying quote marks (`"10"`,
/// `'-5'`, `10"`) is a delta added to `current`.
pub fn coordinate(command: &str, arg: &str, current: f64) -> Result<f64> {
    let is_quote = |c: char| c == '"' || c == '\'';
    let relative = arg.contains(is_quote);
    let number: f64 = arg
        .replace(is_quote, "")
        .trim()
        .parse()
        .map_err(|_| invalid(command, arg))?;
    if !number.is_finite() {
        return Err(invalid(command, arg));
    }
    Ok(if relative { current + number } else { number })
}

fn flag(command: &str, arg: &str) -> Result<bool> {
    match arg {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(command, arg)),
    }
}

fn move_window(core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    let Some(left) = args.first() else {
        core.begin_directional(Purpose::Move);
        return Ok(true);
    };
    let geometry = core.geometry();
    let left = coordinate(".move", left, geometry.left)?;
    let top = match args.get(1) {
        Some(top) => coordinate(".move", top, geometry.top)?,
        None => geometry.top,
    };
    core.move_to(left, top);
    Ok(true)
}

fn resize_window(core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    let Some(width) = args.first() else {
        core.begin_directional(Purpose::Resize);
        return Ok(true);
    };
    let geometry = core.geometry();
    let width = coordinate(".size", width, geometry.width)?;
    let height = match args.get(1) {
        Some(height) => coordinate(".size", height, geometry.height)?,
        None => geometry.height,
    };
    core.resize_to(width, height);
    Ok(true)
}

fn scroll_view(core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    let Some(left) = args.first() else {
        core.begin_directional(Purpose::Scroll);
        return Ok(false);
    };
    let (current_left, current_top) = core.output().scroll_position();
    let left = coordinate(".scroll", left, current_left)?;
    let top = match args.get(1) {
        Some(top) => coordinate(".scroll", top, current_top)?,
        None => current_top,
    };
    core.output().scroll_to(left, top, false);
    Ok(false)
}

fn clear_output(core: &mut ConsoleCore, _args: &[String]) -> Result<bool> {
    core.output().clear();
    Ok(true)
}

fn error_catching(core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    let enabled = match args.first() {
        Some(arg) => arg == "true",
        None => !core.catch_errors(),
    };
    core.set_catch_errors(enabled);
    core.output()
        .trace(format!("Error catching enabled: {}", enabled));
    Ok(true)
}

fn visibility(core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    match args.first() {
        None => {
            let visible = core.is_visible();
            core.output()
                .trace(format!("Current visibility: {}", visible));
            Ok(visible)
        }
        Some(arg) => {
            core.set_visible(flag(".vis", arg)?);
            Ok(true)
        }
    }
}

/// `.cfg` shows the settings; `.cfg <key> <json>` updates one of them.
fn settings(core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    if let Some(key) = args.first() {
        let raw = args[1..].join(" ");
        if raw.is_empty() {
            return Err(invalid(".cfg", key));
        }
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        core.set_setting(key, value)?;
    }
    core.output().trace_value(core.settings().to_value());
    Ok(true)
}

/// Register the console built-ins.
pub fn register(registry: &mut CommandRegistry) {
    registry.register(".mv", move_window, false);
    registry.register(".move", move_window, true);
    registry.register(".sz", resize_window, false);
    registry.register(".size", resize_window, true);
    registry.register(".scroll", scroll_view, true);
    registry.register("...", scroll_view, false);
    registry.register(".cls", clear_output, true);
    registry.register(".errs", error_catching, true);
    registry.register(".vis", visibility, true);
    registry.register(".cfg", settings, false);
}
