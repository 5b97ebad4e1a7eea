//! Commands forwarding to the protocol relay.
//!
//! - `-open [uri]` connects
//! - `-init` runs the session bootstrap
//! - `- <cmd> [args..]` sends on the generic channel
//! - `! <cmd..>` sends a shell command
//! - `: <cmd..>` sends a raw debugger command

use super::CommandRegistry;
use crate::console::ConsoleCore;
use crate::error::ConsoleError;
use crate::relay::Channel;
use crate::Result;

/// Quick-pick snippets installed with every console.
pub const DEFAULT_SNIPPETS: [&str; 2] = [
    ": /_assets/tools/gdb/gdb-7.5/build/gdb/gdb --interpreter mi dev_0",
    ": source /usr/local/go/src/pkg/runtime/runtime-gdb.py",
];

fn open(core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    if let Some(uri) = args.first() {
        core.relay_mut().set_uri(uri.as_str());
    }
    core.relay_mut().open()?;
    Ok(true)
}

fn init(core: &mut ConsoleCore, _args: &[String]) -> Result<bool> {
    core.start_bootstrap()?;
    Ok(true)
}

fn send_on(channel: Channel, core: &mut ConsoleCore, args: &[String]) -> Result<bool> {
    let Some((name, rest)) = args.split_first() else {
        return Err(ConsoleError::InvalidArgument {
            command: channel.to_string(),
            value: String::new(),
        });
    };
    let shadow = core.shadow().clone();
    shadow.apply(channel.as_str(), args, || {
        core.relay_mut().send(channel, name, rest)
    })?;
    Ok(true)
}

/// Register the relay commands.
pub fn register(registry: &mut CommandRegistry) {
    registry.register("-open", open, false);
    registry.register("-init", init, false);
    registry.register("-", |core, args| send_on(Channel::Generic, core, args), true);
    registry.register("!", |core, args| send_on(Channel::Shell, core, args), true);
    registry.register(":", |core, args| send_on(Channel::Debug, core, args), true);
}
