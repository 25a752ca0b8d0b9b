//! Command dispatch: bridges CLI args -> coordinator calls -> output.

pub mod auth;
pub mod config_cmd;
pub mod devices;
pub mod locks;
pub mod watch;

use uhome_core::LockCommand;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::runtime::Runtime;

/// Dispatch a coordinator-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    runtime: &Runtime,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(runtime, args, global).await,
        Command::Lock(args) => locks::handle(runtime, LockCommand::Lock, args, global).await,
        Command::Unlock(args) => locks::handle(runtime, LockCommand::Unlock, args, global).await,
        Command::Watch(args) => watch::handle(runtime, args, global).await,
        // Auth, Config, and Completions are handled before dispatch
        Command::Auth(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
