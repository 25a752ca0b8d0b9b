//! Lock / unlock command handlers.
//!
//! Runs the full optimistic protocol: the command call itself blocks
//! through the vendor's deferred-response window, then we run one
//! reconciling refresh so the printed end state is the confirmed one.

use std::sync::Arc;

use owo_colors::OwoColorize;

use uhome_core::{DeviceId, LockCommand, entity::LockEntity};

use crate::cli::{GlobalOpts, LockArgs};
use crate::error::CliError;
use crate::output;
use crate::runtime::Runtime;

pub async fn handle(
    runtime: &Runtime,
    cmd: LockCommand,
    args: LockArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    runtime.start().await?;

    let id = DeviceId::new(args.id.clone());
    let store = runtime.coordinator.store();
    let device = store
        .get(&id)
        .ok_or(CliError::DeviceNotFound { id: args.id })?;
    let entity = LockEntity::new(Arc::clone(store), &device)?;

    let verb = match cmd {
        LockCommand::Lock => "Locking",
        LockCommand::Unlock => "Unlocking",
    };
    if !global.quiet {
        println!("{verb} {} ({})...", device.name, device.id);
    }

    // Blocks through the deferred-response window.
    let deferred = runtime.coordinator.command(&id, cmd).await?;

    if !global.quiet {
        println!(
            "Command accepted after a {:.0}s deferred window",
            deferred.as_secs_f64()
        );
    }

    let state = if args.no_wait {
        // Report the assumed state as-is.
        entity.state()
    } else {
        // Reconcile on our own task rather than racing the poll task,
        // then render that update -- which also clears the assumed flag.
        runtime.coordinator.refresh_now().await;
        entity.handle_update();
        entity.state()
    };

    let state = state.ok_or_else(|| CliError::Config {
        message: "device disappeared from the store".into(),
    })?;

    let rendered = output::render_single(&global.output, &state, |s| {
        let lock_str = if s.is_locked {
            "Locked".green().to_string()
        } else if s.is_unlocked {
            "Unlocked".yellow().to_string()
        } else if s.is_jammed {
            "Jammed".red().to_string()
        } else {
            "Unknown".to_string()
        };
        let suffix = if s.assumed { " (assumed)" } else { "" };
        format!("{}: {lock_str}{suffix}", s.name)
    });
    println!("{rendered}");

    Ok(())
}
