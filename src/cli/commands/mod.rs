//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository from the [`Context`]
//! 2. Calls one [`crate::engine::Repository`] operation
//! 3. Formats and displays output (text or `--json`)
//!
//! Handlers do NOT touch the repository directory directly.

mod completion;
mod container;
mod entry;
mod export;
mod info;
mod init;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use container::{ls, mkdir, rmdir};
pub use entry::{cat, lock, log, put, rm, unlock};
pub use export::{export, rebuild_workarea};
pub use info::info;
pub use init::init;

use super::args::{Command, WorkareaAction};
use super::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init { write_config } => init::init(ctx, write_config),
        Command::Put { path, file } => entry::put(ctx, &path, file.as_deref()),
        Command::Cat { path, revision } => entry::cat(ctx, &path, revision),
        Command::Lock { path } => entry::lock(ctx, &path),
        Command::Unlock { path } => entry::unlock(ctx, &path),
        Command::Rm { path, force } => entry::rm(ctx, &path, force),
        Command::Log { path } => entry::log(ctx, &path),
        Command::Mkdir { path } => container::mkdir(ctx, &path),
        Command::Rmdir { path } => container::rmdir(ctx, &path),
        Command::Ls { path } => container::ls(ctx, &path),
        Command::Info { path } => info::info(ctx, &path),
        Command::Export { path, target } => export::export(ctx, &path, &target),
        Command::Workarea { action } => match action {
            WorkareaAction::Rebuild { path } => export::rebuild_workarea(ctx, &path),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
