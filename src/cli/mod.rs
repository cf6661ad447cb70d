//! cli
//!
//! Command-line interface layer for rr.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the tracing subscriber
//! - Resolve configuration and open the repository
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! handlers that call [`crate::engine::Repository`] on the filesystem
//! substrate. Handlers never touch the repository directory themselves.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::{Config, Overrides};
use crate::core::storage::FsContainer;
use crate::engine::{Repository, RepositoryOptions};
use crate::ui::output::Verbosity;

/// Per-invocation state shared by command handlers.
#[derive(Debug)]
pub struct Context {
    /// Effective configuration (file plus flags)
    pub config: Config,
    /// Explicit `--config` path, if given
    pub config_path: Option<std::path::PathBuf>,
    /// Acting user
    pub user: String,
    pub json: bool,
    pub verbosity: Verbosity,
}

impl Context {
    /// Open the configured repository on the local filesystem.
    pub fn open_repository(&self) -> Result<Repository<FsContainer>> {
        let root = self.config.repository_path()?;

        let mut options =
            RepositoryOptions::default().with_cache_capacity(self.config.cache_capacity());
        if let Some(dir) = self.config.workarea() {
            options = options.with_work_area(FsContainer::new(dir));
        }
        if let Some(dir) = self.config.attic() {
            options = options.with_attic(FsContainer::new(dir));
        }
        for user in self.config.superusers() {
            options = options.with_superuser(user.clone());
        }

        Repository::open_with(FsContainer::new(root), options)
            .with_context(|| format!("Failed to open repository at '{}'", root.display()))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    // Completion needs neither config nor repository
    if let args::Command::Completion { shell } = cli.command {
        return commands::completion(shell);
    }

    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(Overrides {
            repository: cli.repo.clone(),
            workarea: cli.workarea.clone(),
            attic: cli.attic.clone(),
        })
        .context("Invalid command-line settings")?;

    let ctx = Context {
        user: cli.user(),
        config,
        config_path: cli.config.clone(),
        json: cli.json,
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
    };

    commands::dispatch(cli.command, &ctx)
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise warnings only, or debug output for
/// this crate with `--debug`.
fn init_tracing(debug: bool) {
    let fallback = if debug { "warn,revrepo=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
