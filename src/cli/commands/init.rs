//! init command - Create the repository directories and optionally save the config

use crate::cli::Context;
use crate::core::config::Config;
use crate::ui::output;
use anyhow::{Context as _, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitReport {
    repository: PathBuf,
    workarea: Option<PathBuf>,
    attic: Option<PathBuf>,
    config_written: Option<PathBuf>,
}

/// Create the repository root (work area and attic follow on open).
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `write_config` - Save the effective settings to the config file
pub fn init(ctx: &Context, write_config: bool) -> Result<()> {
    let root = ctx.config.repository_path()?;
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create repository at '{}'", root.display()))?;
    ctx.open_repository()?;

    let config_written = if write_config {
        let path = match &ctx.config_path {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };
        Config::write(&path, &ctx.config.file)
            .with_context(|| format!("Failed to write config '{}'", path.display()))?;
        Some(path)
    } else {
        None
    };

    let report = InitReport {
        repository: root.to_path_buf(),
        workarea: ctx.config.workarea().map(PathBuf::from),
        attic: ctx.config.attic().map(PathBuf::from),
        config_written,
    };
    if ctx.json {
        return output::json(&report);
    }

    output::print(
        format!("Initialized repository at {}", report.repository.display()),
        ctx.verbosity,
    );
    if let Some(dir) = &report.workarea {
        output::print(format!("Work area: {}", dir.display()), ctx.verbosity);
    }
    if let Some(dir) = &report.attic {
        output::print(format!("Attic: {}", dir.display()), ctx.verbosity);
    }
    if let Some(path) = &report.config_written {
        output::print(format!("Wrote config to {}", path.display()), ctx.verbosity);
    }
    if !ctx.config.superusers().is_empty() {
        output::print(
            format!("Superusers: {}", ctx.config.superusers().join(", ")),
            ctx.verbosity,
        );
    }
    Ok(())
}
