//! export and workarea commands - Copy released content out of the repository

use crate::cli::Context;
use crate::core::storage::FsContainer;
use crate::engine::ExportStats;
use crate::ui::output;
use anyhow::{Context as _, Result};
use std::path::Path;

/// Export the released state below `path` into an existing directory.
pub fn export(ctx: &Context, path: &str, target: &Path) -> Result<()> {
    let repo = ctx.open_repository()?;
    let stats = repo
        .export(path, &FsContainer::new(target))
        .with_context(|| format!("Failed to export to '{}'", target.display()))?;
    report(ctx, &stats, &format!("Exported to {}", target.display()))
}

/// Refresh the configured work area below `path`.
pub fn rebuild_workarea(ctx: &Context, path: &str) -> Result<()> {
    let repo = ctx.open_repository()?;
    let stats = repo.rebuild_work_area(path)?;
    report(ctx, &stats, "Rebuilt work area")
}

fn report(ctx: &Context, stats: &ExportStats, headline: &str) -> Result<()> {
    if ctx.json {
        return output::json(stats);
    }
    output::print(
        format!(
            "{headline}: {} entries, {} containers",
            stats.entries, stats.containers
        ),
        ctx.verbosity,
    );
    Ok(())
}
