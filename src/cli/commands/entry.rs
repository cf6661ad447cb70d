//! Entry commands - put, cat, lock, unlock, rm, log

use crate::cli::Context;
use crate::ui::output;
use anyhow::{bail, Context as _, Result};
use serde_json::json;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Store a new revision from a file or stdin.
pub fn put(ctx: &Context, path: &str, file: Option<&Path>) -> Result<()> {
    let repo = ctx.open_repository()?;

    let content: Box<dyn Read> = match file {
        Some(file) if file != Path::new("-") => Box::new(
            File::open(file).with_context(|| format!("Failed to open '{}'", file.display()))?,
        ),
        _ => Box::new(io::stdin().lock()),
    };
    let revision = repo.create(&ctx.user, path, content)?;

    if ctx.json {
        return output::json(&json!({ "path": path, "revision": revision }));
    }
    output::print(
        format!("{path}: revision {revision} (pending until `rr unlock`)"),
        ctx.verbosity,
    );
    Ok(())
}

/// Copy a revision to stdout.
pub fn cat(ctx: &Context, path: &str, revision: Option<u32>) -> Result<()> {
    let repo = ctx.open_repository()?;
    let mut reader = match revision {
        Some(n) => repo.get_revision(path, n)?,
        None => repo.get(&ctx.user, path)?,
    };
    let mut stdout = io::stdout().lock();
    io::copy(&mut reader, &mut stdout).context("Failed to write to stdout")?;
    Ok(())
}

pub fn lock(ctx: &Context, path: &str) -> Result<()> {
    let repo = ctx.open_repository()?;
    if !repo.lock(&ctx.user, path)? {
        let holder = repo
            .information(path)?
            .and_then(|info| info.as_entry().and_then(|e| e.locker().map(String::from)))
            .unwrap_or_else(|| "another user".to_string());
        bail!("'{path}' is locked by {holder}");
    }

    if ctx.json {
        return output::json(&json!({ "path": path, "locked_by": ctx.user }));
    }
    output::print(format!("Locked {path}"), ctx.verbosity);
    Ok(())
}

pub fn unlock(ctx: &Context, path: &str) -> Result<()> {
    let repo = ctx.open_repository()?;
    if !repo.unlock(&ctx.user, path)? {
        bail!("'{path}' is locked by another user; only they or a superuser can unlock it");
    }

    if ctx.json {
        return output::json(&json!({ "path": path, "unlocked": true }));
    }
    output::print(format!("Unlocked {path}"), ctx.verbosity);
    Ok(())
}

/// Delete an entry, printing the tombstone revision (0 when moved to the attic).
pub fn rm(ctx: &Context, path: &str, force: bool) -> Result<()> {
    let repo = ctx.open_repository()?;
    let revision = repo.delete(&ctx.user, path, force)?;

    if ctx.json {
        return output::json(&json!({ "path": path, "revision": revision }));
    }
    if revision == 0 {
        output::print(format!("Moved {path} to the attic"), ctx.verbosity);
    } else {
        output::print(format!("Deleted {path} (revision {revision})"), ctx.verbosity);
    }
    Ok(())
}

/// Print an entry's revision history.
pub fn log(ctx: &Context, path: &str) -> Result<()> {
    let repo = ctx.open_repository()?;
    let versions = repo.versions(path)?;

    if ctx.json {
        return output::json(&versions);
    }
    for version in &versions {
        println!("{}", output::format_version_line(version));
    }
    Ok(())
}
