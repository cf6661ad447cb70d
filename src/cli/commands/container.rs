//! Container commands - mkdir, rmdir, ls

use crate::cli::Context;
use crate::core::paths::RepoPath;
use crate::ui::output;
use anyhow::{bail, Result};
use serde_json::json;

/// Create a container from its full path.
pub fn mkdir(ctx: &Context, path: &str) -> Result<()> {
    let logical = RepoPath::parse(path)?;
    let (Some(parent), Some(name)) = (logical.parent(), logical.name()) else {
        bail!("cannot create the repository root");
    };

    let repo = ctx.open_repository()?;
    let created = repo.mkdir(parent.as_str(), name)?;
    if !created && !repo.exists(logical.as_str())? {
        bail!("parent container '{parent}' does not exist");
    }

    if ctx.json {
        return output::json(&json!({ "path": logical, "created": created }));
    }
    if created {
        output::print(format!("Created {logical}"), ctx.verbosity);
    } else {
        output::print(format!("{logical} already exists"), ctx.verbosity);
    }
    Ok(())
}

pub fn rmdir(ctx: &Context, path: &str) -> Result<()> {
    let repo = ctx.open_repository()?;
    if !repo.rmdir(path)? {
        bail!("'{path}' still holds entries or containers");
    }

    if ctx.json {
        return output::json(&json!({ "path": path, "removed": true }));
    }
    output::print(format!("Removed {path}"), ctx.verbosity);
    Ok(())
}

/// List a container's children, deleted ones included.
pub fn ls(ctx: &Context, path: &str) -> Result<()> {
    let repo = ctx.open_repository()?;
    let children = repo.entries(path)?;

    if ctx.json {
        let values: Vec<_> = children.iter().map(|c| c.as_ref()).collect();
        return output::json(&values);
    }
    for child in &children {
        println!("{}", output::format_info_line(child));
    }
    Ok(())
}
