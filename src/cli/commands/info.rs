//! info command - Show metadata of an entry or container

use crate::cli::Context;
use crate::core::info::RepositoryInfo;
use crate::ui::output;
use anyhow::{anyhow, Result};

/// Show metadata of a path, including deleted nodes.
pub fn info(ctx: &Context, path: &str) -> Result<()> {
    let repo = ctx.open_repository()?;
    let info = repo
        .information(path)?
        .ok_or_else(|| anyhow!("'{path}' does not exist"))?;

    if ctx.json {
        return output::json(info.as_ref());
    }

    println!("Path: {}", info.path());
    match info.as_ref() {
        RepositoryInfo::Container(c) => {
            println!("Kind: container");
            println!("Deleted: {}", if c.deleted { "yes" } else { "no" });
        }
        RepositoryInfo::Entry(e) => {
            println!("Kind: entry");
            println!("Revisions: {}", e.num_versions());
            let visible = e.num_versions_for(Some(&ctx.user));
            if visible != e.num_versions() {
                println!("Visible to you: {visible}");
            }
            println!("Author: {}", e.author());
            println!("Deleted: {}", if e.is_deleted() { "yes" } else { "no" });
            println!("Lock: {}", output::format_lock(e.lock()));
        }
    }
    if let Some(when) = info.last_modified() {
        println!("Modified: {}", when.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}
