//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file
//! - `--repo <path>`: Repository root (overrides the config file)
//! - `--workarea <path>` / `--attic <path>`: Optional mirror and attic
//! - `--user <name>` / `-u`: Act as this user (default: login name)
//! - `--json`: Machine-readable output
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rr - Versioned, lockable, file-backed object repository
#[derive(Parser, Debug)]
#[command(name = "rr")]
#[command(author, version, about, long_about = None)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Config file to use instead of the standard locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Repository root directory
    #[arg(long, global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Work-area directory mirroring released revisions
    #[arg(long, global = true, value_name = "PATH")]
    pub workarea: Option<PathBuf>,

    /// Attic directory receiving deleted entries
    #[arg(long, global = true, value_name = "PATH")]
    pub attic: Option<PathBuf>,

    /// Act as this user (default: login name)
    #[arg(short, long, global = true, value_name = "NAME")]
    pub user: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Acting user: `--user`, else the login name.
    pub fn user(&self) -> String {
        self.user.clone().unwrap_or_else(whoami::username)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the repository directories and optionally write a config file
    #[command(
        name = "init",
        long_about = "Create the repository directories.\n\n\
            Creates the repository root, and the work area and attic when \
            configured. With --write-config the effective settings are saved \
            to the config file (the --config path, or ~/.revrepo/config.toml).",
        after_help = "\
EXAMPLES:
    # One-off repository
    rr --repo /srv/repo init

    # Remember the location for later commands
    rr --repo /srv/repo --workarea /srv/work init --write-config"
    )]
    Init {
        /// Save the effective settings to the config file
        #[arg(long)]
        write_config: bool,
    },

    /// Store a new revision of an entry
    #[command(
        name = "put",
        long_about = "Store a new revision of an entry.\n\n\
            A new entry is created locked by you, with its first revision \
            visible only to you until you unlock it. An existing entry must be \
            locked by you: the first put after `rr lock` allocates a new \
            revision, later puts overwrite it until you unlock.",
        after_help = "\
WORKFLOW EXAMPLES:
    rr put /docs/plan.txt plan.txt     # create, revision 1 (provisional)
    rr unlock /docs/plan.txt           # release it
    rr lock /docs/plan.txt
    cat plan.txt | rr put /docs/plan.txt
    rr unlock /docs/plan.txt           # release revision 2"
    )]
    Put {
        /// Entry path inside the repository
        path: String,

        /// Content file (default: stdin)
        file: Option<PathBuf>,
    },

    /// Print the current (or a given) revision of an entry
    Cat {
        /// Entry path inside the repository
        path: String,

        /// Print this revision instead of the current one
        #[arg(short, long, value_name = "N")]
        revision: Option<u32>,
    },

    /// Lock an entry for writing
    Lock {
        /// Entry path inside the repository
        path: String,
    },

    /// Release a lock, publishing a pending revision
    Unlock {
        /// Entry path inside the repository
        path: String,
    },

    /// Delete an entry
    #[command(name = "rm")]
    Rm {
        /// Entry path inside the repository
        path: String,

        /// Delete even if the entry is locked
        #[arg(short, long)]
        force: bool,
    },

    /// Create a container
    Mkdir {
        /// Container path inside the repository
        path: String,
    },

    /// Remove a container
    Rmdir {
        /// Container path inside the repository
        path: String,
    },

    /// List the children of a container
    Ls {
        /// Container path inside the repository
        #[arg(default_value = "/")]
        path: String,
    },

    /// Show metadata of an entry or container
    Info {
        /// Path inside the repository
        path: String,
    },

    /// Show the revision history of an entry
    Log {
        /// Entry path inside the repository
        path: String,
    },

    /// Copy released content below a container into a directory
    Export {
        /// Container path inside the repository
        path: String,

        /// Existing target directory
        target: PathBuf,
    },

    /// Work-area maintenance
    Workarea {
        #[command(subcommand)]
        action: WorkareaAction,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Work-area subcommands.
#[derive(Subcommand, Debug)]
pub enum WorkareaAction {
    /// Refresh the work area from the repository
    Rebuild {
        /// Container path inside the repository
        #[arg(default_value = "/")]
        path: String,
    },
}

/// Supported shells for completion.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_put_with_globals() {
        let cli = Cli::try_parse_from([
            "rr", "--repo", "/srv/repo", "-u", "alice", "put", "/a.txt", "a.txt",
        ])
        .unwrap();
        assert_eq!(cli.repo, Some(PathBuf::from("/srv/repo")));
        assert_eq!(cli.user(), "alice");
        match cli.command {
            Command::Put { path, file } => {
                assert_eq!(path, "/a.txt");
                assert_eq!(file, Some(PathBuf::from("a.txt")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["rr", "cat", "/a", "-r", "2", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Cat {
                revision: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn later_flags_override_earlier() {
        let cli = Cli::try_parse_from(["rr", "-u", "alice", "-u", "bob", "ls"]).unwrap();
        assert_eq!(cli.user(), "bob");
    }

    #[test]
    fn ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["rr", "ls"]).unwrap();
        assert!(matches!(cli.command, Command::Ls { path } if path == "/"));
    }

    #[test]
    fn workarea_rebuild() {
        let cli = Cli::try_parse_from(["rr", "workarea", "rebuild", "/docs"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Workarea {
                action: WorkareaAction::Rebuild { path }
            } if path == "/docs"
        ));
    }

    #[test]
    fn completion_shells() {
        assert!(Cli::try_parse_from(["rr", "completion", "powershell"]).is_ok());
        assert!(Cli::try_parse_from(["rr", "completion", "tcsh"]).is_err());
    }
}
