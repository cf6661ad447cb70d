//! completion command - Generate shell completion scripts

use crate::cli::args::{Cli, Shell};
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, shells};
use std::io::Write;

/// Generate shell completion scripts on stdout.
pub fn completion(shell: Shell) -> Result<()> {
    write_completion(shell, &mut std::io::stdout())
}

fn write_completion(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    match shell {
        Shell::Bash => generate(shells::Bash, &mut cmd, &name, out),
        Shell::Zsh => generate(shells::Zsh, &mut cmd, &name, out),
        Shell::Fish => generate(shells::Fish, &mut cmd, &name, out),
        Shell::PowerShell => generate(shells::PowerShell, &mut cmd, &name, out),
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_names_binary() {
        let mut buf = Vec::new();
        write_completion(Shell::Bash, &mut buf).unwrap();
        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("rr"));
        assert!(script.contains("workarea"));
    }
}
