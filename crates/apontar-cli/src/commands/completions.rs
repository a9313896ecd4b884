use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};
use crate::commands::common::output_target;
use crate::error::CliError;

const BIN_NAME: &str = "apontar";

pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let script = completion_script(shell);

    match output_path {
        Some(path) => {
            let target = output_target(path, || completion_file_name(shell));
            std::fs::write(&target, &script)?;
            println!("{}", target.display());
        }
        None => io::stdout().write_all(&script)?,
    }

    Ok(())
}

pub fn completion_script(shell: CompletionShell) -> Vec<u8> {
    let mut command = Cli::command();
    let mut script = Vec::new();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut command, BIN_NAME, &mut script),
        CompletionShell::Zsh => generate(shells::Zsh, &mut command, BIN_NAME, &mut script),
        CompletionShell::Fish => generate(shells::Fish, &mut command, BIN_NAME, &mut script),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut command, BIN_NAME, &mut script);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut command, BIN_NAME, &mut script),
    }
    script
}

/// File name each shell looks for, e.g. `_apontar` for zsh.
pub fn completion_file_name(shell: CompletionShell) -> String {
    match shell {
        CompletionShell::Bash => shells::Bash.file_name(BIN_NAME),
        CompletionShell::Zsh => shells::Zsh.file_name(BIN_NAME),
        CompletionShell::Fish => shells::Fish.file_name(BIN_NAME),
        CompletionShell::PowerShell => shells::PowerShell.file_name(BIN_NAME),
        CompletionShell::Elvish => shells::Elvish.file_name(BIN_NAME),
    }
}
