use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

/// Print the completion script, or write it to `output_path`. A directory
/// receives the file name the shell's completion loader looks for.
pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();
    let script = match shell {
        CompletionShell::Bash => render(shells::Bash, &mut command, &bin_name),
        CompletionShell::Zsh => render(shells::Zsh, &mut command, &bin_name),
        CompletionShell::Fish => render(shells::Fish, &mut command, &bin_name),
    };

    match output_path {
        Some(path) => {
            let path = script_path(path, shell, &bin_name);
            std::fs::write(&path, &script)?;
            println!("{}", path.display());
        }
        None => io::stdout().write_all(&script)?,
    }
    Ok(())
}

fn render<G: Generator>(generator: G, command: &mut clap::Command, bin_name: &str) -> Vec<u8> {
    let mut script = Vec::new();
    generate(generator, command, bin_name, &mut script);
    script
}

fn script_path(path: &Path, shell: CompletionShell, bin_name: &str) -> PathBuf {
    if !path.is_dir() {
        return path.to_path_buf();
    }
    let file_name = match shell {
        CompletionShell::Bash => bin_name.to_string(),
        CompletionShell::Zsh => format!("_{bin_name}"),
        CompletionShell::Fish => format!("{bin_name}.fish"),
    };
    path.join(file_name)
}
