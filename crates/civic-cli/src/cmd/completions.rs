use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `civic completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to stdout.
///
/// # Errors
///
/// Never fails today; kept fallible to match the other command runners.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    let mut out = std::io::stdout();
    generate(shell, command, "civic", &mut out);
    Ok(())
}
