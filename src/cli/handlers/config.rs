use crate::cli::Args;
use crate::config::KeywardenConfig;
use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use std::path::Path;

pub fn handle_gen_config(output: &Path) -> Result<()> {
    let toml_content = KeywardenConfig::default_toml()?;
    std::fs::write(output, toml_content)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

pub fn handle_completions(shell: Shell) -> Result<()> {
    let mut command = Args::command();
    clap_complete::generate(shell, &mut command, "keywarden", &mut std::io::stdout());
    Ok(())
}
