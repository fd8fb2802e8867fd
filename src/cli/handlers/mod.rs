use crate::cli::{Args, Command};
use crate::config::KeywardenConfig;
use anyhow::{Context, Result};

pub mod config;
pub mod connect;
pub mod keys;
pub mod list;

pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, args: Args) -> Result<()> {
        // gen-config and completions work without a loaded configuration.
        match &args.command {
            Command::GenConfig { output } => return config::handle_gen_config(output),
            Command::Completions { shell } => return config::handle_completions(*shell),
            _ => {}
        }

        let cfg = KeywardenConfig::load(args.config.as_deref())
            .context("failed to load configuration")?;

        match args.command {
            Command::Connect { name } => connect::handle_connect(&cfg, &name).await,
            Command::RotateKey { name } => keys::handle_rotate(&cfg, &name).await,
            Command::RotateAllKeys => keys::handle_rotate_all(&cfg).await,
            Command::RemoveKey { name, yes } => keys::handle_remove(&cfg, &name, yes).await,
            Command::RemoveAllKeys { yes } => keys::handle_remove_all(&cfg, yes).await,
            Command::List => list::handle_list(&cfg).await,
            Command::GenConfig { .. } | Command::Completions { .. } => unreachable!(),
        }
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
