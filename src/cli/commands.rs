use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Open an interactive SSH session to an inventory host
    Connect {
        /// Host name as listed in the inventory
        name: String,
    },

    /// Rotate the key pair for one host
    #[command(name = "rotatekey")]
    RotateKey {
        /// Host name as listed in the inventory
        name: String,
    },

    /// Rotate the key pairs for every inventory host, in CSV row order
    #[command(name = "rotateallkeys")]
    RotateAllKeys,

    /// Remove a host's key pair, locally and remotely
    #[command(name = "removekey")]
    RemoveKey {
        /// Host name as listed in the inventory
        name: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Remove every host's key pair, in CSV row order
    #[command(name = "removeallkeys")]
    RemoveAllKeys {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List the inventory hosts and their local key state
    List,

    /// Write the default configuration file
    GenConfig {
        #[arg(short, long, default_value = "keywarden.toml")]
        output: PathBuf,
    },

    /// Generate shell completions on stdout
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
