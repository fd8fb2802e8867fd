use crate::config::KeywardenConfig;
use crate::inventory::Inventory;
use crate::keystore::KeyStore;
use crate::ssh::{RemoteAuth, RemoteTarget, StandardSshClient};
use anyhow::{anyhow, Result};

pub async fn handle_connect(config: &KeywardenConfig, name: &str) -> Result<()> {
    let inventory = Inventory::load(&config.inventory.path)?;
    let record = inventory.find(name)?;

    let keystore = KeyStore::new(&config.keys).await?;
    let auth = if keystore.has_active_pair(&record.name).await {
        RemoteAuth::Key(keystore.paths_for(&record.name).private)
    } else {
        RemoteAuth::Interactive
    };

    println!("Connecting to {} ({})...", record.name, record.connection_string());

    let client = StandardSshClient::new(config.ssh.clone());
    let status = client
        .interactive_shell(&RemoteTarget::from(record), &auth)
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("ssh to '{}' exited with {status}", record.name))
    }
}
