use crate::config::KeywardenConfig;
use crate::inventory::Inventory;
use crate::keystore::KeyStore;
use anyhow::Result;

pub async fn handle_list(config: &KeywardenConfig) -> Result<()> {
    let inventory = Inventory::load(&config.inventory.path)?;
    if inventory.is_empty() {
        println!("Inventory is empty");
        return Ok(());
    }

    let keystore = KeyStore::new(&config.keys).await?;

    println!("{:<20} {:<30} KEY", "NAME", "TARGET");
    for record in inventory.hosts() {
        let key_state = if keystore.has_active_pair(&record.name).await {
            if keystore.has_backup_pair(&record.name).await {
                "active+backup"
            } else {
                "active"
            }
        } else {
            "none"
        };
        println!(
            "{:<20} {:<30} {key_state}",
            record.name,
            record.connection_string()
        );
    }

    Ok(())
}
