use crate::config::KeywardenConfig;
use crate::confirm::{Confirmation, PresetConfirmation, TerminalConfirmation};
use crate::inventory::Inventory;
use crate::keystore::KeyStore;
use crate::removal::{KeyRemoval, RemovalOutcome, RemovalReport};
use crate::rotation::RotationSequencer;
use crate::ssh::StandardSshClient;
use anyhow::{anyhow, Result};
use std::sync::Arc;

pub async fn handle_rotate(config: &KeywardenConfig, name: &str) -> Result<()> {
    let inventory = Inventory::load(&config.inventory.path)?;
    let record = inventory.find(name)?;
    let sequencer = build_sequencer(config).await?;

    println!(
        "Rotating key for '{}' ({})...",
        record.name,
        record.connection_string()
    );

    let outcome = sequencer.rotate_host(record).await?;
    println!("{}: {outcome}", record.name);

    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("key rotation failed for '{}'", record.name))
    }
}

pub async fn handle_rotate_all(config: &KeywardenConfig) -> Result<()> {
    let inventory = Inventory::load(&config.inventory.path)?;
    if inventory.is_empty() {
        println!("Inventory is empty; nothing to rotate");
        return Ok(());
    }

    let sequencer = build_sequencer(config).await?;
    let reports = sequencer.rotate_all(&inventory).await;

    let mut failed = 0;
    for report in &reports {
        match &report.result {
            Ok(outcome) => println!("{}: {outcome}", report.host),
            Err(e) => println!("{}: error: {e:#}", report.host),
        }
        if !report.is_success() {
            failed += 1;
        }
    }

    summarize("rotate", reports.len(), failed)
}

pub async fn handle_remove(config: &KeywardenConfig, name: &str, yes: bool) -> Result<()> {
    let inventory = Inventory::load(&config.inventory.path)?;
    let record = inventory.find(name)?;
    let removal = build_removal(config, yes).await?;

    let outcome = removal.remove_host(record).await?;
    print_removal(&record.name, &outcome);

    Ok(())
}

pub async fn handle_remove_all(config: &KeywardenConfig, yes: bool) -> Result<()> {
    let inventory = Inventory::load(&config.inventory.path)?;
    if inventory.is_empty() {
        println!("Inventory is empty; nothing to remove");
        return Ok(());
    }

    let removal = build_removal(config, yes).await?;
    let reports: Vec<RemovalReport> = removal.remove_all(&inventory).await?;

    let mut failed = 0;
    for report in &reports {
        match &report.result {
            Ok(outcome) => print_removal(&report.host, outcome),
            Err(e) => {
                println!("{}: error: {e:#}", report.host);
                failed += 1;
            }
        }
    }

    summarize("remove", reports.len(), failed)
}

async fn build_sequencer(config: &KeywardenConfig) -> Result<RotationSequencer> {
    let keystore = KeyStore::new(&config.keys).await?;
    let executor = Arc::new(StandardSshClient::new(config.ssh.clone()));
    Ok(RotationSequencer::new(keystore, executor))
}

async fn build_removal(config: &KeywardenConfig, yes: bool) -> Result<KeyRemoval> {
    let keystore = KeyStore::new(&config.keys).await?;
    let executor = Arc::new(StandardSshClient::new(config.ssh.clone()));
    let confirmation: Arc<dyn Confirmation> = if yes {
        Arc::new(PresetConfirmation(true))
    } else {
        Arc::new(TerminalConfirmation)
    };
    Ok(KeyRemoval::new(keystore, executor, confirmation))
}

fn print_removal(host: &str, outcome: &RemovalOutcome) {
    match outcome {
        RemovalOutcome::Aborted => {
            println!("{host}: aborted; nothing was removed");
        }
        RemovalOutcome::Removed {
            remote_cleaned,
            files_removed,
        } => {
            let remote = match remote_cleaned {
                Some(true) => "remote entry removed",
                Some(false) => "remote entry NOT removed (clean up manually)",
                None => "no local key, remote not contacted",
            };
            println!("{host}: {remote}; {files_removed} local file(s) deleted");
        }
    }
}

fn summarize(action: &str, total: usize, failed: usize) -> Result<()> {
    if failed == 0 {
        println!("All {total} host(s) processed successfully");
        Ok(())
    } else {
        Err(anyhow!("failed to {action} keys for {failed} of {total} host(s)"))
    }
}
