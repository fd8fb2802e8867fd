//! Key-removal operation
//!
//! Removes a host's key material after confirmation: best-effort removal
//! of the exact public key line from the remote authorized_keys, then
//! deletion of all local key files (active and backup). A host with no
//! local key files is cleaned up without contacting the remote at all.

use crate::confirm::Confirmation;
use crate::error::KeyStoreError;
use crate::inventory::{HostRecord, Inventory};
use crate::keystore::KeyStore;
use crate::ssh::{authorized_keys, RemoteAuth, RemoteExecutor, RemoteTarget};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Terminal state of one removal attempt for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Operator declined the confirmation; nothing local or remote was
    /// touched
    Aborted,
    /// Local cleanup completed
    Removed {
        /// Whether the remote authorized_keys entry was removed.
        /// `None` means there was no local public key to identify the
        /// line, so the remote host was never contacted.
        remote_cleaned: Option<bool>,
        /// Number of local key files actually deleted
        files_removed: usize,
    },
}

/// Result of one host in a bulk removal
pub struct RemovalReport {
    pub host: String,
    pub result: Result<RemovalOutcome>,
}

/// Drives key removal against a key store and a remote executor
pub struct KeyRemoval {
    keystore: KeyStore,
    executor: Arc<dyn RemoteExecutor>,
    confirmation: Arc<dyn Confirmation>,
}

impl KeyRemoval {
    pub fn new(
        keystore: KeyStore,
        executor: Arc<dyn RemoteExecutor>,
        confirmation: Arc<dyn Confirmation>,
    ) -> Self {
        Self {
            keystore,
            executor,
            confirmation,
        }
    }

    /// Remove one host's keys, asking for confirmation first
    pub async fn remove_host(&self, record: &HostRecord) -> Result<RemovalOutcome> {
        let prompt = format!(
            "Remove the key pair for '{}' (local files and the remote authorized_keys entry)?",
            record.name
        );
        if !self.confirmation.confirm(&prompt)? {
            info!("Key removal for '{}' aborted by operator", record.name);
            return Ok(RemovalOutcome::Aborted);
        }

        self.remove_host_unconfirmed(record).await
    }

    /// Remove keys for every host in CSV row order, asking for one
    /// confirmation covering the whole run
    pub async fn remove_all(&self, inventory: &Inventory) -> Result<Vec<RemovalReport>> {
        let prompt = format!(
            "Remove the key pairs for all {} inventory hosts?",
            inventory.len()
        );
        if !self.confirmation.confirm(&prompt)? {
            info!("Bulk key removal aborted by operator");
            return Ok(inventory
                .hosts()
                .iter()
                .map(|record| RemovalReport {
                    host: record.name.clone(),
                    result: Ok(RemovalOutcome::Aborted),
                })
                .collect());
        }

        let mut reports = Vec::with_capacity(inventory.len());
        for record in inventory.hosts() {
            let result = self.remove_host_unconfirmed(record).await;
            if let Err(e) = &result {
                warn!("Key removal errored for '{}': {e:#}", record.name);
            }
            reports.push(RemovalReport {
                host: record.name.clone(),
                result,
            });
        }
        Ok(reports)
    }

    async fn remove_host_unconfirmed(&self, record: &HostRecord) -> Result<RemovalOutcome> {
        let host = &record.name;
        let paths = self.keystore.paths_for(host);

        // The local public key identifies the remote line to remove.
        // Without it there is nothing to match, so the remote host is
        // not contacted at all.
        let remote_cleaned = match self.keystore.read_public_key(host).await {
            Ok(public_key) => {
                let target = RemoteTarget::from(record);
                let auth = RemoteAuth::Key(paths.private.clone());
                match self
                    .executor
                    .execute(&target, &auth, authorized_keys::retire_command(&public_key))
                    .await
                {
                    Ok(_) => {
                        info!("Removed remote authorized_keys entry for '{host}'");
                        Some(true)
                    }
                    Err(e) => {
                        warn!(
                            "Could not remove the remote authorized_keys entry for \
                             '{host}': {e}; remove it manually"
                        );
                        Some(false)
                    }
                }
            }
            Err(KeyStoreError::KeyNotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };

        let files_removed = self.keystore.remove_all(host).await;
        info!("Removed {files_removed} local key file(s) for '{host}'");

        Ok(RemovalOutcome::Removed {
            remote_cleaned,
            files_removed,
        })
    }
}
