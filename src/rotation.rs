//! Key-rotation sequencer
//!
//! Per-host state machine: backup existing pair, generate a new one,
//! deploy it, verify it, then retire the old public key remotely. Each
//! step returns an explicit result; the partial-failure branches
//! (deploy ok / verify fail) are states, not early termination.
//!
//! Failure ordering: a Verify failure is treated as more severe than a
//! Deploy failure. It means the remote accepted the new key but the key
//! cannot actually authenticate, so the sequencer stops before any
//! destructive step and the previous credential stays valid. A RetireOld
//! failure is downgraded to a warning: the new credential is already
//! verified, only a stale remote entry remains.

use crate::inventory::{HostRecord, Inventory};
use crate::keystore::KeyStore;
use crate::ssh::{authorized_keys, RemoteAuth, RemoteExecutor, RemoteTarget};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Terminal state of one rotation attempt for one host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Full cycle completed, old key retired remotely
    Rotated,
    /// First rotation: no pre-existing pair, so the backup and retire
    /// steps were skipped
    SkippedNoBackupNeeded,
    /// ssh-keygen failed; the backup (if any) was restored untouched
    FailedGenerate,
    /// The new key could not be deployed; old access is unaffected
    FailedDeploy,
    /// The new key was deployed but does not authenticate; the old key
    /// was deliberately left in place to rule out a lockout
    FailedVerify,
    /// The new key works but the old public key could not be removed
    /// remotely; counts as success with a manual-cleanup warning
    FailedRetireOld,
}

impl RotationOutcome {
    /// Whether the host ended up with a working, verified new key
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Rotated | Self::SkippedNoBackupNeeded | Self::FailedRetireOld
        )
    }
}

impl std::fmt::Display for RotationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Rotated => "rotated (old key retired)",
            Self::SkippedNoBackupNeeded => "rotated (no previous key to retire)",
            Self::FailedGenerate => "key generation failed",
            Self::FailedDeploy => "deploy failed; previous access untouched",
            Self::FailedVerify => "verification failed; previous key left in place",
            Self::FailedRetireOld => "rotated, but the old key is still present remotely",
        };
        f.write_str(text)
    }
}

/// Result of one host in a bulk rotation
pub struct RotationReport {
    pub host: String,
    pub result: Result<RotationOutcome>,
}

impl RotationReport {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.is_success())
    }
}

/// Drives the rotation state machine against a key store and a remote
/// executor
pub struct RotationSequencer {
    keystore: KeyStore,
    executor: Arc<dyn RemoteExecutor>,
}

impl RotationSequencer {
    pub fn new(keystore: KeyStore, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { keystore, executor }
    }

    /// Rotate the key pair for a single host.
    ///
    /// Every call rotates; a host with a valid active key goes through
    /// the full backup/generate/deploy/verify/retire cycle again.
    pub async fn rotate_host(&self, record: &HostRecord) -> Result<RotationOutcome> {
        let host = &record.name;
        let target = RemoteTarget::from(record);
        let paths = self.keystore.paths_for(host);

        // BackupExisting
        let had_backup = self.keystore.has_active_pair(host).await;
        if had_backup {
            self.keystore
                .backup_pair(host)
                .await
                .with_context(|| format!("failed to back up key pair for '{host}'"))?;
            info!("Backed up existing key pair for '{host}'");
        }

        // Generate
        if let Err(e) = self.keystore.generate_pair(host).await {
            warn!("Key generation failed for '{host}': {e}");
            if had_backup {
                self.keystore
                    .restore_backup(host)
                    .await
                    .with_context(|| format!("failed to restore backup for '{host}'"))?;
            }
            return Ok(RotationOutcome::FailedGenerate);
        }

        let new_public = self
            .keystore
            .read_public_key(host)
            .await
            .with_context(|| format!("generated public key unreadable for '{host}'"))?;

        // Deploy: authenticate with the previous credential when one
        // exists, otherwise fall back to the interactive flow.
        let deploy_auth = if had_backup {
            RemoteAuth::Key(paths.backup_private.clone())
        } else {
            RemoteAuth::Interactive
        };
        if let Err(e) = self
            .executor
            .execute(&target, &deploy_auth, authorized_keys::deploy_command(&new_public))
            .await
        {
            warn!("Deploy to {target} failed for '{host}': {e}");
            return Ok(RotationOutcome::FailedDeploy);
        }

        // Verify with a fresh session using only the new key.
        let new_key_auth = RemoteAuth::Key(paths.private.clone());
        if let Err(e) = self
            .executor
            .execute(&target, &new_key_auth, authorized_keys::verify_command())
            .await
        {
            warn!(
                "Verification of the new key failed for '{host}': {e}; \
                 the previous key was left in place"
            );
            return Ok(RotationOutcome::FailedVerify);
        }

        if !had_backup {
            info!("Rotation complete for '{host}' (first key, nothing to retire)");
            return Ok(RotationOutcome::SkippedNoBackupNeeded);
        }

        // RetireOld: only reached after a successful verify.
        let old_public = self
            .keystore
            .read_backup_public_key(host)
            .await
            .with_context(|| format!("backup public key unreadable for '{host}'"))?;
        if let Err(e) = self
            .executor
            .execute(&target, &new_key_auth, authorized_keys::retire_command(&old_public))
            .await
        {
            warn!(
                "Old key for '{host}' could not be retired remotely: {e}; \
                 remove the stale authorized_keys entry manually"
            );
            return Ok(RotationOutcome::FailedRetireOld);
        }

        info!("Rotation complete for '{host}'");
        Ok(RotationOutcome::Rotated)
    }

    /// Rotate every host in CSV row order, sequentially. A failure on
    /// one host never aborts processing of the rest.
    pub async fn rotate_all(&self, inventory: &Inventory) -> Vec<RotationReport> {
        let mut reports = Vec::with_capacity(inventory.len());

        for record in inventory.hosts() {
            let result = self.rotate_host(record).await;
            if let Err(e) = &result {
                warn!("Rotation errored for '{}': {e:#}", record.name);
            }
            reports.push(RotationReport {
                host: record.name.clone(),
                result,
            });
        }

        reports
    }
}
