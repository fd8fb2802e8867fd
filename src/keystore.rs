//! Local key store
//!
//! Manages the per-host key files on disk: `<prefix>-<host>` (private),
//! `<prefix>-<host>.pub` (public) and their `.bak` / `.pub.bak` backup
//! siblings. At most one active and one backup pair may exist per host;
//! the rotation sequencer relies on this invariant.

use crate::config::KeysConfig;
use crate::error::KeyStoreError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tokio::fs;
use tracing::{debug, info, warn};

/// Canonical file paths for one host's key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private: PathBuf,
    pub public: PathBuf,
    pub backup_private: PathBuf,
    pub backup_public: PathBuf,
}

/// Store of per-host SSH key files
#[derive(Debug, Clone)]
pub struct KeyStore {
    directory: PathBuf,
    identity_prefix: String,
    comment: Option<String>,
    keygen_program: String,
}

impl KeyStore {
    /// Create a key store, ensuring the key directory exists with mode 0700
    pub async fn new(config: &KeysConfig) -> Result<Self, KeyStoreError> {
        fs::create_dir_all(&config.directory)
            .await
            .map_err(|e| KeyStoreError::DirectoryError {
                path: config.directory.display().to_string(),
                source: e,
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(&config.directory).await.map_err(|e| {
                KeyStoreError::DirectoryError {
                    path: config.directory.display().to_string(),
                    source: e,
                }
            })?;
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&config.directory, perms)
                .await
                .map_err(|e| KeyStoreError::DirectoryError {
                    path: config.directory.display().to_string(),
                    source: e,
                })?;
        }

        Ok(Self {
            directory: config.directory.clone(),
            identity_prefix: config.identity_prefix.clone(),
            comment: config.comment.clone(),
            keygen_program: "ssh-keygen".to_string(),
        })
    }

    /// Override the key generation program (used by tests)
    pub fn with_keygen_program(mut self, program: impl Into<String>) -> Self {
        self.keygen_program = program.into();
        self
    }

    /// Canonical paths for a host's key files
    pub fn paths_for(&self, host: &str) -> KeyPairPaths {
        let private = self
            .directory
            .join(format!("{}-{}", self.identity_prefix, host));
        let public = with_suffix(&private, ".pub");
        KeyPairPaths {
            backup_private: with_suffix(&private, ".bak"),
            backup_public: with_suffix(&private, ".pub.bak"),
            private,
            public,
        }
    }

    /// Whether both active key files exist for the host
    pub async fn has_active_pair(&self, host: &str) -> bool {
        let paths = self.paths_for(host);
        file_exists(&paths.private).await && file_exists(&paths.public).await
    }

    /// Whether both backup key files exist for the host
    pub async fn has_backup_pair(&self, host: &str) -> bool {
        let paths = self.paths_for(host);
        file_exists(&paths.backup_private).await && file_exists(&paths.backup_public).await
    }

    /// Rename the active pair to its backup siblings. Rename, never copy,
    /// so a reader can never observe a half-written pair. Overwrites any
    /// previous backup.
    pub async fn backup_pair(&self, host: &str) -> Result<(), KeyStoreError> {
        let paths = self.paths_for(host);
        rename(&paths.private, &paths.backup_private).await?;
        rename(&paths.public, &paths.backup_public).await?;
        debug!("Backed up key pair for host '{host}'");
        Ok(())
    }

    /// Rename the backup pair back to the active paths (generate-failure
    /// recovery).
    pub async fn restore_backup(&self, host: &str) -> Result<(), KeyStoreError> {
        let paths = self.paths_for(host);
        rename(&paths.backup_private, &paths.private).await?;
        rename(&paths.backup_public, &paths.public).await?;
        info!("Restored backup key pair for host '{host}'");
        Ok(())
    }

    /// Generate a new Ed25519 key pair (no passphrase) at the canonical
    /// paths. Refuses to overwrite an existing active pair.
    pub async fn generate_pair(&self, host: &str) -> Result<(), KeyStoreError> {
        if self.has_active_pair(host).await {
            return Err(KeyStoreError::ActivePairExists {
                host: host.to_string(),
            });
        }

        let paths = self.paths_for(host);
        let comment = self
            .comment
            .clone()
            .unwrap_or_else(|| format!("keywarden-{host}"));

        let output = Command::new(&self.keygen_program)
            .args([
                "-q",
                "-t",
                "ed25519",
                "-N",
                "",
                "-C",
                &comment,
                "-f",
                &paths.private.display().to_string(),
            ])
            .output()
            .map_err(|e| KeyStoreError::KeygenFailed {
                host: host.to_string(),
                details: format!("failed to execute {}: {e}", self.keygen_program),
            })?;

        if !output.status.success() {
            return Err(KeyStoreError::KeygenFailed {
                host: host.to_string(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("Generated Ed25519 key pair for host '{host}'");
        Ok(())
    }

    /// Read the active public key as a single trimmed line
    pub async fn read_public_key(&self, host: &str) -> Result<String, KeyStoreError> {
        read_key_line(&self.paths_for(host).public).await
    }

    /// Read the backed-up public key as a single trimmed line
    pub async fn read_backup_public_key(&self, host: &str) -> Result<String, KeyStoreError> {
        read_key_line(&self.paths_for(host).backup_public).await
    }

    /// Delete all key files for a host (active and backup). Missing files
    /// are non-fatal; returns the number of files actually removed.
    pub async fn remove_all(&self, host: &str) -> usize {
        let paths = self.paths_for(host);
        let mut removed = 0;

        for path in [
            &paths.private,
            &paths.public,
            &paths.backup_private,
            &paths.backup_public,
        ] {
            match fs::remove_file(path).await {
                Ok(()) => {
                    debug!("Removed key file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Key file not present: {}", path.display());
                }
                Err(e) => {
                    warn!("Failed to remove key file {}: {e}", path.display());
                }
            }
        }

        removed
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

async fn file_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn rename(from: &Path, to: &Path) -> Result<(), KeyStoreError> {
    fs::rename(from, to)
        .await
        .map_err(|e| KeyStoreError::FileError {
            path: from.display().to_string(),
            source: e,
        })
}

async fn read_key_line(path: &Path) -> Result<String, KeyStoreError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(KeyStoreError::KeyNotFound {
            path: path.display().to_string(),
        }),
        Err(e) => Err(KeyStoreError::FileError {
            path: path.display().to_string(),
            source: e,
        }),
    }
}
