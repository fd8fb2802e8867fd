//! Error handling for keywarden
//!
//! Library errors are expressed as `thiserror` enums per domain; the CLI
//! layer wraps them with `anyhow` for context. All error types are
//! Send + Sync so they cross await points freely.

use thiserror::Error;

/// Configuration loading and validation errors
///
/// These are fatal: they are reported before any host is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing failed
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    /// Configuration failed validation
    #[error("Invalid configuration: {details}")]
    ValidationError { details: String },

    /// Required environment variable missing or unusable
    #[error("Environment error for {var}: {details}")]
    EnvironmentError { var: String, details: String },
}

/// Inventory file errors
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Inventory file cannot be read
    #[error("Cannot read inventory file {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Inventory file has no header row
    #[error("Inventory file {path} is empty (header row required)")]
    MissingHeader { path: String },

    /// A row could not be parsed
    #[error("Malformed inventory row at line {line}: {details}")]
    MalformedRow { line: usize, details: String },

    /// Two rows share the same host name
    #[error("Duplicate host name '{name}' at line {line}")]
    DuplicateHost { name: String, line: usize },

    /// Requested host name is not in the inventory
    #[error("Host not found in inventory: {name}")]
    HostNotFound { name: String },
}

/// Local key store errors
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// Key directory could not be created or secured
    #[error("Failed to prepare key directory {path}: {source}")]
    DirectoryError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// ssh-keygen invocation failed
    #[error("Key generation failed for host '{host}': {details}")]
    KeygenFailed { host: String, details: String },

    /// Refusing to overwrite an existing active key pair
    #[error("Active key pair already exists for host '{host}'")]
    ActivePairExists { host: String },

    /// Key file operation failed
    #[error("Key file operation failed on {path}: {source}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Expected key file is missing
    #[error("Key file not found: {path}")]
    KeyNotFound { path: String },
}

/// Remote SSH execution errors
#[derive(Error, Debug)]
pub enum SshError {
    /// The local ssh binary could not be spawned
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote command exited non-zero
    #[error("Remote command on {target} failed with {status}: {stderr}")]
    CommandFailed {
        target: String,
        status: String,
        stderr: String,
    },

    /// The operation did not complete within the configured timeout
    #[error("SSH operation on {target} timed out after {timeout_secs} seconds")]
    Timeout { target: String, timeout_secs: u64 },

    /// Writing piped stdin to the ssh process failed
    #[error("Failed to write stdin to {program}: {source}")]
    StdinFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
