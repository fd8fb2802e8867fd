//! Remote execution over the external OpenSSH client
//!
//! keywarden does not implement the SSH protocol; every remote operation
//! is an invocation of the local `ssh` binary. Remote commands are built
//! as explicit program/argument structures with optional piped stdin, and
//! each argument is shell-quoted before being handed to ssh, so untrusted
//! data is never interpolated into a remote command line.

pub mod authorized_keys;
pub mod client;

pub use client::StandardSshClient;

use crate::error::SshError;
use crate::inventory::HostRecord;
use async_trait::async_trait;
use std::path::PathBuf;

/// Remote endpoint for an SSH invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl RemoteTarget {
    /// ssh destination argument: `user@host`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

impl From<&HostRecord> for RemoteTarget {
    fn from(record: &HostRecord) -> Self {
        Self {
            host: record.address.clone(),
            port: record.port,
            username: record.username.clone(),
        }
    }
}

impl std::fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// How the SSH session authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAuth {
    /// Public key authentication with the given private key file,
    /// non-interactive (BatchMode).
    Key(PathBuf),
    /// Let ssh fall back to its own credential flow, including an
    /// interactive password prompt on the controlling terminal.
    Interactive,
}

/// An explicit remote command: program, argument list, optional stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Render the command for the remote shell, quoting every word
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|word| shell_quote(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a successful remote command
#[derive(Debug, Clone, Default)]
pub struct RemoteOutput {
    pub stdout: String,
}

/// Executor of remote commands
///
/// `StandardSshClient` is the production implementation; tests substitute
/// their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command on the target and wait for it to finish
    async fn execute(
        &self,
        target: &RemoteTarget,
        auth: &RemoteAuth,
        command: RemoteCommand,
    ) -> Result<RemoteOutput, SshError>;
}

/// Quote a single word for the remote POSIX shell
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':'))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}
