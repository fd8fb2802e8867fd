//! Standard SSH client implementation
//!
//! Spawns the local `ssh` binary for every remote operation. Key-based
//! commands run under BatchMode with an outer tokio timeout; interactive
//! invocations (password prompts, `connect` sessions) run without the
//! outer timeout since they legitimately block on the operator.

use super::{RemoteAuth, RemoteCommand, RemoteExecutor, RemoteOutput, RemoteTarget};
use crate::config::SshOptions;
use crate::error::SshError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error};

/// SSH client shelling out to the external OpenSSH binary
#[derive(Debug, Clone)]
pub struct StandardSshClient {
    options: SshOptions,
}

impl StandardSshClient {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    /// Common ssh argument list for a target and authentication mode
    fn build_args(&self, target: &RemoteTarget, auth: &RemoteAuth, batch: bool) -> Vec<String> {
        let mut args = Vec::new();

        if let RemoteAuth::Key(path) = auth {
            args.push("-i".to_string());
            args.push(path.display().to_string());
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
        }
        if batch {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }

        args.push("-p".to_string());
        args.push(target.port.to_string());
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.options.connect_timeout_secs));

        if !self.options.strict_host_key_checking {
            args.push("-o".to_string());
            args.push("StrictHostKeyChecking=no".to_string());
            args.push("-o".to_string());
            args.push("UserKnownHostsFile=/dev/null".to_string());
        }

        for option in &self.options.extra_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }

        args.push(target.destination());
        args
    }

    /// Open an interactive SSH session with inherited stdio (the
    /// `connect` subcommand). Returns the exit status of ssh.
    pub async fn interactive_shell(
        &self,
        target: &RemoteTarget,
        auth: &RemoteAuth,
    ) -> Result<std::process::ExitStatus, SshError> {
        let args = self.build_args(target, auth, false);
        debug!("Opening interactive session to {target}");

        Command::new("ssh")
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| SshError::SpawnFailed {
                program: "ssh".to_string(),
                source: e,
            })
    }

    async fn run(
        &self,
        target: &RemoteTarget,
        auth: &RemoteAuth,
        command: RemoteCommand,
    ) -> Result<RemoteOutput, SshError> {
        let batch = matches!(auth, RemoteAuth::Key(_));
        let mut args = self.build_args(target, auth, batch);
        args.push(command.render());

        debug!("Executing on {target}: ssh {}", args.join(" "));

        let mut cmd = Command::new("ssh");
        cmd.args(&args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| SshError::SpawnFailed {
            program: "ssh".to_string(),
            source: e,
        })?;

        if let Some(data) = command.stdin {
            let mut stdin = child.stdin.take().ok_or_else(|| SshError::SpawnFailed {
                program: "ssh".to_string(),
                source: std::io::Error::other("child stdin unavailable"),
            })?;
            stdin
                .write_all(&data)
                .await
                .map_err(|e| SshError::StdinFailed {
                    program: "ssh".to_string(),
                    source: e,
                })?;
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SshError::SpawnFailed {
                program: "ssh".to_string(),
                source: e,
            })?;

        if output.status.success() {
            Ok(RemoteOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("Remote command on {target} failed: {stderr}");
            Err(SshError::CommandFailed {
                target: target.to_string(),
                status: output.status.to_string(),
                stderr,
            })
        }
    }
}

#[async_trait]
impl RemoteExecutor for StandardSshClient {
    async fn execute(
        &self,
        target: &RemoteTarget,
        auth: &RemoteAuth,
        command: RemoteCommand,
    ) -> Result<RemoteOutput, SshError> {
        match auth {
            RemoteAuth::Key(_) => {
                let limit = Duration::from_secs(self.options.command_timeout_secs);
                match timeout(limit, self.run(target, auth, command)).await {
                    Ok(result) => result,
                    Err(_) => Err(SshError::Timeout {
                        target: target.to_string(),
                        timeout_secs: self.options.command_timeout_secs,
                    }),
                }
            }
            // Interactive invocations block on the operator; the ssh
            // ConnectTimeout still bounds the connection phase.
            RemoteAuth::Interactive => self.run(target, auth, command).await,
        }
    }
}
