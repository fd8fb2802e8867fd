//! Remote authorized_keys operations
//!
//! The key text is always piped on stdin; the scripts themselves are
//! fixed strings, so no key material or host data ever appears inside a
//! remotely executed command line.

use super::RemoteCommand;

/// Append the stdin line to `~/.ssh/authorized_keys`, creating the
/// directory and file with restrictive permissions. Append-only: existing
/// entries are never touched. Every step is `&&`-chained so a failed
/// append (quota, disk full) surfaces as the script's exit status.
const DEPLOY_SCRIPT: &str = "umask 077 && \
     mkdir -p \"$HOME/.ssh\" && \
     cat >> \"$HOME/.ssh/authorized_keys\" && \
     chmod 600 \"$HOME/.ssh/authorized_keys\"";

/// Remove the exact stdin line from `~/.ssh/authorized_keys`.
/// `grep -vxF` matches whole lines literally, so a key that is a prefix
/// of another entry is never partially matched. grep exits 1 when every
/// line was removed, which is not an error here; anything above 1 is a
/// hard error and the script must abort before the `mv`, otherwise a
/// truncated temp file would replace the real authorized_keys.
const RETIRE_SCRIPT: &str = "f=\"$HOME/.ssh/authorized_keys\"; \
     [ -f \"$f\" ] || exit 0; \
     t=\"$f.keywarden.$$\"; \
     grep -vxF -f - \"$f\" > \"$t\"; rc=$?; \
     if [ $rc -gt 1 ]; then rm -f \"$t\"; exit $rc; fi; \
     chmod 600 \"$t\" && mv \"$t\" \"$f\"";

/// Command that appends the public key line to the remote authorized_keys
pub fn deploy_command(public_key: &str) -> RemoteCommand {
    RemoteCommand::new("sh")
        .arg("-c")
        .arg(DEPLOY_SCRIPT)
        .stdin(key_line(public_key))
}

/// Command that removes the exact public key line from the remote
/// authorized_keys
pub fn retire_command(public_key: &str) -> RemoteCommand {
    RemoteCommand::new("sh")
        .arg("-c")
        .arg(RETIRE_SCRIPT)
        .stdin(key_line(public_key))
}

/// Trivial remote command used to verify that a key authenticates
pub fn verify_command() -> RemoteCommand {
    RemoteCommand::new("true")
}

fn key_line(public_key: &str) -> Vec<u8> {
    format!("{}\n", public_key.trim()).into_bytes()
}
