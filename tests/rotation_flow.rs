//! End-to-end rotation and removal flows against a scripted remote
//! executor and a stand-in key generator, so no real ssh or ssh-keygen
//! is ever invoked.

use async_trait::async_trait;
use keywarden::config::KeysConfig;
use keywarden::confirm::PresetConfirmation;
use keywarden::error::SshError;
use keywarden::inventory::{HostRecord, Inventory};
use keywarden::keystore::KeyStore;
use keywarden::removal::{KeyRemoval, RemovalOutcome};
use keywarden::rotation::{RotationOutcome, RotationSequencer};
use keywarden::ssh::{RemoteAuth, RemoteCommand, RemoteExecutor, RemoteOutput, RemoteTarget};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const INVENTORY: &str = "name,ip,port,username\n\
                         web1,10.0.0.5,22,admin\n\
                         db1,10.0.0.6,2222,postgres\n";

/// One recorded remote invocation
#[derive(Debug, Clone)]
struct RecordedCall {
    target: String,
    auth: RemoteAuth,
    step: Step,
    stdin: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Deploy,
    Verify,
    Retire,
}

fn classify(command: &RemoteCommand) -> Step {
    if command.program == "true" {
        return Step::Verify;
    }
    let script = command.args.get(1).map(String::as_str).unwrap_or("");
    if script.contains(">>") {
        Step::Deploy
    } else if script.contains("grep -vxF") {
        Step::Retire
    } else {
        panic!("unrecognized remote command: {command:?}");
    }
}

/// Scripted executor: records every call, fails the configured step
#[derive(Default)]
struct FakeExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    fail_step: Option<Step>,
    fail_target_contains: Option<String>,
}

impl FakeExecutor {
    fn failing(step: Step) -> Self {
        Self {
            fail_step: Some(step),
            ..Default::default()
        }
    }

    fn failing_for(step: Step, target_fragment: &str) -> Self {
        Self {
            fail_step: Some(step),
            fail_target_contains: Some(target_fragment.to_string()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn execute(
        &self,
        target: &RemoteTarget,
        auth: &RemoteAuth,
        command: RemoteCommand,
    ) -> Result<RemoteOutput, SshError> {
        let step = classify(&command);
        self.calls.lock().unwrap().push(RecordedCall {
            target: target.to_string(),
            auth: auth.clone(),
            step,
            stdin: command.stdin.clone(),
        });

        let target_matches = self
            .fail_target_contains
            .as_ref()
            .map(|fragment| target.to_string().contains(fragment))
            .unwrap_or(true);

        if self.fail_step == Some(step) && target_matches {
            return Err(SshError::CommandFailed {
                target: target.to_string(),
                status: "exit status: 255".to_string(),
                stderr: "Permission denied (publickey)".to_string(),
            });
        }
        Ok(RemoteOutput::default())
    }
}

/// Stand-in for ssh-keygen writing a predictable pair; each invocation
/// produces a distinct public key so rotations are distinguishable.
fn fake_keygen(dir: &TempDir) -> String {
    let path = dir.path().join("fake-keygen");
    let counter = dir.path().join("keygen-count");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        "#!/bin/sh\n\
         while [ $# -gt 0 ]; do\n\
           if [ \"$1\" = \"-f\" ]; then shift; out=\"$1\"; fi\n\
           shift\n\
         done\n\
         n=$(cat \"{counter}\" 2>/dev/null || echo 0)\n\
         n=$((n + 1))\n\
         echo $n > \"{counter}\"\n\
         echo \"private-key-$n\" > \"$out\"\n\
         echo \"ssh-ed25519 GENKEY$n keywarden\" > \"$out.pub\"\n",
        counter = counter.display()
    )
    .unwrap();
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    path.display().to_string()
}

async fn keystore(dir: &TempDir) -> KeyStore {
    let config = KeysConfig {
        directory: dir.path().join("keys"),
        identity_prefix: "identity".to_string(),
        comment: None,
    };
    KeyStore::new(&config)
        .await
        .unwrap()
        .with_keygen_program(fake_keygen(dir))
}

fn inventory() -> Inventory {
    Inventory::parse(INVENTORY, "test").unwrap()
}

fn web1() -> HostRecord {
    inventory().find("web1").unwrap().clone()
}

async fn read(store: &KeyStore, host: &str) -> String {
    store.read_public_key(host).await.unwrap()
}

#[tokio::test]
async fn first_rotation_skips_backup_and_retire() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());

    let sequencer = RotationSequencer::new(store.clone(), executor.clone());
    let outcome = sequencer.rotate_host(&web1()).await.unwrap();

    assert_eq!(outcome, RotationOutcome::SkippedNoBackupNeeded);
    assert!(outcome.is_success());

    // New pair exists, no backup was ever created.
    assert!(store.has_active_pair("web1").await);
    assert!(!store.has_backup_pair("web1").await);

    // Deploy with the interactive flow (no previous key), then verify
    // with the new key; no retire call.
    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].step, Step::Deploy);
    assert_eq!(calls[0].auth, RemoteAuth::Interactive);
    assert_eq!(calls[0].target, "admin@10.0.0.5:22");
    assert_eq!(
        calls[0].stdin.as_deref(),
        Some("ssh-ed25519 GENKEY1 keywarden\n".as_bytes())
    );
    assert_eq!(calls[1].step, Step::Verify);
    assert!(
        matches!(&calls[1].auth, RemoteAuth::Key(p) if p.ends_with("identity-web1")),
        "verify must use the freshly generated key"
    );
}

#[tokio::test]
async fn second_rotation_runs_the_full_cycle() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    let sequencer = RotationSequencer::new(store.clone(), executor.clone());

    sequencer.rotate_host(&web1()).await.unwrap();
    let first_public = read(&store, "web1").await;

    let outcome = sequencer.rotate_host(&web1()).await.unwrap();
    assert_eq!(outcome, RotationOutcome::Rotated);

    // The previous pair moved to the .bak siblings.
    assert_eq!(
        store.read_backup_public_key("web1").await.unwrap(),
        first_public
    );
    assert_ne!(read(&store, "web1").await, first_public);

    let calls = executor.calls();
    assert_eq!(calls.len(), 5, "2 for the first run, 3 for the second");

    // Deploy authenticates with the backed-up credential.
    assert_eq!(calls[2].step, Step::Deploy);
    assert!(matches!(&calls[2].auth, RemoteAuth::Key(p) if p.ends_with("identity-web1.bak")));

    // Retire runs with the new key and pipes the exact old key line.
    assert_eq!(calls[4].step, Step::Retire);
    assert!(matches!(&calls[4].auth, RemoteAuth::Key(p) if p.ends_with("identity-web1")));
    assert_eq!(
        calls[4].stdin.as_deref(),
        Some(format!("{first_public}\n").as_bytes())
    );
}

#[tokio::test]
async fn generate_failure_leaves_existing_keys_untouched() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let paths = store.paths_for("web1");
    tokio::fs::write(&paths.private, "seeded-private").await.unwrap();
    tokio::fs::write(&paths.public, "ssh-ed25519 SEEDED old\n")
        .await
        .unwrap();

    let broken_store = store.clone().with_keygen_program("false");
    let executor = Arc::new(FakeExecutor::default());
    let sequencer = RotationSequencer::new(broken_store, executor.clone());

    let outcome = sequencer.rotate_host(&web1()).await.unwrap();
    assert_eq!(outcome, RotationOutcome::FailedGenerate);
    assert!(executor.calls().is_empty(), "remote must not be contacted");

    // The pre-existing pair is back at the active paths, unaltered.
    assert_eq!(read(&store, "web1").await, "ssh-ed25519 SEEDED old");
    assert_eq!(
        tokio::fs::read_to_string(&paths.private).await.unwrap(),
        "seeded-private"
    );
    assert!(!store.has_backup_pair("web1").await);
}

#[tokio::test]
async fn deploy_failure_keeps_old_access_and_new_pair() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    RotationSequencer::new(store.clone(), executor)
        .rotate_host(&web1())
        .await
        .unwrap();
    let first_public = read(&store, "web1").await;

    let failing = Arc::new(FakeExecutor::failing(Step::Deploy));
    let sequencer = RotationSequencer::new(store.clone(), failing.clone());
    let outcome = sequencer.rotate_host(&web1()).await.unwrap();

    assert_eq!(outcome, RotationOutcome::FailedDeploy);
    assert!(!outcome.is_success());
    assert_eq!(failing.calls().len(), 1, "stops right after deploy");

    // The new pair remains generated but unverified; the old one is the
    // backup and was never touched remotely.
    assert!(store.has_active_pair("web1").await);
    assert_eq!(
        store.read_backup_public_key("web1").await.unwrap(),
        first_public
    );
}

#[tokio::test]
async fn verify_failure_never_retires_the_old_key() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    RotationSequencer::new(store.clone(), executor)
        .rotate_host(&web1())
        .await
        .unwrap();

    let failing = Arc::new(FakeExecutor::failing(Step::Verify));
    let sequencer = RotationSequencer::new(store.clone(), failing.clone());
    let outcome = sequencer.rotate_host(&web1()).await.unwrap();

    assert_eq!(outcome, RotationOutcome::FailedVerify);

    let calls = failing.calls();
    assert!(
        calls.iter().all(|c| c.step != Step::Retire),
        "no destructive step may follow a failed verify"
    );

    // The new local pair still exists on disk for diagnosis.
    assert!(store.has_active_pair("web1").await);
    assert!(store.has_backup_pair("web1").await);
}

#[tokio::test]
async fn retire_failure_is_success_with_warning() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    RotationSequencer::new(store.clone(), executor)
        .rotate_host(&web1())
        .await
        .unwrap();

    let failing = Arc::new(FakeExecutor::failing(Step::Retire));
    let sequencer = RotationSequencer::new(store.clone(), failing);
    let outcome = sequencer.rotate_host(&web1()).await.unwrap();

    assert_eq!(outcome, RotationOutcome::FailedRetireOld);
    assert!(outcome.is_success(), "the new key is verified and working");
}

#[tokio::test]
async fn rotate_all_isolates_per_host_failures() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;

    // Deploy fails only for web1; db1 must still be processed.
    let executor = Arc::new(FakeExecutor::failing_for(Step::Deploy, "10.0.0.5"));
    let sequencer = RotationSequencer::new(store.clone(), executor.clone());

    let reports = sequencer.rotate_all(&inventory()).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].host, "web1");
    assert!(!reports[0].is_success());
    assert_eq!(reports[1].host, "db1");
    assert!(reports[1].is_success());

    // Hosts were processed in CSV row order.
    let targets: Vec<&str> = executor
        .calls()
        .iter()
        .map(|c| {
            if c.target.contains("10.0.0.5") {
                "web1"
            } else {
                "db1"
            }
        })
        .collect();
    assert_eq!(targets.first(), Some(&"web1"));
    assert_eq!(targets.last(), Some(&"db1"));
    assert!(store.has_active_pair("db1").await);
}

#[tokio::test]
async fn removal_declined_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    RotationSequencer::new(store.clone(), executor)
        .rotate_host(&web1())
        .await
        .unwrap();
    let public_before = read(&store, "web1").await;

    let recorder = Arc::new(FakeExecutor::default());
    let removal = KeyRemoval::new(
        store.clone(),
        recorder.clone(),
        Arc::new(PresetConfirmation(false)),
    );

    let outcome = removal.remove_host(&web1()).await.unwrap();
    assert_eq!(outcome, RemovalOutcome::Aborted);
    assert!(recorder.calls().is_empty());
    assert!(store.has_active_pair("web1").await);
    assert_eq!(read(&store, "web1").await, public_before);
}

#[tokio::test]
async fn removal_without_local_key_skips_the_remote() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    let removal = KeyRemoval::new(
        store.clone(),
        executor.clone(),
        Arc::new(PresetConfirmation(true)),
    );

    let outcome = removal.remove_host(&web1()).await.unwrap();
    assert_eq!(
        outcome,
        RemovalOutcome::Removed {
            remote_cleaned: None,
            files_removed: 0,
        }
    );
    assert!(executor.calls().is_empty(), "remote must not be contacted");
}

#[tokio::test]
async fn removal_retires_remote_entry_and_deletes_local_files() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    let sequencer = RotationSequencer::new(store.clone(), executor);
    sequencer.rotate_host(&web1()).await.unwrap();
    sequencer.rotate_host(&web1()).await.unwrap();
    let public_key = read(&store, "web1").await;

    let recorder = Arc::new(FakeExecutor::default());
    let removal = KeyRemoval::new(
        store.clone(),
        recorder.clone(),
        Arc::new(PresetConfirmation(true)),
    );

    let outcome = removal.remove_host(&web1()).await.unwrap();
    assert_eq!(
        outcome,
        RemovalOutcome::Removed {
            remote_cleaned: Some(true),
            // Active and backup pairs: four files.
            files_removed: 4,
        }
    );

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].step, Step::Retire);
    assert_eq!(
        calls[0].stdin.as_deref(),
        Some(format!("{public_key}\n").as_bytes())
    );

    assert!(!store.has_active_pair("web1").await);
    assert!(!store.has_backup_pair("web1").await);
}

#[tokio::test]
async fn removal_remote_failure_still_cleans_local_files() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    RotationSequencer::new(store.clone(), executor)
        .rotate_host(&web1())
        .await
        .unwrap();

    let failing = Arc::new(FakeExecutor::failing(Step::Retire));
    let removal = KeyRemoval::new(store.clone(), failing, Arc::new(PresetConfirmation(true)));

    let outcome = removal.remove_host(&web1()).await.unwrap();
    assert_eq!(
        outcome,
        RemovalOutcome::Removed {
            remote_cleaned: Some(false),
            files_removed: 2,
        }
    );
    assert!(!store.has_active_pair("web1").await);
}

#[tokio::test]
async fn remove_all_asks_once_and_walks_csv_order() {
    let dir = TempDir::new().unwrap();
    let store = keystore(&dir).await;
    let executor = Arc::new(FakeExecutor::default());
    let sequencer = RotationSequencer::new(store.clone(), executor);
    for record in inventory().hosts() {
        sequencer.rotate_host(record).await.unwrap();
    }

    let recorder = Arc::new(FakeExecutor::default());
    let removal = KeyRemoval::new(
        store.clone(),
        recorder.clone(),
        Arc::new(PresetConfirmation(true)),
    );

    let reports = removal.remove_all(&inventory()).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].host, "web1");
    assert_eq!(reports[1].host, "db1");
    assert!(!store.has_active_pair("web1").await);
    assert!(!store.has_active_pair("db1").await);

    let calls = recorder.calls();
    assert!(calls[0].target.contains("10.0.0.5"));
    assert!(calls[1].target.contains("10.0.0.6"));
}
