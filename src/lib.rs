//! # keywarden
//!
//! SSH connection and per-host key rotation manager for a small CSV
//! inventory of hosts. keywarden shells out to the external OpenSSH
//! tooling (`ssh`, `ssh-keygen`) for every network and key-generation
//! operation; it implements no SSH protocol of its own.
//!
//! The core is the key-rotation sequencer: backup the existing pair,
//! generate a new Ed25519 pair, deploy it, verify it authenticates, and
//! only then retire the old public key remotely. The ordering guarantees
//! a host is never locked out by a half-finished rotation.
//!
//! ## Safety note
//!
//! Execution is single-threaded and strictly sequential, so no file
//! locking is used. Running two keywarden invocations concurrently
//! against the same host is unsafe: nothing protects the
//! backup/generate/deploy sequence from a second process.

pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod inventory;
pub mod keystore;
pub mod removal;
pub mod rotation;
pub mod ssh;

pub use config::KeywardenConfig;
pub use inventory::{HostRecord, Inventory};
pub use keystore::KeyStore;
pub use removal::{KeyRemoval, RemovalOutcome};
pub use rotation::{RotationOutcome, RotationSequencer};

/// Version of the keywarden crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
