//! Inventory reader
//!
//! Parses the CSV inventory file (`name,ip,port,username`, header row
//! required) into host records. The inventory is loaded fresh on every
//! invocation and never cached across runs.

use crate::error::InventoryError;
use std::path::Path;
use tracing::debug;

/// A single host row from the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Unique host name (case-sensitive)
    pub name: String,
    /// Hostname or IP address
    pub address: String,
    /// SSH port (1-65535)
    pub port: u16,
    /// SSH username
    pub username: String,
}

impl HostRecord {
    /// Connection string for display: `user@addr:port`
    pub fn connection_string(&self) -> String {
        format!("{}@{}:{}", self.username, self.address, self.port)
    }
}

/// The host inventory, in CSV row order
#[derive(Debug, Clone)]
pub struct Inventory {
    hosts: Vec<HostRecord>,
}

impl Inventory {
    /// Load the inventory from a CSV file
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = std::fs::read_to_string(path).map_err(|e| InventoryError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let inventory = Self::parse(&content, &path.display().to_string())?;
        debug!(
            "Loaded {} hosts from inventory {}",
            inventory.hosts.len(),
            path.display()
        );
        Ok(inventory)
    }

    /// Parse inventory content. The first line is the header and is
    /// skipped without being validated; rows with an empty name field are
    /// skipped; duplicate names are rejected.
    pub fn parse(content: &str, origin: &str) -> Result<Self, InventoryError> {
        let mut lines = content.lines().enumerate();

        if lines.next().is_none() {
            return Err(InventoryError::MissingHeader {
                path: origin.to_string(),
            });
        }

        let mut hosts: Vec<HostRecord> = Vec::new();

        for (index, line) in lines {
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 4 {
                return Err(InventoryError::MalformedRow {
                    line: line_no,
                    details: format!("expected 4 fields, found {}", fields.len()),
                });
            }

            let name = fields[0];
            if name.is_empty() {
                debug!("Skipping inventory row {line_no} with empty name");
                continue;
            }

            let port: u16 = fields[2]
                .parse()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| InventoryError::MalformedRow {
                    line: line_no,
                    details: format!("invalid port '{}'", fields[2]),
                })?;

            if fields[1].is_empty() || fields[3].is_empty() {
                return Err(InventoryError::MalformedRow {
                    line: line_no,
                    details: "address and username must not be empty".to_string(),
                });
            }

            if hosts.iter().any(|h| h.name == name) {
                return Err(InventoryError::DuplicateHost {
                    name: name.to_string(),
                    line: line_no,
                });
            }

            hosts.push(HostRecord {
                name: name.to_string(),
                address: fields[1].to_string(),
                port,
                username: fields[3].to_string(),
            });
        }

        Ok(Self { hosts })
    }

    /// Find a host by exact (trimmed) name
    pub fn find(&self, name: &str) -> Result<&HostRecord, InventoryError> {
        let name = name.trim();
        self.hosts
            .iter()
            .find(|h| h.name == name)
            .ok_or_else(|| InventoryError::HostNotFound {
                name: name.to_string(),
            })
    }

    /// All hosts in CSV row order
    pub fn hosts(&self) -> &[HostRecord] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
