//! Roster source files and the reconciliation ("sync") pass.
//!
//! A sync activates and refreshes every entry the source names, then
//! soft-deactivates active entities the source no longer lists. Two syncs
//! against an unchanged source produce no net mutation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    models::Network,
    persistence::{
        bootstrap::SqliteBootstrapRepository, error::PersistenceError,
        servers::SqliteGrpcServerRepository,
    },
};

/// One entry of the bootstrap roster file.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapRosterEntry {
    /// Operator display name.
    pub name: String,
    /// Operator contact email.
    #[serde(default)]
    pub email: String,
    /// Operator website.
    #[serde(default)]
    pub website: String,
    /// Canonical multiaddress.
    pub address: String,
}

/// The gRPC roster file: one address list per network.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrpcRoster {
    /// Mainnet server addresses.
    #[serde(default)]
    pub mainnet: Vec<String>,
    /// Testnet server addresses.
    #[serde(default)]
    pub testnet: Vec<String>,
}

/// Errors from loading or applying a roster source.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The roster file could not be read.
    #[error("failed to read roster file {path}: {source}")]
    Io {
        /// The file that failed.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The roster file is not valid JSON of the expected shape.
    #[error("failed to parse roster file {path}: {source}")]
    Parse {
        /// The file that failed.
        path: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The roster file parsed but its content is unusable.
    #[error("roster file {path} is invalid: {reason}")]
    Invalid {
        /// The file that failed.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Applying the roster to the store failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Net effect of one sync pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Entries inserted because their address was new.
    pub added: u64,
    /// Entries whose mutable fields were refreshed.
    pub updated: u64,
    /// Active entities deactivated because the source dropped them.
    pub deactivated: u64,
}

/// Loads and validates the bootstrap roster file.
pub fn load_bootstrap_roster(path: &Path) -> Result<Vec<BootstrapRosterEntry>, SyncError> {
    let display = path.display().to_string();
    let data = std::fs::read_to_string(path)
        .map_err(|source| SyncError::Io { path: display.clone(), source })?;
    let entries: Vec<BootstrapRosterEntry> = serde_json::from_str(&data)
        .map_err(|source| SyncError::Parse { path: display.clone(), source })?;

    if entries.is_empty() {
        return Err(SyncError::Invalid { path: display, reason: "no nodes found".into() });
    }
    for (i, entry) in entries.iter().enumerate() {
        if entry.address.is_empty() {
            return Err(SyncError::Invalid {
                path: display,
                reason: format!("entry {i} has an empty address"),
            });
        }
        if entry.name.is_empty() {
            return Err(SyncError::Invalid {
                path: display,
                reason: format!("entry {i} has an empty name"),
            });
        }
    }
    Ok(entries)
}

/// Loads the gRPC roster file.
pub fn load_grpc_roster(path: &Path) -> Result<GrpcRoster, SyncError> {
    let display = path.display().to_string();
    let data = std::fs::read_to_string(path)
        .map_err(|source| SyncError::Io { path: display.clone(), source })?;
    serde_json::from_str(&data).map_err(|source| SyncError::Parse { path: display, source })
}

/// Reconciles the bootstrap-node table with the roster file.
#[tracing::instrument(skip(repo), level = "info")]
pub async fn sync_bootstrap_nodes(
    repo: &SqliteBootstrapRepository,
    path: &Path,
) -> Result<SyncSummary, SyncError> {
    let entries = load_bootstrap_roster(path)?;
    let mut summary = SyncSummary::default();
    let mut addresses = Vec::with_capacity(entries.len());

    for entry in &entries {
        if repo.exists_by_address(&entry.address).await? {
            summary.updated += 1;
        } else {
            summary.added += 1;
        }
        repo.upsert_roster_entry(entry).await?;
        addresses.push(entry.address.clone());
    }
    summary.deactivated = repo.deactivate_missing(&addresses).await?;

    tracing::info!(
        added = summary.added,
        updated = summary.updated,
        deactivated = summary.deactivated,
        "bootstrap roster sync finished",
    );
    Ok(summary)
}

/// Reconciles the gRPC-server table with the roster file.
#[tracing::instrument(skip(repo), level = "info")]
pub async fn sync_grpc_servers(
    repo: &SqliteGrpcServerRepository,
    path: &Path,
) -> Result<SyncSummary, SyncError> {
    let roster = load_grpc_roster(path)?;
    let mut summary = SyncSummary::default();
    let mut addresses = Vec::new();

    for (network, list) in
        [(Network::Mainnet, &roster.mainnet), (Network::Testnet, &roster.testnet)]
    {
        for address in list {
            if repo.exists_by_address(address).await? {
                summary.updated += 1;
            } else {
                summary.added += 1;
            }
            repo.upsert_roster_server(address, network).await?;
            addresses.push(address.clone());
        }
    }
    summary.deactivated = repo.deactivate_missing(&addresses).await?;

    tracing::info!(
        added = summary.added,
        updated = summary.updated,
        deactivated = summary.deactivated,
        "grpc roster sync finished",
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_valid_bootstrap_roster() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"Node One","email":"a@b.c","address":"/dns/n1.example.org/tcp/21888/p2p/Qm1"}}]"#,
        )
        .unwrap();

        let entries = load_bootstrap_roster(file.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Node One");
        assert_eq!(entries[0].website, "");
    }

    #[test]
    fn rejects_empty_roster() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(matches!(
            load_bootstrap_roster(file.path()),
            Err(SyncError::Invalid { .. }),
        ));
    }

    #[test]
    fn rejects_entry_without_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name":"Node One","address":""}}]"#).unwrap();
        assert!(matches!(
            load_bootstrap_roster(file.path()),
            Err(SyncError::Invalid { .. }),
        ));
    }

    #[test]
    fn loads_grpc_roster_with_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mainnet":["grpc1.example.org:50051"]}}"#).unwrap();

        let roster = load_grpc_roster(file.path()).unwrap();
        assert_eq!(roster.mainnet.len(), 1);
        assert!(roster.testnet.is_empty());
    }
}
