//! Backup Custom Resource Definition
//!
//! A Backup is a point-in-time copy of a cluster taken by the node agents.
//! Backups carry the `cairn.dev/cluster` label so they can be listed per
//! cluster.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ClusterBackupStatus;

/// Specification for a Backup
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cairn.dev",
    version = "v1",
    kind = "Backup",
    plural = "backups",
    shortname = "cbk",
    status = "BackupStatus",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.clusterName"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.clusterBackupStatus"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Name of the cluster this backup belongs to
    pub cluster_name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Status of a Backup
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    /// Current backup state
    #[serde(default)]
    pub cluster_backup_status: ClusterBackupStatus,

    /// Human-readable message (set on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Backup {
    /// Current backup state; a backup without status is Pending
    pub fn backup_status(&self) -> ClusterBackupStatus {
        self.status
            .as_ref()
            .map(|s| s.cluster_backup_status)
            .unwrap_or_default()
    }

    /// Name of the owning cluster
    pub fn cluster_name(&self) -> &str {
        &self.spec.cluster_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_status_defaults_to_pending() {
        let backup = Backup::new(
            "nightly",
            BackupSpec {
                cluster_name: "prod".to_string(),
                description: None,
            },
        );
        assert_eq!(backup.backup_status(), ClusterBackupStatus::Pending);
        assert_eq!(backup.cluster_name(), "prod");
    }

    #[test]
    fn test_status_deserializes() {
        let status: BackupStatus =
            serde_json::from_str(r#"{"clusterBackupStatus":"Error","message":"disk full"}"#)
                .unwrap();
        assert_eq!(status.cluster_backup_status, ClusterBackupStatus::Error);
        assert_eq!(status.message.as_deref(), Some("disk full"));
    }
}
