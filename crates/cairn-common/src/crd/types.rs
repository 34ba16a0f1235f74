//! Shared status types for Cairn CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a cluster
///
/// Phases move as node agents report progress on install, backup, restore,
/// upgrade and removal operations.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Cluster is accepted but no operation has started
    #[default]
    Pending,
    /// Nodes are being installed
    Installing,
    /// Installation failed
    InstallFailed,
    /// Cluster is up and serving
    Running,
    /// Cluster configuration is being changed (scale, add-ons)
    Updating,
    /// Configuration change failed
    UpdateFailed,
    /// Kubernetes version upgrade in progress
    Upgrading,
    /// Upgrade failed
    UpgradeFailed,
    /// A backup is being taken
    Backing,
    /// Cluster is being restored from a backup
    Restoring,
    /// Restore from backup failed
    RestoreFailed,
    /// Cluster is being uninstalled
    Terminating,
    /// Uninstall failed
    TerminateFailed,
    /// A phase this version does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Installing => write!(f, "Installing"),
            Self::InstallFailed => write!(f, "InstallFailed"),
            Self::Running => write!(f, "Running"),
            Self::Updating => write!(f, "Updating"),
            Self::UpdateFailed => write!(f, "UpdateFailed"),
            Self::Upgrading => write!(f, "Upgrading"),
            Self::UpgradeFailed => write!(f, "UpgradeFailed"),
            Self::Backing => write!(f, "Backing"),
            Self::Restoring => write!(f, "Restoring"),
            Self::RestoreFailed => write!(f, "RestoreFailed"),
            Self::Terminating => write!(f, "Terminating"),
            Self::TerminateFailed => write!(f, "TerminateFailed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Health of a single cluster component
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ComponentStatus {
    /// Component reports healthy
    Healthy,
    /// Component reports unhealthy
    Unhealthy,
    /// Component has not reported yet, or reported an unrecognized status
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Unhealthy => write!(f, "Unhealthy"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Health condition of a named cluster component (e.g., "kubernetes")
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ComponentCondition {
    /// Component name
    pub name: String,

    /// Reported health
    #[serde(default)]
    pub status: ComponentStatus,
}

impl ComponentCondition {
    /// Create a component condition
    pub fn new(name: impl Into<String>, status: ComponentStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// State of a cluster backup
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterBackupStatus {
    /// Backup requested, not yet complete
    #[default]
    Pending,
    /// Backup completed and can be restored
    Available,
    /// Backup failed
    Error,
    /// A status this version does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ClusterBackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Available => write!(f, "Available"),
            Self::Error => write!(f, "Error"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
