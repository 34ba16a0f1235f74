//! Custom Resource Definitions for Cairn
//!
//! Clusters and backups are the objects the control plane observes while an
//! asynchronous lifecycle operation runs on remote nodes.

mod backup;
mod cluster;
mod types;

pub use backup::{Backup, BackupSpec, BackupStatus};
pub use cluster::{Addon, Cluster, ClusterSpec, ClusterStatus};
pub use types::{ClusterBackupStatus, ClusterPhase, ComponentCondition, ComponentStatus};
