//! Common types for Cairn: snapshot CRDs, errors, retry classification and configuration

#![deny(missing_docs)]

pub mod config;
pub mod crd;
pub mod error;
pub mod retry;

pub use config::{EnvSource, OsEnv, WaitConfig};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key linking a Backup to the cluster it was taken from
pub const BACKUP_CLUSTER_LABEL: &str = "cairn.dev/cluster";

/// Name of the component condition that reports control plane health
pub const KUBERNETES_COMPONENT: &str = "kubernetes";
