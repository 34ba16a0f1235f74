//! Remote reads of clusters and backups
//!
//! [`ClusterSource`] is the seam between the wait library and the API that
//! reports cluster state. [`KubeClusterSource`] reads the `cairn.dev` custom
//! resources through kube-rs.

use async_trait::async_trait;
use cairn_common::crd::{Backup, Cluster};
use cairn_common::{Error, BACKUP_CLUSTER_LABEL};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
#[cfg(test)]
use mockall::automock;
use tracing::trace;

use crate::engine::Snapshot;

/// Trait for reading cluster and backup state
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Describe the named cluster.
    ///
    /// Returns a single-element list when the cluster exists. A missing
    /// cluster is reported as a "not found" error.
    async fn describe_cluster(&self, name: &str) -> Result<Vec<Cluster>, Error>;

    /// List backups taken from the named cluster, in API order
    async fn list_backups(&self, cluster: &str) -> Result<Vec<Backup>, Error>;
}

/// [`ClusterSource`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterSource {
    client: Client,
}

impl KubeClusterSource {
    /// Create a source using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Label selector matching the backups of a cluster
pub fn backup_selector(cluster: &str) -> String {
    format!("{}={}", BACKUP_CLUSTER_LABEL, cluster)
}

#[async_trait]
impl ClusterSource for KubeClusterSource {
    async fn describe_cluster(&self, name: &str) -> Result<Vec<Cluster>, Error> {
        let api: Api<Cluster> = Api::all(self.client.clone());
        let cluster = api.get(name).await?;
        trace!(cluster = %name, "Described cluster");
        Ok(vec![cluster])
    }

    async fn list_backups(&self, cluster: &str) -> Result<Vec<Backup>, Error> {
        let api: Api<Backup> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&backup_selector(cluster));
        let backups = api.list(&params).await?;
        trace!(cluster = %cluster, count = backups.items.len(), "Listed backups");
        Ok(backups.items)
    }
}

impl Snapshot for Cluster {
    fn name(&self) -> String {
        self.name_any()
    }

    fn state(&self) -> String {
        format!("Phase={}", self.phase())
    }
}

impl Snapshot for Backup {
    fn name(&self) -> String {
        self.name_any()
    }

    fn state(&self) -> String {
        format!("Status={}", self.backup_status())
    }
}
