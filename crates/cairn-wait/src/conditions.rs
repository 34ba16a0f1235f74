//! Cluster and backup conditions
//!
//! Predicates over [`Cluster`] and [`Backup`] snapshots, and
//! [`ClusterWaits`], which binds them to a [`ClusterSource`] and a
//! [`Waiter`] for the lifecycle waits callers actually run.

use std::sync::Arc;
use std::time::Duration;

use cairn_common::crd::{Backup, Cluster, ClusterBackupStatus, ClusterPhase, ComponentStatus};
use cairn_common::{Error, KUBERNETES_COMPONENT};
use kube::ResourceExt;

use crate::engine::{fetch_fn, Completed, Condition, NotFound, Verdict, WaitRequest, Waiter};
use crate::error::{ConditionError, WaitError};
use crate::source::ClusterSource;

/// Satisfied once the cluster reaches `phase`
pub fn cluster_in_phase(phase: ClusterPhase) -> impl Fn(&Cluster) -> Verdict + Send + Sync {
    move |cluster| {
        if cluster.phase() == phase {
            Verdict::Satisfied
        } else {
            Verdict::Pending
        }
    }
}

/// Satisfied once the cluster is Running
pub fn cluster_running() -> impl Fn(&Cluster) -> Verdict + Send + Sync {
    cluster_in_phase(ClusterPhase::Running)
}

/// Satisfied once the named component reports Healthy.
///
/// A component that is not listed at all keeps the wait pending.
pub fn component_healthy(component: impl Into<String>) -> impl Fn(&Cluster) -> Verdict + Send + Sync {
    let component = component.into();
    move |cluster| match cluster.component_status(&component) {
        Some(ComponentStatus::Healthy) => Verdict::Satisfied,
        _ => Verdict::Pending,
    }
}

/// Satisfied once the control plane component reports Healthy
pub fn cluster_healthy() -> impl Fn(&Cluster) -> Verdict + Send + Sync {
    component_healthy(KUBERNETES_COMPONENT)
}

/// Satisfied once the cluster has no add-ons attached
pub fn components_removed() -> impl Fn(&Cluster) -> Verdict + Send + Sync {
    |cluster| {
        if cluster.addons().is_empty() {
            Verdict::Satisfied
        } else {
            Verdict::Pending
        }
    }
}

/// Never satisfied by an observed object; used by absence waits
pub fn still_present<T>(_: &T) -> Verdict {
    Verdict::Pending
}

/// Satisfied once the backup is Available.
///
/// A backup in Error is reported but does not end the wait.
pub fn backup_available() -> impl Fn(&Backup) -> Verdict + Send + Sync {
    |backup| match backup.backup_status() {
        ClusterBackupStatus::Available => Verdict::Satisfied,
        ClusterBackupStatus::Error => Verdict::Degraded(ConditionError::new(format!(
            "backup {} create failed",
            backup.name_any()
        ))),
        ClusterBackupStatus::Pending | ClusterBackupStatus::Unknown => Verdict::Pending,
    }
}

/// Satisfied once a restored cluster is Running.
///
/// RestoreFailed is reported but does not end the wait.
pub fn recovery_successful() -> impl Fn(&Cluster) -> Verdict + Send + Sync {
    |cluster| match cluster.phase() {
        ClusterPhase::Running => Verdict::Satisfied,
        ClusterPhase::RestoreFailed => Verdict::Degraded(ConditionError::new(format!(
            "recovery cluster {} failed",
            cluster.name_any()
        ))),
        _ => Verdict::Pending,
    }
}

/// Lifecycle waits against one cluster API
///
/// Each method polls through the shared [`Waiter`]; `timeout` falls back to
/// [`Waiter::default_timeout`] when `None`.
pub struct ClusterWaits<S: ClusterSource + ?Sized> {
    source: Arc<S>,
    waiter: Waiter,
}

impl<S: ClusterSource + ?Sized> Clone for ClusterWaits<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            waiter: self.waiter.clone(),
        }
    }
}

impl<S: ClusterSource + ?Sized> ClusterWaits<S> {
    /// Bind a source to a waiter
    pub fn new(source: Arc<S>, waiter: Waiter) -> Self {
        Self { source, waiter }
    }

    /// The waiter used for every wait
    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Wait for the cluster to reach Running
    pub async fn cluster_running(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Completed, WaitError<Cluster>> {
        let request = request(name, "running", self.timeout(timeout));
        self.run_cluster(name, &request, &cluster_running()).await
    }

    /// Wait for the control plane to report Healthy
    pub async fn cluster_healthy(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Completed, WaitError<Cluster>> {
        let request = request(name, "healthy", self.timeout(timeout));
        self.run_cluster(name, &request, &cluster_healthy()).await
    }

    /// Wait for the cluster to be deleted
    pub async fn cluster_not_found(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Completed, WaitError<Cluster>> {
        let request = request(name, "deleted", self.timeout(timeout))
            .on_not_found(NotFound::Satisfied);
        self.run_cluster(name, &request, &still_present::<Cluster>)
            .await
    }

    /// Wait for every add-on to be uninstalled from the cluster
    pub async fn components_removed(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Completed, WaitError<Cluster>> {
        let request = request(name, "free of components", self.timeout(timeout));
        self.run_cluster(name, &request, &components_removed()).await
    }

    /// Wait for a restored cluster to come back Running
    pub async fn recovery_successful(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Completed, WaitError<Cluster>> {
        let request = request(name, "recovered", self.timeout(timeout));
        self.run_cluster(name, &request, &recovery_successful()).await
    }

    /// Wait for the named backup of the cluster to be Available.
    ///
    /// Backups are listed by cluster label and narrowed to `backup`; other
    /// backups of the same cluster are ignored.
    pub async fn backup_available(
        &self,
        cluster: &str,
        backup: &str,
        timeout: Option<Duration>,
    ) -> Result<Completed, WaitError<Backup>> {
        let request = WaitRequest::new(
            format!("waiting for backup {} to be available", backup),
            self.timeout(timeout),
        );
        self.run_backup(cluster, Some(backup), &request, &backup_available())
            .await
    }

    /// Wait until the named backup no longer appears in the cluster's backups
    pub async fn backup_not_found(
        &self,
        cluster: &str,
        backup: &str,
        timeout: Option<Duration>,
    ) -> Result<Completed, WaitError<Backup>> {
        let request = WaitRequest::new(
            format!("waiting for backup {} to be deleted", backup),
            self.timeout(timeout),
        )
        .empty_satisfies();
        self.run_backup(cluster, Some(backup), &request, &still_present::<Backup>)
            .await
    }

    /// Wait for a caller-supplied condition on the cluster
    pub async fn cluster_condition<C>(
        &self,
        name: &str,
        request: &WaitRequest,
        condition: &C,
    ) -> Result<Completed, WaitError<Cluster>>
    where
        C: Condition<Cluster> + ?Sized,
    {
        self.run_cluster(name, request, condition).await
    }

    /// Wait for a caller-supplied condition on the cluster's first backup
    pub async fn backup_condition<C>(
        &self,
        cluster: &str,
        request: &WaitRequest,
        condition: &C,
    ) -> Result<Completed, WaitError<Backup>>
    where
        C: Condition<Backup> + ?Sized,
    {
        self.run_backup(cluster, None, request, condition).await
    }

    fn timeout(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or_else(|| self.waiter.default_timeout())
    }

    async fn run_cluster<C>(
        &self,
        name: &str,
        request: &WaitRequest,
        condition: &C,
    ) -> Result<Completed, WaitError<Cluster>>
    where
        C: Condition<Cluster> + ?Sized,
    {
        let source: &S = &self.source;
        let fetch = fetch_fn(move || source.describe_cluster(name));
        self.waiter.wait_for(request, &fetch, condition).await
    }

    async fn run_backup<C>(
        &self,
        cluster: &str,
        backup: Option<&str>,
        request: &WaitRequest,
        condition: &C,
    ) -> Result<Completed, WaitError<Backup>>
    where
        C: Condition<Backup> + ?Sized,
    {
        let source: &S = &self.source;
        let fetch = fetch_fn(move || async move {
            let mut backups = source.list_backups(cluster).await?;
            if let Some(name) = backup {
                backups.retain(|b| b.name_any() == name);
            }
            Ok::<_, Error>(backups)
        });
        self.waiter.wait_for(request, &fetch, condition).await
    }
}

fn request(name: &str, target: &str, timeout: Duration) -> WaitRequest {
    WaitRequest::new(
        format!("waiting for cluster {} to be {}", name, target),
        timeout,
    )
}
