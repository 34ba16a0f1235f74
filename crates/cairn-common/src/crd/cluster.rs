//! Cluster Custom Resource Definition
//!
//! A Cluster is a Kubernetes cluster whose lifecycle (install, backup,
//! restore, scale, uninstall) is driven by node agents. The status is the
//! observable result of that remote work.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterPhase, ComponentCondition, ComponentStatus};

/// An add-on component installed into a cluster
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    /// Add-on name (e.g., "nfs-provisioner")
    pub name: String,

    /// Add-on version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Addon {
    /// Create an add-on reference
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// Specification for a Cluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cairn.dev",
    version = "v1",
    kind = "Cluster",
    plural = "clusters",
    shortname = "cc",
    status = "ClusterStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"K8s","type":"string","jsonPath":".spec.kubernetesVersion"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Kubernetes version installed on the nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,

    /// Add-ons attached to the cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addons: Vec<Addon>,
}

/// Status of a Cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Current lifecycle phase
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Per-component health reported by the node agents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_conditions: Vec<ComponentCondition>,
}

impl ClusterStatus {
    /// Status in the given phase with no component conditions
    pub fn with_phase(phase: ClusterPhase) -> Self {
        Self {
            phase,
            component_conditions: Vec::new(),
        }
    }
}

impl Cluster {
    /// Current phase; a cluster without status is Pending
    pub fn phase(&self) -> ClusterPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Reported health of the named component, if the component is listed
    pub fn component_status(&self, component: &str) -> Option<ComponentStatus> {
        self.status
            .as_ref()?
            .component_conditions
            .iter()
            .find(|c| c.name == component)
            .map(|c| c.status)
    }

    /// Add-ons currently attached to the cluster
    pub fn addons(&self) -> &[Addon] {
        &self.spec.addons
    }
}
