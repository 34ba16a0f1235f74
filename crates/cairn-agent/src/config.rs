//! Agent configuration
//!
//! Loaded from the environment through [`EnvSource`] so tests never touch
//! process state.

use std::time::Duration;

use cairn_common::config::read_secs;
use cairn_common::{EnvSource, Error};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable holding the agent id
pub const AGENT_ID_ENV: &str = "CAIRN_AGENT_ID";
/// Environment variable holding the region label
pub const REGION_ENV: &str = "CAIRN_REGION";
/// Environment variable overriding the node status update frequency (seconds)
pub const NODE_STATUS_UPDATE_ENV: &str = "CAIRN_NODE_STATUS_UPDATE_SECS";
/// Environment variable overriding the lease duration (seconds)
pub const LEASE_DURATION_ENV: &str = "CAIRN_LEASE_DURATION_SECS";
/// Environment variable holding the message queue endpoint
pub const QUEUE_ENDPOINT_ENV: &str = "CAIRN_QUEUE_ENDPOINT";
/// Environment variable holding the image repository mirror
pub const REPO_MIRROR_ENV: &str = "CAIRN_REPO_MIRROR";

/// Default region when none is configured
pub const DEFAULT_REGION: &str = "default";
/// Default interval between node status reports
pub const DEFAULT_NODE_STATUS_UPDATE_FREQUENCY: Duration = Duration::from_secs(60);
/// Default node lease duration
pub const DEFAULT_LEASE_DURATION_SECONDS: u64 = 240;

const CONTEXT: &str = "agent config";

/// Configuration of a node agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Unique id of this agent (usually the node id)
    pub agent_id: String,
    /// Region the node belongs to
    pub region: String,
    /// How often the agent reports node status
    #[serde(with = "secs")]
    pub node_status_update_frequency: Duration,
    /// Lifetime of the node lease; must outlast several status updates
    pub lease_duration_seconds: u64,
    /// Message queue the agent receives tasks from
    pub queue_endpoint: String,
    /// Image repository mirror used when installing components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_mirror: Option<String>,
}

impl AgentConfig {
    /// Config with defaults for everything but the identity and queue
    pub fn new(agent_id: impl Into<String>, queue_endpoint: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            region: DEFAULT_REGION.to_string(),
            node_status_update_frequency: DEFAULT_NODE_STATUS_UPDATE_FREQUENCY,
            lease_duration_seconds: DEFAULT_LEASE_DURATION_SECONDS,
            queue_endpoint: queue_endpoint.into(),
            repo_mirror: None,
        }
    }

    /// Read the config from the environment and validate it
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, Error> {
        let agent_id = required(env, AGENT_ID_ENV)?;
        let queue_endpoint = required(env, QUEUE_ENDPOINT_ENV)?;
        let mut config = Self::new(agent_id, queue_endpoint);

        if let Some(region) = optional(env, REGION_ENV) {
            config.region = region;
        }
        if let Some(freq) = read_secs(env, CONTEXT, NODE_STATUS_UPDATE_ENV)? {
            config.node_status_update_frequency = freq;
        }
        if let Some(lease) = read_secs(env, CONTEXT, LEASE_DURATION_ENV)? {
            config.lease_duration_seconds = lease.as_secs();
        }
        config.repo_mirror = optional(env, REPO_MIRROR_ENV);

        config.validate()?;
        debug!(
            agent_id = %config.agent_id,
            region = %config.region,
            lease_duration_seconds = config.lease_duration_seconds,
            "Loaded agent config"
        );
        Ok(config)
    }

    /// Check field values and their relationships
    pub fn validate(&self) -> Result<(), Error> {
        if self.agent_id.trim().is_empty() {
            return Err(Error::validation_for_field(
                CONTEXT,
                "agentId",
                "agent id cannot be empty",
            ));
        }
        if self.queue_endpoint.trim().is_empty() {
            return Err(Error::validation_for_field(
                CONTEXT,
                "queueEndpoint",
                "queue endpoint cannot be empty",
            ));
        }
        if self.node_status_update_frequency.is_zero() {
            return Err(Error::validation_for_field(
                CONTEXT,
                "nodeStatusUpdateFrequency",
                "node status update frequency must be greater than zero",
            ));
        }
        if Duration::from_secs(self.lease_duration_seconds) <= self.node_status_update_frequency {
            return Err(Error::validation_for_field(
                CONTEXT,
                "leaseDurationSeconds",
                format!(
                    "lease duration ({}s) must be longer than the node status update frequency ({}s)",
                    self.lease_duration_seconds,
                    self.node_status_update_frequency.as_secs()
                ),
            ));
        }
        Ok(())
    }
}

fn optional(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(env: &dyn EnvSource, key: &str) -> Result<String, Error> {
    optional(env, key).ok_or_else(|| {
        Error::validation_for_field(CONTEXT, key, format!("{} must be set", key))
    })
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
