//! Cairn node agent
//!
//! The agent runs on every node and executes cluster lifecycle tasks
//! (install, backup, restore, uninstall) received from the message queue.
//! The condition waits in `cairn-wait` observe the results of that work.
//!
//! This crate owns the agent's lifecycle: build the task service from
//! configuration, prepare it, run it until the stop token fires, then close
//! it. Queue transport and lease renewal live behind [`TaskService`].

#![deny(missing_docs)]

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cairn_common::Error;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use config::AgentConfig;

/// Options handed to the task service when it is built
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskServiceOptions {
    /// Agent id used to subscribe to the task queue
    pub agent_id: String,
    /// Region reported with node status
    pub region: String,
    /// How often node status is reported
    pub node_status_update_frequency: Duration,
    /// Node lease lifetime in seconds
    pub lease_duration_seconds: u64,
    /// Message queue endpoint
    pub queue_endpoint: String,
    /// Image repository mirror, if any
    pub repo_mirror: Option<String>,
}

impl From<&AgentConfig> for TaskServiceOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            region: config.region.clone(),
            node_status_update_frequency: config.node_status_update_frequency,
            lease_duration_seconds: config.lease_duration_seconds,
            queue_endpoint: config.queue_endpoint.clone(),
            repo_mirror: config.repo_mirror.clone(),
        }
    }
}

/// Long-running service executing tasks for this node
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Connect and register; must complete before [`TaskService::run`]
    async fn prepare_run(&self, stop: CancellationToken) -> Result<(), Error>;

    /// Start processing tasks in the background and return
    async fn run(&self, stop: CancellationToken) -> Result<(), Error>;

    /// Release connections and leases
    async fn close(&self);
}

/// Factory for the task service
#[cfg_attr(test, automock)]
pub trait TaskServiceBuilder: Send + Sync {
    /// Build a task service from options
    fn build(&self, options: TaskServiceOptions) -> Result<Arc<dyn TaskService>, Error>;
}

/// Drives a task service through prepare, run and close
pub struct AgentServer {
    config: AgentConfig,
    builder: Arc<dyn TaskServiceBuilder>,
    service: Option<Arc<dyn TaskService>>,
}

impl AgentServer {
    /// Create a server; nothing is built until [`AgentServer::prepare_run`]
    pub fn new(config: AgentConfig, builder: Arc<dyn TaskServiceBuilder>) -> Self {
        Self {
            config,
            builder,
            service: None,
        }
    }

    /// The agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Build the task service and prepare it
    pub async fn prepare_run(&mut self, stop: CancellationToken) -> Result<(), Error> {
        self.config.validate()?;
        info!(
            agent_id = %self.config.agent_id,
            region = %self.config.region,
            "Preparing task service"
        );
        let service = self.builder.build(TaskServiceOptions::from(&self.config))?;
        service.prepare_run(stop).await?;
        self.service = Some(service);
        Ok(())
    }

    /// Run the task service until `stop` is cancelled, then close it
    pub async fn run(&self, stop: CancellationToken) -> Result<(), Error> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| Error::internal_with_context("agent", "run called before prepare_run"))?;

        service.run(stop.clone()).await?;
        info!(agent_id = %self.config.agent_id, "Agent running");

        stop.cancelled().await;
        debug!("Received stop signal, exiting");
        service.close().await;
        Ok(())
    }
}
