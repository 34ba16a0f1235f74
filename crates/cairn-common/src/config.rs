//! Wait configuration
//!
//! Poll cadence is injected per waiter rather than shared through a global
//! constant, so independent waits in different parts of a larger system can
//! run at different cadences without coordinating.
//!
//! Configuration can be built in code, deserialized from a config file, or
//! read from the environment through the [`EnvSource`] trait (which keeps
//! tests free of global state).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Error;

/// Default time between two observations of the same object
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Default deadline for a wait when the caller does not pick one
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default upper bound for a single backoff pause after a transient error
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Environment variable overriding the poll interval (whole seconds)
pub const POLL_INTERVAL_ENV: &str = "CAIRN_POLL_INTERVAL_SECS";

/// Environment variable overriding the default wait deadline (whole seconds)
pub const WAIT_TIMEOUT_ENV: &str = "CAIRN_WAIT_TIMEOUT_SECS";

/// Environment variable overriding the backoff cap (whole seconds)
pub const MAX_RETRY_DELAY_ENV: &str = "CAIRN_MAX_RETRY_DELAY_SECS";

const CONTEXT: &str = "wait config";

/// Trait for reading environment configuration
///
/// Abstracts environment variables so configuration loading can be unit
/// tested without mutating process state.
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Get the value of an environment variable, if set
    fn var(&self, key: &str) -> Option<String>;
}

/// Default implementation that reads from process environment variables
#[derive(Clone, Debug, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Timing configuration for condition waits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitConfig {
    /// Time between two observations
    #[serde(
        rename = "pollIntervalSecs",
        with = "duration_secs",
        default = "default_poll_interval"
    )]
    pub poll_interval: Duration,

    /// Deadline used when a wait does not specify one
    #[serde(
        rename = "defaultTimeoutSecs",
        with = "duration_secs",
        default = "default_wait_timeout"
    )]
    pub default_timeout: Duration,

    /// Cap applied to the pause suggested after a transient fetch error
    #[serde(
        rename = "maxRetryDelaySecs",
        with = "duration_secs",
        default = "default_max_retry_delay"
    )]
    pub max_retry_delay: Duration,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_wait_timeout() -> Duration {
    DEFAULT_WAIT_TIMEOUT
}

fn default_max_retry_delay() -> Duration {
    DEFAULT_MAX_RETRY_DELAY
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: DEFAULT_WAIT_TIMEOUT,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

impl WaitConfig {
    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the default wait deadline
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the backoff cap
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Build a config from defaults overridden by environment variables
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(secs) = read_secs(env, CONTEXT, POLL_INTERVAL_ENV)? {
            config.poll_interval = secs;
        }
        if let Some(secs) = read_secs(env, CONTEXT, WAIT_TIMEOUT_ENV)? {
            config.default_timeout = secs;
        }
        if let Some(secs) = read_secs(env, CONTEXT, MAX_RETRY_DELAY_ENV)? {
            config.max_retry_delay = secs;
        }
        config.validate()?;
        debug!(
            poll_interval_secs = config.poll_interval.as_secs(),
            default_timeout_secs = config.default_timeout.as_secs(),
            max_retry_delay_secs = config.max_retry_delay.as_secs(),
            "Loaded wait config"
        );
        Ok(config)
    }

    /// Reject configurations that would make a wait spin
    pub fn validate(&self) -> Result<(), Error> {
        if self.poll_interval.is_zero() {
            return Err(Error::validation_for_field(
                CONTEXT,
                "pollInterval",
                "poll interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Parse a whole-seconds environment variable
///
/// `context` names the configuration being loaded in validation errors.
pub fn read_secs(
    env: &dyn EnvSource,
    context: &str,
    key: &str,
) -> Result<Option<Duration>, Error> {
    let Some(raw) = env.var(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|e| {
            Error::validation_for_field(
                context,
                key,
                format!("expected whole seconds, got {:?}: {}", raw, e),
            )
        })
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
