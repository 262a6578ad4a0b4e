//! Engine configuration.

use crate::format::MarkerPolicy;
use crate::types::POOL_TAG;
use serde::Deserialize;
use std::time::Duration;

/// Tunables for routing and the background workers.
#[derive(Debug, Clone, Deserialize)]
pub struct MaskingConfig {
    /// Lifecycle tag of inventory numbers eligible for client masking.
    #[serde(default = "default_pool_tag")]
    pub pool_tag: String,

    /// Inactivity window before an assignment is reclaimed.
    #[serde(default = "default_inactivity_ttl", with = "humantime_serde")]
    pub inactivity_ttl: Duration,

    /// How often the deallocation sweeper runs.
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// How often the fallback retrier polls for stuck messages.
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Minimum age of a Pending message before the retrier picks it up.
    #[serde(default = "default_retry_age", with = "humantime_serde")]
    pub retry_age: Duration,

    /// Identity marker placement for first messages of a thread.
    #[serde(default)]
    pub marker: MarkerPolicy,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            pool_tag: default_pool_tag(),
            inactivity_ttl: default_inactivity_ttl(),
            sweep_interval: default_sweep_interval(),
            retry_interval: default_retry_interval(),
            retry_age: default_retry_age(),
            marker: MarkerPolicy::default(),
        }
    }
}

fn default_pool_tag() -> String {
    POOL_TAG.into()
}

fn default_inactivity_ttl() -> Duration {
    Duration::from_secs(14 * 24 * 60 * 60) // 14 days
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60 * 60) // hourly
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_retry_age() -> Duration {
    Duration::from_secs(5 * 60) // 5 minutes
}
