//! VM configuration

use super::defaults::{DEFAULT_GC_INTERVAL, DEFAULT_POLL_INTERVAL};
use serde::Deserialize;
use std::time::Duration;

/// Runtime settings for one [`Vm`](super::Vm)
///
/// Deserializes from the `[vm]` table of a `stratus.toml`:
///
/// ```toml
/// [vm]
/// gc_interval = 512
/// timeout_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmOptions {
    /// Allocations between automatic collections; 0 disables them
    pub gc_interval: usize,
    /// Wall-clock budget for a run
    #[serde(rename = "timeout_ms", deserialize_with = "millis::deserialize")]
    pub timeout: Option<Duration>,
    /// Instructions between timeout checks
    pub poll_interval: u64,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            gc_interval: DEFAULT_GC_INTERVAL,
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl VmOptions {
    pub fn with_gc_interval(mut self, interval: usize) -> Self {
        self.gc_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
