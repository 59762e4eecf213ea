//! Resend tracker configuration.

use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct ResendConfig {
    /// Records older than this are dropped on load and by `prune_persisted`.
    pub max_age: Duration,
    pub max_manual_resends: u32,
    /// Automatic replays per message, e.g. after a restart.
    pub max_auto_resends: u32,
    pub persist_interval: Duration,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            max_age: DAY * 10,
            max_manual_resends: 3,
            max_auto_resends: 2,
            persist_interval: Duration::from_secs(1),
        }
    }
}

impl ResendConfig {
    pub fn max_age_ms(&self) -> u64 {
        u64::try_from(self.max_age.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
impl ResendConfig {
    pub fn for_testing() -> Self {
        Self {
            persist_interval: Duration::from_millis(10),
            ..Self::default()
        }
    }
}
