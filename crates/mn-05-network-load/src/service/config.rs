//! Monitor configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NetworkLoadConfig {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for NetworkLoadConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(15),
            interval: Duration::from_secs(180),
        }
    }
}

#[cfg(test)]
impl NetworkLoadConfig {
    pub fn for_testing() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_secs(1),
        }
    }
}
