//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync scheduling and push payloads.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Period of the background sync timer.
    pub sync_interval: Duration,
    /// Grace delay before the first cycle after `start`.
    pub startup_delay: Duration,
    /// Field that receives the authenticated owner on INSERT push.
    pub owner_field: String,
    /// Upper bound on a single remote call.
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the background sync interval.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the startup grace delay.
    #[must_use]
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Sets the per-call remote timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the owner field name.
    #[must_use]
    pub fn with_owner_field(mut self, field: impl Into<String>) -> Self {
        self.owner_field = field.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            startup_delay: Duration::from_secs(2),
            owner_field: "user_id".into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_sync_interval(Duration::from_secs(60))
            .with_startup_delay(Duration::from_millis(500))
            .with_owner_field("owner_id")
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.startup_delay, Duration::from_millis(500));
        assert_eq!(config.owner_field, "owner_id");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.owner_field, "user_id");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
