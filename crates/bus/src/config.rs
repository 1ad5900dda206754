//! Router configuration loaded from environment variables.

use std::time::Duration;

const DEFAULT_SAGA_RETENTION_SECS: u64 = 3_600;

/// Router settings.
///
/// Reads from environment variables:
/// - `SAGA_RETENTION_SECS`: how long completed saga correlations are kept
///   before they can be purged (default: `3600`)
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub saga_retention: Duration,
}

impl BusConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            saga_retention: std::env::var("SAGA_RETENTION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_SAGA_RETENTION_SECS)),
        }
    }

    pub fn with_saga_retention(mut self, retention: Duration) -> Self {
        self.saga_retention = retention;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            saga_retention: Duration::from_secs(DEFAULT_SAGA_RETENTION_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(BusConfig::default().saga_retention, Duration::from_secs(3600));
    }
}
