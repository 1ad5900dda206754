//! Gateway configuration loaded from environment variables.

use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Persistence settings.
///
/// Reads from environment variables:
/// - `PERSISTENCE_TIMEOUT_MS`: bound on every gateway operation (default: `5000`)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub operation_timeout: Duration,
}

impl StoreConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            operation_timeout: std::env::var("PERSISTENCE_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.operation_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_override_timeout() {
        let config = StoreConfig::default().with_operation_timeout(Duration::from_millis(10));
        assert_eq!(config.operation_timeout, Duration::from_millis(10));
    }
}
