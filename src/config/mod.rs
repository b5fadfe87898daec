//! # Generation Configuration
//!
//! The small set of knobs a generation pass needs. Loading these from
//! files or the environment is the embedding control plane's job; this
//! struct only validates itself.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Well-known tag key identifying the service a dataplane belongs to
pub const SERVICE_TAG: &str = "kuma.io/service";

/// Well-known tag key identifying the zone/datacenter a dataplane runs in
pub const ZONE_TAG: &str = "kuma.io/zone";

/// Wildcard tag value matching any value for a key
pub const MATCH_ALL: &str = "*";

/// Configuration for one proxy's generation pass
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationConfig {
    /// Connect timeout applied to every emitted cluster, in seconds
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connect timeout must be between 1 and 300 seconds"
    ))]
    pub connect_timeout_secs: u64,

    /// Per-listener downstream connection limit, emitted into the runtime
    /// key/value layer when set
    #[validate(range(min = 1, message = "Connection limit must be positive"))]
    pub listener_connection_limit: Option<u64>,

    /// Stat prefix for emitted network filters
    #[validate(length(min = 1, message = "Stat prefix cannot be empty"))]
    pub stat_prefix: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            listener_connection_limit: None,
            stat_prefix: "meshplane".to_string(),
        }
    }
}

impl GenerationConfig {
    /// Validate the configuration
    pub fn validate_config(&self) -> crate::Result<()> {
        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GenerationConfig::default();
        config.validate_config().expect("default config must validate");
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_rejects_zero_connect_timeout() {
        let config = GenerationConfig { connect_timeout_secs: 0, ..Default::default() };
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn test_rejects_empty_stat_prefix() {
        let config = GenerationConfig { stat_prefix: String::new(), ..Default::default() };
        assert!(config.validate_config().is_err());
    }
}
