//! Configuration types for the trustnet system
//!
//! This module defines the configuration surface consumed by the core.
//! All limits and capacities carry defaults suitable for a single hosting
//! node; every value is validated to be non-zero at engine construction.

use serde::{Deserialize, Serialize};

/// Main trustnet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustnetConfig {
    /// Maximum number of registered providers
    #[serde(default = "default_max_providers")]
    pub max_providers: usize,

    /// Maximum combined count of addresses and ranges a single provider
    /// may declare across both address families
    #[serde(default = "default_max_ips_per_provider")]
    pub max_ips_per_provider: usize,

    /// Capacity of the parsed-range cache
    #[serde(default = "default_range_cache_capacity")]
    pub range_cache_capacity: usize,

    /// Capacity of the lookup-result cache
    #[serde(default = "default_result_cache_capacity")]
    pub result_cache_capacity: usize,

    /// Time-to-live for cached lookup results (seconds)
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// Age after which a provider's data is considered stale (seconds)
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,
}

impl TrustnetConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            max_providers: default_max_providers(),
            max_ips_per_provider: default_max_ips_per_provider(),
            range_cache_capacity: default_range_cache_capacity(),
            result_cache_capacity: default_result_cache_capacity(),
            result_ttl_secs: default_result_ttl_secs(),
            staleness_threshold_secs: default_staleness_threshold_secs(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_providers == 0 {
            return Err(crate::Error::config("max_providers must be > 0"));
        }
        if self.max_ips_per_provider == 0 {
            return Err(crate::Error::config("max_ips_per_provider must be > 0"));
        }
        if self.range_cache_capacity == 0 {
            return Err(crate::Error::config("range_cache_capacity must be > 0"));
        }
        if self.result_cache_capacity == 0 {
            return Err(crate::Error::config("result_cache_capacity must be > 0"));
        }
        if self.result_ttl_secs == 0 {
            return Err(crate::Error::config("result_ttl_secs must be > 0"));
        }
        if self.staleness_threshold_secs == 0 {
            return Err(crate::Error::config("staleness_threshold_secs must be > 0"));
        }
        Ok(())
    }
}

impl Default for TrustnetConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_max_providers() -> usize {
    100
}

fn default_max_ips_per_provider() -> usize {
    10_000
}

fn default_range_cache_capacity() -> usize {
    5_000
}

fn default_result_cache_capacity() -> usize {
    10_000
}

fn default_result_ttl_secs() -> u64 {
    3_600
}

fn default_staleness_threshold_secs() -> u64 {
    86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TrustnetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_providers, 100);
        assert_eq!(config.max_ips_per_provider, 10_000);
        assert_eq!(config.range_cache_capacity, 5_000);
        assert_eq!(config.result_cache_capacity, 10_000);
        assert_eq!(config.result_ttl_secs, 3_600);
        assert_eq!(config.staleness_threshold_secs, 86_400);
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = TrustnetConfig::default();
        config.result_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = TrustnetConfig::default();
        config.range_cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: TrustnetConfig =
            serde_json::from_str(r#"{ "max_providers": 5 }"#).unwrap();
        assert_eq!(config.max_providers, 5);
        assert_eq!(config.result_cache_capacity, 10_000);
    }
}
