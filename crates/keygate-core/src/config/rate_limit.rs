//! Request rate limiting configuration.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Rate limiting configuration for the three request scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Limit applied to every `/api` request.
    #[serde(default = "default_api")]
    pub api: ScopeLimitConfig,
    /// Limit applied to non-API (web) requests.
    #[serde(default = "default_web")]
    pub web: ScopeLimitConfig,
    /// Limit applied to login and registration. Always enforced.
    #[serde(default)]
    pub critical: CriticalLimitConfig,
    /// How often every limiter map is cleared, in seconds.
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_seconds: u64,
    /// Peers allowed to set `X-Forwarded-For` and `X-Real-IP`.
    ///
    /// Unset means the headers are always honored. When set, a request from
    /// any other peer is keyed by its socket address.
    #[serde(default)]
    pub trusted_proxies: Option<Vec<IpAddr>>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            web: default_web(),
            critical: CriticalLimitConfig::default(),
            eviction_interval_seconds: default_eviction_interval(),
            trusted_proxies: None,
        }
    }
}

/// A toggleable `count` per `duration_seconds` limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Bucket capacity.
    pub count: u32,
    /// Window over which `count` requests refill.
    pub duration_seconds: u64,
}

/// Limit for critical operations. It has no switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalLimitConfig {
    #[serde(default = "default_critical_count")]
    pub count: u32,
    #[serde(default = "default_critical_duration")]
    pub duration_seconds: u64,
}

impl Default for CriticalLimitConfig {
    fn default() -> Self {
        Self {
            count: default_critical_count(),
            duration_seconds: default_critical_duration(),
        }
    }
}

fn default_api() -> ScopeLimitConfig {
    ScopeLimitConfig {
        enabled: false,
        count: 60,
        duration_seconds: 60,
    }
}

fn default_web() -> ScopeLimitConfig {
    ScopeLimitConfig {
        enabled: false,
        count: 60,
        duration_seconds: 60,
    }
}

fn default_critical_count() -> u32 {
    20
}

fn default_critical_duration() -> u64 {
    1200
}

fn default_eviction_interval() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusted_proxies_parse_from_strings() {
        let config: RateLimitConfig = serde_json::from_value(serde_json::json!({
            "trusted_proxies": ["10.0.0.1", "::1"]
        }))
        .unwrap();
        let proxies = config.trusted_proxies.unwrap();
        assert_eq!(proxies.len(), 2);
        assert!(proxies[1].is_loopback());
        assert!(!config.api.enabled);
    }

    #[test]
    fn trusted_proxies_default_to_unset() {
        assert!(RateLimitConfig::default().trusted_proxies.is_none());
    }
}
