//! Configuration for the moniker service.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use moniker_telemetry::EmitterConfig;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Catalog definition file locations.
    pub catalog: CatalogFileConfig,

    /// Resolution behavior.
    pub resolver: ResolverConfig,

    /// Result cache sizing.
    pub cache: CacheConfig,

    /// Telemetry emitter tuning.
    pub telemetry: TelemetryConfig,

    /// Governance lane tokens.
    pub auth: AuthConfig,
}

impl ServiceConfig {
    /// Builds a configuration from environment variables.
    ///
    /// Reads `MONIKER_CATALOG_FILE`, `MONIKER_DOMAINS_FILE`,
    /// `MONIKER_MODELS_FILE`, `MONIKER_SUBMIT_TOKEN`,
    /// `MONIKER_APPROVE_TOKEN`, and the legacy `MONIKER_WRITE_TOKEN`;
    /// everything else keeps its default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.catalog.path = std::env::var("MONIKER_CATALOG_FILE").ok().map(PathBuf::from);
        for var in ["MONIKER_DOMAINS_FILE", "MONIKER_MODELS_FILE"] {
            if let Ok(path) = std::env::var(var) {
                config.catalog.supplemental_paths.push(PathBuf::from(path));
            }
        }
        config.auth.submit_token = std::env::var("MONIKER_SUBMIT_TOKEN").ok();
        config.auth.approve_token = std::env::var("MONIKER_APPROVE_TOKEN").ok();
        config.auth.legacy_write_token = std::env::var("MONIKER_WRITE_TOKEN").ok();
        config
    }
}

/// Where the catalog is declared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFileConfig {
    /// Main definition file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Supplemental definition files layered over the main one, in
    /// order; later files win on path collision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplemental_paths: Vec<PathBuf>,
}

/// Resolution behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Follow successor pointers away from deprecated nodes.
    pub deprecation_redirects: bool,

    /// Bound on successor chain traversal.
    pub max_successor_hops: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            deprecation_redirects: true,
            max_successor_hops: moniker_catalog::MAX_SUCCESSOR_HOPS,
        }
    }
}

/// Result cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached resolutions.
    pub max_size: usize,

    /// Seconds a cached resolution stays valid.
    pub default_ttl_secs: u64,
}

impl CacheConfig {
    /// The TTL as a duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1024,
            default_ttl_secs: 300,
        }
    }
}

/// Telemetry emitter tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl TelemetryConfig {
    /// Lowers into the emitter's own config type.
    #[must_use]
    pub fn emitter_config(&self) -> EmitterConfig {
        EmitterConfig::new()
            .with_queue_capacity(self.queue_capacity)
            .with_batch_size(self.batch_size)
            .with_flush_interval(Duration::from_millis(self.flush_interval_ms))
            .with_shutdown_timeout(Duration::from_millis(self.shutdown_timeout_ms))
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            batch_size: 64,
            flush_interval_ms: 1000,
            shutdown_timeout_ms: 5000,
        }
    }
}

/// Governance lane tokens; unset lanes get generated tokens at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approve_token: Option<String>,
    /// Single token granting both lanes, for migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_write_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServiceConfig::default();
        assert!(config.resolver.deprecation_redirects);
        assert_eq!(config.resolver.max_successor_hops, 5);
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(config.telemetry.batch_size, 64);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ServiceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.cache.max_size, config.cache.max_size);
        assert_eq!(
            parsed.telemetry.flush_interval_ms,
            config.telemetry.flush_interval_ms
        );
    }

    #[test]
    fn telemetry_config_lowers() {
        let telemetry = TelemetryConfig::default();
        let emitter = telemetry.emitter_config();
        assert_eq!(emitter.queue_capacity, 1024);
        assert_eq!(emitter.flush_interval, Duration::from_millis(1000));
    }
}
