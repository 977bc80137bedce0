//! Server configuration: `serde` + `toml`-backed structs with
//! `#[serde(default)]` throughout and named preset constructors, matching
//! the teacher's `config::Config` pattern (spec §6).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheConfig as CacheRuntimeConfig;
use crate::pipeline::PipelineConfig as PipelineRuntimeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid server configuration: {reason}")]
    InvalidServer { reason: String },
    #[error("invalid cache configuration: {reason}")]
    InvalidCache { reason: String },
    #[error("invalid pipeline configuration: {reason}")]
    InvalidPipeline { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec!["*".to_string()],
            exposed_headers: vec!["ETag".to_string(), "X-Total-Count".to_string()],
            allow_credentials: false,
            max_age_seconds: 3600,
        }
    }
}

/// Recognised but inert per the Non-goals (TLS termination is delegated to
/// the hosting transport); kept so configuration files that name a TLS
/// block still parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub certificate_path: Option<String>,
    pub key_path: Option<String>,
    pub key_password: Option<String>,
    pub min_version: Option<String>,
    pub require_client_cert: bool,
    pub ca_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKey {
    Ip,
    ApiKey,
    Combined,
}

/// Recognised but inert per the Non-goals (authentication/authorization is
/// delegated); kept so configuration files that name a rate-limit block
/// still parse and the values are available to a hosting reverse proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
    pub keyed_by: RateLimitKey,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window_seconds: 60,
            keyed_by: RateLimitKey::Ip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path_prefix: String,
    pub max_request_body_size: usize,
    pub max_concurrent_requests: usize,
    pub server_name: String,
    pub tls: Option<TlsConfig>,
    pub cors: Option<CorsConfig>,
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path_prefix: "/dicom-web".to_string(),
            max_request_body_size: 64 * 1024 * 1024,
            max_concurrent_requests: 256,
            server_name: "dicomweb-server".to_string(),
            tls: None,
            cors: Some(CorsConfig::default()),
            rate_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl_seconds: u64,
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let runtime = CacheRuntimeConfig::default();
        Self {
            enabled: runtime.enabled,
            default_ttl_seconds: runtime.default_ttl_seconds,
            max_entries: runtime.max_entries,
            max_bytes: runtime.max_bytes,
        }
    }
}

impl From<CacheConfig> for CacheRuntimeConfig {
    fn from(value: CacheConfig) -> Self {
        Self {
            enabled: value.enabled,
            default_ttl_seconds: value.default_ttl_seconds,
            max_entries: value.max_entries,
            max_bytes: value.max_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_pipeline_depth: usize,
    pub enable_pipelining: bool,
    pub strict_ordering: bool,
    pub flush_timeout_seconds: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pipeline_depth: 8,
            enable_pipelining: true,
            strict_ordering: true,
            flush_timeout_seconds: 0.05,
        }
    }
}

impl From<PipelineConfig> for PipelineRuntimeConfig {
    fn from(value: PipelineConfig) -> Self {
        Self {
            max_pipeline_depth: value.max_pipeline_depth.max(1),
            enable_pipelining: value.enable_pipelining,
            strict_ordering: value.strict_ordering,
            flush_timeout: Duration::from_secs_f64(value.flush_timeout_seconds.max(0.001)),
        }
    }
}

/// Top-level configuration (spec §6). Every field carries a default so a
/// partial TOML document is always valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// A preset favouring fast iteration: pipelining and caching enabled
    /// but with short TTLs and permissive CORS.
    pub fn development() -> Self {
        Self::default()
    }

    /// A preset favouring throughput: larger cache bounds, a longer flush
    /// window, and a conservative `server_name`.
    pub fn production() -> Self {
        let mut config = Self::default();
        config.server.max_concurrent_requests = 1024;
        config.cache.max_entries = 10_000;
        config.cache.max_bytes = 512 * 1024 * 1024;
        config.cache.default_ttl_seconds = 300;
        config.pipeline.max_pipeline_depth = 32;
        config
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServer {
                reason: "port must be nonzero".to_string(),
            });
        }
        if self.server.path_prefix.is_empty() || !self.server.path_prefix.starts_with('/') {
            return Err(ConfigError::InvalidServer {
                reason: "path_prefix must start with '/'".to_string(),
            });
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidCache {
                reason: "max_entries must be nonzero".to_string(),
            });
        }
        if self.pipeline.max_pipeline_depth == 0 {
            return Err(ConfigError::InvalidPipeline {
                reason: "max_pipeline_depth must be at least 1".to_string(),
            });
        }
        if self.pipeline.flush_timeout_seconds <= 0.0 {
            return Err(ConfigError::InvalidPipeline {
                reason: "flush_timeout_seconds must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn production_preset_raises_bounds_over_development() {
        let dev = Config::development();
        let prod = Config::production();
        assert!(prod.cache.max_entries > dev.cache.max_entries);
        assert!(prod.server.max_concurrent_requests > dev.server.max_concurrent_requests);
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_document_still_parses_with_defaults() {
        let config: Config = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.path_prefix, "/dicom-web");
        assert!(config.cache.enabled);
    }
}
