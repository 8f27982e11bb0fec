use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::env::{self, EnvKey};
use crate::modules::content::cache::CacheSettings;
use crate::modules::progress::model::LoginPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub cache_ttl_ms: u64,
    pub catalog_timeout_ms: u64,
    pub type_timeout_ms: u64,
    pub point_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub login_policy: LoginPolicy,
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::Missing(name))
}

/// Unset means the default policy; a value that does not parse is an error.
fn login_policy(raw: Option<String>) -> Result<LoginPolicy, ConfigError> {
    match raw {
        None => Ok(LoginPolicy::default()),
        Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
            key: EnvKey::ProgressLoginPolicy.as_str(),
            reason,
        }),
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let catalog_timeout_ms = env::get_parsed(EnvKey::CatalogTimeoutMs, 10_000);
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: required(EnvKey::DatabaseUrl)?,
            redis_url: required(EnvKey::RedisUrl)?,
            jwt_secret: required(EnvKey::JwtSecret)?,
            cache_ttl_ms: env::get_parsed(EnvKey::CacheTtlMs, 30_000),
            catalog_timeout_ms,
            type_timeout_ms: env::get_parsed(EnvKey::TypeTimeoutMs, catalog_timeout_ms),
            point_timeout_ms: env::get_parsed(EnvKey::PointTimeoutMs, 8_000),
            write_timeout_ms: env::get_parsed(EnvKey::WriteTimeoutMs, 10_000),
            login_policy: login_policy(env::get(EnvKey::ProgressLoginPolicy).ok())?,
        })
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_millis(self.cache_ttl_ms),
            catalog_timeout: Duration::from_millis(self.catalog_timeout_ms),
            type_timeout: Duration::from_millis(self.type_timeout_ms),
            point_timeout: Duration::from_millis(self.point_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}
