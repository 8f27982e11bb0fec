use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    JwtSecret,
    CacheTtlMs,
    CatalogTimeoutMs,
    TypeTimeoutMs,
    PointTimeoutMs,
    WriteTimeoutMs,
    ProgressLoginPolicy,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::CacheTtlMs => "CACHE_TTL_MS",
            EnvKey::CatalogTimeoutMs => "CATALOG_TIMEOUT_MS",
            EnvKey::TypeTimeoutMs => "TYPE_TIMEOUT_MS",
            EnvKey::PointTimeoutMs => "POINT_TIMEOUT_MS",
            EnvKey::WriteTimeoutMs => "WRITE_TIMEOUT_MS",
            EnvKey::ProgressLoginPolicy => "PROGRESS_LOGIN_POLICY",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
