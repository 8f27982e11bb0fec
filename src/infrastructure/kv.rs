use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value backend unavailable: {0}")]
    Unavailable(String),
    #[error("stored value is not valid: {0}")]
    Corrupt(String),
}

impl From<redis::RedisError> for KvError {
    fn from(e: redis::RedisError) -> Self {
        KvError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Corrupt(e.to_string())
    }
}

/// String key-value storage with no expiry.
///
/// Backs the per-browser ("local") side of progress and favorites as well as
/// the token revocation list.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Keys starting with `prefix`, in no particular order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

/// Namespaces keys for one browser profile, mirroring how browser local
/// storage is scoped per profile.
pub fn device_key(device_id: &str, key: &str) -> String {
    format!("local:{}:{}", device_id, key)
}
