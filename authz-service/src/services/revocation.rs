//! Token revocation store.
//!
//! Revoked credential ids live in Redis under `blacklist:{jti}` with a TTL
//! matching the token's remaining lifetime, so entries expire on their own
//! once the token could no longer validate anyway.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

use service_core::error::AppError;

#[async_trait]
pub trait TokenRevocation: Send + Sync {
    async fn revoke(&self, token_jti: &str, expiry_seconds: i64) -> Result<(), AppError>;
    async fn is_revoked(&self, token_jti: &str) -> Result<bool, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct RedisRevocationStore {
    manager: ConnectionManager,
}

impl RedisRevocationStore {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, AppError> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects automatically
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            AppError::CacheError(anyhow::anyhow!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self { manager })
    }
}

#[async_trait]
impl TokenRevocation for RedisRevocationStore {
    async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::CacheError(anyhow::anyhow!("Redis health check failed: {}", e)))
    }

    /// Add a credential id to the blacklist with an expiry.
    async fn revoke(&self, token_jti: &str, expiry_seconds: i64) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let key = format!("blacklist:{}", token_jti);

        redis::cmd("SET")
            .arg(&key)
            .arg("revoked")
            .arg("EX")
            .arg(expiry_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::CacheError(anyhow::anyhow!("Failed to revoke token: {}", e)))
    }

    /// Check whether a credential id is blacklisted.
    async fn is_revoked(&self, token_jti: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let key = format!("blacklist:{}", token_jti);

        let exists: bool = redis::cmd("EXISTS")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::CacheError(anyhow::anyhow!("Failed to check blacklist: {}", e)))?;

        Ok(exists)
    }
}

/// In-memory revocation store for tests.
#[derive(Default)]
pub struct MockRevocationStore {
    pub revoked: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MockRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRevocation for MockRevocationStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn revoke(&self, token_jti: &str, _expiry_seconds: i64) -> Result<(), AppError> {
        self.revoked
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mutex poisoned: {}", e)))?
            .insert(token_jti.to_string());
        Ok(())
    }

    async fn is_revoked(&self, token_jti: &str) -> Result<bool, AppError> {
        let contains = self
            .revoked
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mutex poisoned: {}", e)))?
            .contains(token_jti);
        Ok(contains)
    }
}
