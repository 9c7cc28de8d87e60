//! Permission-resolution cache.
//!
//! An injected, explicitly-scoped abstraction so the resolver never knows
//! whether it is talking to Redis or to process memory. Entries are
//! last-write-wins; concurrent writers for the same principal converge to
//! equivalent values because resolution is a pure function of store state.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, Client};
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::ResolvedPermissionSet;

const CACHE_KEY_PREFIX: &str = "authz:perms:";

#[async_trait]
pub trait PermissionCache: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<ResolvedPermissionSet>, AppError>;
    async fn set(
        &self,
        user_id: Uuid,
        set: &ResolvedPermissionSet,
        ttl_seconds: u64,
    ) -> Result<(), AppError>;
    async fn invalidate(&self, user_id: Uuid) -> Result<(), AppError>;
    async fn clear(&self) -> Result<(), AppError>;
}

fn cache_key(user_id: Uuid) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, user_id)
}

/// Redis-backed cache shared across service instances.
#[derive(Clone)]
pub struct RedisPermissionCache {
    manager: ConnectionManager,
}

impl RedisPermissionCache {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, AppError> {
        let client = Client::open(config.url.clone())?;
        let manager = client.get_connection_manager().await.map_err(|e| {
            AppError::CacheError(anyhow::anyhow!("Failed to connect to Redis: {}", e))
        })?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl PermissionCache for RedisPermissionCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<ResolvedPermissionSet>, AppError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(cache_key(user_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::CacheError(anyhow::anyhow!("Failed to read cache: {}", e)))?;

        match raw {
            Some(json) => {
                let set = serde_json::from_str(&json).map_err(|e| {
                    AppError::CacheError(anyhow::anyhow!("Corrupt cache entry: {}", e))
                })?;
                Ok(Some(set))
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        user_id: Uuid,
        set: &ResolvedPermissionSet,
        ttl_seconds: u64,
    ) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let json = serde_json::to_string(set)
            .map_err(|e| AppError::CacheError(anyhow::anyhow!("Failed to serialize: {}", e)))?;

        redis::cmd("SET")
            .arg(cache_key(user_id))
            .arg(json)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::CacheError(anyhow::anyhow!("Failed to write cache: {}", e)))
    }

    async fn invalidate(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(cache_key(user_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::CacheError(anyhow::anyhow!("Failed to invalidate: {}", e)))
    }

    async fn clear(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let pattern = format!("{}*", CACHE_KEY_PREFIX);
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::CacheError(anyhow::anyhow!("Failed to scan cache: {}", e)))?;

            if !keys.is_empty() {
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, ()>(&mut conn)
                    .await
                    .map_err(|e| {
                        AppError::CacheError(anyhow::anyhow!("Failed to clear cache: {}", e))
                    })?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }
}

/// Process-local cache for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryPermissionCache {
    entries: DashMap<Uuid, (ResolvedPermissionSet, Instant)>,
}

impl MemoryPermissionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionCache for MemoryPermissionCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<ResolvedPermissionSet>, AppError> {
        if let Some(entry) = self.entries.get(&user_id) {
            let (set, deadline) = entry.value();
            if Instant::now() < *deadline {
                return Ok(Some(set.clone()));
            }
        }
        // Expired entries are dropped lazily on read
        self.entries
            .remove_if(&user_id, |_, (_, deadline)| Instant::now() >= *deadline);
        Ok(None)
    }

    async fn set(
        &self,
        user_id: Uuid,
        set: &ResolvedPermissionSet,
        ttl_seconds: u64,
    ) -> Result<(), AppError> {
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries.insert(user_id, (set.clone(), deadline));
        Ok(())
    }

    async fn invalidate(&self, user_id: Uuid) -> Result<(), AppError> {
        self.entries.remove(&user_id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        self.entries.clear();
        Ok(())
    }
}
