//! Fast-tier adapter over Redis.

use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Pool};
use shaku::Component;
use std::sync::Arc;
use std::time::Duration;
use strata_config::FastStoreConfig;
use strata_core::{Interface, StrataError, StrataResult};
use tokio::time::timeout;
use tracing::{debug, info};

/// Default per-command latency bound.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Contract over the low-latency key-value tier.
///
/// Every operation is bounded by the adapter's own timeout; a slow tier
/// surfaces as a failure rather than a hang. Values are type-erased JSON
/// strings to keep the trait dyn-compatible.
#[async_trait]
pub trait FastStore: Interface + Send + Sync {
    /// Get a raw value. Returns `None` if the key doesn't exist or has
    /// expired.
    async fn get(&self, key: &str) -> StrataResult<Option<String>>;

    /// Set a raw value with a TTL.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()>;

    /// Delete a key. Returns `true` if the key existed and was deleted.
    async fn delete(&self, key: &str) -> StrataResult<bool>;

    /// List keys matching a glob pattern. Bulk invalidation only.
    async fn keys_matching(&self, pattern: &str) -> StrataResult<Vec<String>>;

    /// Round-trip liveness probe.
    async fn ping(&self) -> StrataResult<()>;

    /// Release the underlying connection pool. Idempotent.
    fn close(&self);
}

/// Redis-backed fast store over a deadpool connection pool.
#[derive(Component)]
#[shaku(interface = FastStore)]
pub struct RedisFastStore {
    /// Redis connection pool.
    pool: Option<Arc<Pool>>,
    /// Per-command latency bound.
    #[shaku(default = DEFAULT_OP_TIMEOUT)]
    op_timeout: Duration,
}

impl RedisFastStore {
    /// Create a fast store over an existing pool.
    #[must_use]
    pub fn new(pool: Arc<Pool>) -> Self {
        Self {
            pool: Some(pool),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Create a fast store with a custom per-command latency bound.
    #[must_use]
    pub fn with_timeout(pool: Arc<Pool>, op_timeout: Duration) -> Self {
        Self {
            pool: Some(pool),
            op_timeout,
        }
    }

    /// Create the connection pool from configuration and wrap it.
    ///
    /// Pool construction is lazy on the Redis side; the first command
    /// establishes the connection, so this does not fail on an
    /// unreachable server, only on an unparseable URL.
    pub fn connect(config: &FastStoreConfig) -> StrataResult<Self> {
        info!("Creating Redis connection pool for {}", config.url);

        let mut pool_config = deadpool_redis::Config::from_url(&config.url);
        pool_config.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size as usize));
        let pool = pool_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| {
                StrataError::fast_store(format!("Failed to create Redis pool: {}", e))
            })?;

        Ok(Self {
            pool: Some(Arc::new(pool)),
            op_timeout: config.op_timeout(),
        })
    }

    /// Get a connection from the pool, bounded by the operation timeout.
    async fn conn(&self) -> StrataResult<deadpool_redis::Connection> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| StrataError::fast_store("Connection pool is closed"))?;

        timeout(self.op_timeout, pool.get())
            .await
            .map_err(|_| StrataError::timeout("Acquire Redis connection"))?
            .map_err(|e| StrataError::fast_store(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn get(&self, key: &str) -> StrataResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = timeout(self.op_timeout, conn.get(key))
            .await
            .map_err(|_| StrataError::timeout(format!("GET '{}'", key)))?
            .map_err(|e| StrataError::fast_store(format!("Failed to get key '{}': {}", key, e)))?;

        match &value {
            Some(_) => debug!("Fast tier hit for key '{}'", key),
            None => debug!("Fast tier miss for key '{}'", key),
        }

        Ok(value)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()> {
        let mut conn = self.conn().await?;
        let ttl_secs = ttl.as_secs().max(1);

        timeout(self.op_timeout, conn.set_ex::<_, _, ()>(key, value, ttl_secs))
            .await
            .map_err(|_| StrataError::timeout(format!("SETEX '{}'", key)))?
            .map_err(|e| StrataError::fast_store(format!("Failed to set key '{}': {}", key, e)))?;

        debug!("Fast tier cached key '{}' with TTL {}s", key, ttl_secs);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = timeout(self.op_timeout, conn.del(key))
            .await
            .map_err(|_| StrataError::timeout(format!("DEL '{}'", key)))?
            .map_err(|e| {
                StrataError::fast_store(format!("Failed to delete key '{}': {}", key, e))
            })?;

        debug!("Fast tier deleted key '{}': {}", key, deleted > 0);
        Ok(deleted > 0)
    }

    async fn keys_matching(&self, pattern: &str) -> StrataResult<Vec<String>> {
        let mut conn = self.conn().await?;

        // KEYS is acceptable here: invalidation patterns are scoped to one
        // artifact and principal (SCAN would be needed for broad patterns)
        let keys: Vec<String> = timeout(
            self.op_timeout,
            deadpool_redis::redis::cmd("KEYS")
                .arg(pattern)
                .query_async(&mut conn),
        )
        .await
        .map_err(|_| StrataError::timeout(format!("KEYS '{}'", pattern)))?
        .map_err(|e| StrataError::fast_store(format!("Failed to scan keys: {}", e)))?;

        Ok(keys)
    }

    async fn ping(&self) -> StrataResult<()> {
        let mut conn = self.conn().await?;
        let _: String = timeout(
            self.op_timeout,
            deadpool_redis::redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| StrataError::timeout("PING"))?
        .map_err(|e| StrataError::fast_store(format!("Ping failed: {}", e)))?;

        Ok(())
    }

    fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close();
            info!("Fast store connection pool closed");
        }
    }
}

impl std::fmt::Debug for RedisFastStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisFastStore")
            .field("connected", &self.pool.is_some())
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}
