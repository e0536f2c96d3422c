//! Durable-tier adapter over Postgres.
//!
//! Rows are append-only: writes insert, reads take the newest row by
//! `written_at` for the requested key. Nothing here deletes; stale rows
//! stop being served once the freshness policy rejects them.

use async_trait::async_trait;
use shaku::Component;
use sqlx::postgres::{PgPool, PgPoolOptions};
use strata_config::DurableStoreConfig;
use strata_core::{
    AnalysisRecord, Interface, MetadataRecord, StrataError, StrataResult, UserStatsRecord,
};
use tracing::{debug, info, warn};

/// Default schema for the cache tables.
pub const DEFAULT_DATASET: &str = "strata_cache";

/// Contract over the append-oriented analytical tier.
///
/// Inserts are best-effort: a quota-style rejection surfaces as
/// `StrataError::QuotaRejected`, which the write path treats as soft.
#[async_trait]
pub trait DurableStore: Interface + Send + Sync {
    /// Create the schema and tables if missing. Idempotent, startup-only.
    async fn ensure_schema(&self) -> StrataResult<()>;

    /// Append a metadata record.
    async fn insert_metadata(&self, record: &MetadataRecord) -> StrataResult<()>;

    /// Newest metadata row for `(artifact_id, principal)`, if any.
    async fn latest_metadata(
        &self,
        artifact_id: &str,
        principal: &str,
    ) -> StrataResult<Option<MetadataRecord>>;

    /// Append an analysis record.
    async fn insert_analysis(&self, record: &AnalysisRecord) -> StrataResult<()>;

    /// Newest analysis row for the derived key, if any.
    async fn latest_analysis(&self, analysis_key: &str) -> StrataResult<Option<AnalysisRecord>>;

    /// Append a per-principal statistics record.
    async fn insert_stats(&self, record: &UserStatsRecord) -> StrataResult<()>;

    /// Newest statistics row for the principal, if any.
    async fn latest_stats(&self, principal: &str) -> StrataResult<Option<UserStatsRecord>>;

    /// Liveness probe.
    async fn health_probe(&self) -> StrataResult<()>;

    /// Whether the tier is active. When disabled, every call is a no-op
    /// success.
    fn is_enabled(&self) -> bool;
}

/// Postgres-backed durable store.
#[derive(Component)]
#[shaku(interface = DurableStore)]
pub struct PostgresDurableStore {
    /// Connection pool. `None` means the tier is disabled by
    /// configuration.
    pool: Option<PgPool>,
    /// Schema holding the cache tables.
    #[shaku(default = DEFAULT_DATASET.to_string())]
    dataset: String,
}

impl PostgresDurableStore {
    /// Create a durable store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool, dataset: impl Into<String>) -> Self {
        Self {
            pool: Some(pool),
            dataset: dataset.into(),
        }
    }

    /// Connect to Postgres from configuration.
    pub async fn connect(config: &DurableStoreConfig) -> StrataResult<Self> {
        info!("Connecting to durable store...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to durable store: {}", e);
                StrataError::durable_store(format!("Failed to connect: {}", e))
            })?;

        info!("Durable store connection pool established");
        Ok(Self {
            pool: Some(pool),
            dataset: config.dataset.clone(),
        })
    }

    /// Create a disabled durable store (the feature flag is off).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            pool: None,
            dataset: DEFAULT_DATASET.to_string(),
        }
    }

    fn pool(&self) -> StrataResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| StrataError::durable_store("Durable tier is disabled"))
    }

    async fn fetch_payload(
        &self,
        sql: &str,
        binds: &[&str],
        key_label: &str,
    ) -> StrataResult<Option<serde_json::Value>> {
        let pool = self.pool()?;
        let mut query = sqlx::query_as::<_, (serde_json::Value,)>(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let row = query.fetch_optional(pool).await?;
        if row.is_none() {
            debug!("Durable tier miss for {}", key_label);
        }
        Ok(row.map(|(payload,)| payload))
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    payload: serde_json::Value,
    key_label: &str,
) -> StrataResult<T> {
    serde_json::from_value(payload)
        .map_err(|e| StrataError::malformed(key_label.to_string(), e.to_string()))
}

#[async_trait]
impl DurableStore for PostgresDurableStore {
    async fn ensure_schema(&self) -> StrataResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let pool = self.pool()?;
        let ds = &self.dataset;

        let statements = [
            format!("CREATE SCHEMA IF NOT EXISTS {}", ds),
            format!(
                "CREATE TABLE IF NOT EXISTS {}.artifact_metadata (\
                 artifact_id TEXT NOT NULL, \
                 principal TEXT NOT NULL, \
                 payload JSONB NOT NULL, \
                 written_at TIMESTAMPTZ NOT NULL, \
                 schema_version INT NOT NULL)",
                ds
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS artifact_metadata_latest_idx \
                 ON {}.artifact_metadata (artifact_id, principal, written_at DESC)",
                ds
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}.artifact_analysis (\
                 analysis_key TEXT NOT NULL, \
                 artifact_id TEXT NOT NULL, \
                 principal TEXT NOT NULL, \
                 payload JSONB NOT NULL, \
                 written_at TIMESTAMPTZ NOT NULL, \
                 schema_version INT NOT NULL)",
                ds
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS artifact_analysis_latest_idx \
                 ON {}.artifact_analysis (analysis_key, written_at DESC)",
                ds
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}.principal_stats (\
                 principal TEXT NOT NULL, \
                 payload JSONB NOT NULL, \
                 written_at TIMESTAMPTZ NOT NULL, \
                 schema_version INT NOT NULL)",
                ds
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS principal_stats_latest_idx \
                 ON {}.principal_stats (principal, written_at DESC)",
                ds
            ),
        ];

        for statement in &statements {
            sqlx::query(statement).execute(pool).await?;
        }

        info!("Durable store schema '{}' ensured", ds);
        Ok(())
    }

    async fn insert_metadata(&self, record: &MetadataRecord) -> StrataResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let payload = serde_json::to_value(record)?;
        sqlx::query(&format!(
            "INSERT INTO {}.artifact_metadata \
             (artifact_id, principal, payload, written_at, schema_version) \
             VALUES ($1, $2, $3, $4, $5)",
            self.dataset
        ))
        .bind(&record.artifact_id)
        .bind(&record.principal)
        .bind(&payload)
        .bind(record.written_at)
        .bind(record.schema_version as i32)
        .execute(self.pool()?)
        .await?;

        debug!(
            "Durable tier appended metadata for {} / {}",
            record.artifact_id, record.principal
        );
        Ok(())
    }

    async fn latest_metadata(
        &self,
        artifact_id: &str,
        principal: &str,
    ) -> StrataResult<Option<MetadataRecord>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let key_label = format!("artifact_metadata:{}:{}", artifact_id, principal);
        let sql = format!(
            "SELECT payload FROM {}.artifact_metadata \
             WHERE artifact_id = $1 AND principal = $2 \
             ORDER BY written_at DESC LIMIT 1",
            self.dataset
        );
        let payload = self
            .fetch_payload(&sql, &[artifact_id, principal], &key_label)
            .await?;
        payload.map(|p| decode(p, &key_label)).transpose()
    }

    async fn insert_analysis(&self, record: &AnalysisRecord) -> StrataResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let payload = serde_json::to_value(record)?;
        sqlx::query(&format!(
            "INSERT INTO {}.artifact_analysis \
             (analysis_key, artifact_id, principal, payload, written_at, schema_version) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            self.dataset
        ))
        .bind(&record.analysis_key)
        .bind(&record.artifact_id)
        .bind(&record.principal)
        .bind(&payload)
        .bind(record.written_at)
        .bind(record.schema_version as i32)
        .execute(self.pool()?)
        .await?;

        debug!("Durable tier appended analysis {}", record.analysis_key);
        Ok(())
    }

    async fn latest_analysis(&self, analysis_key: &str) -> StrataResult<Option<AnalysisRecord>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let key_label = format!("artifact_analysis:{}", analysis_key);
        let sql = format!(
            "SELECT payload FROM {}.artifact_analysis \
             WHERE analysis_key = $1 \
             ORDER BY written_at DESC LIMIT 1",
            self.dataset
        );
        let payload = self.fetch_payload(&sql, &[analysis_key], &key_label).await?;
        payload.map(|p| decode(p, &key_label)).transpose()
    }

    async fn insert_stats(&self, record: &UserStatsRecord) -> StrataResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let payload = serde_json::to_value(record)?;
        sqlx::query(&format!(
            "INSERT INTO {}.principal_stats \
             (principal, payload, written_at, schema_version) \
             VALUES ($1, $2, $3, $4)",
            self.dataset
        ))
        .bind(&record.principal)
        .bind(&payload)
        .bind(record.written_at)
        .bind(record.schema_version as i32)
        .execute(self.pool()?)
        .await?;

        debug!("Durable tier appended stats for {}", record.principal);
        Ok(())
    }

    async fn latest_stats(&self, principal: &str) -> StrataResult<Option<UserStatsRecord>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let key_label = format!("principal_stats:{}", principal);
        let sql = format!(
            "SELECT payload FROM {}.principal_stats \
             WHERE principal = $1 \
             ORDER BY written_at DESC LIMIT 1",
            self.dataset
        );
        let payload = self.fetch_payload(&sql, &[principal], &key_label).await?;
        payload.map(|p| decode(p, &key_label)).transpose()
    }

    async fn health_probe(&self) -> StrataResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        sqlx::query("SELECT 1")
            .execute(self.pool()?)
            .await
            .map_err(|e| StrataError::durable_store(format!("Health probe failed: {}", e)))?;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }
}

impl std::fmt::Debug for PostgresDurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDurableStore")
            .field("enabled", &self.is_enabled())
            .field("dataset", &self.dataset)
            .finish()
    }
}
