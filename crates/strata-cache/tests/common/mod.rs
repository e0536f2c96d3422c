//! In-memory tier fakes for coordinator integration tests.
//!
//! TTLs are accepted but not enforced by the fakes; staleness tests
//! drive the freshness policy through `written_at` instead. Each fake can
//! be flipped into a failing state to exercise the degraded paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use strata_core::{AnalysisRecord, MetadataRecord, StrataError, StrataResult, UserStatsRecord};
use strata_store::{DurableStore, FastStore};

/// In-memory fast tier.
#[derive(Default)]
pub struct MemoryFastStore {
    entries: Mutex<HashMap<String, String>>,
    down: AtomicBool,
}

impl MemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the tier into (or out of) a failing state.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Seed a raw entry, bypassing the adapter contract.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Direct read of a raw entry, bypassing the adapter contract.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn check_up(&self) -> StrataResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StrataError::fast_store("fast store offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FastStore for MemoryFastStore {
    async fn get(&self, key: &str) -> StrataResult<Option<String>> {
        self.check_up()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, _ttl: Duration) -> StrataResult<()> {
        self.check_up()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        self.check_up()?;
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn keys_matching(&self, pattern: &str) -> StrataResult<Vec<String>> {
        self.check_up()?;
        let entries = self.entries.lock().unwrap();
        let keys = match pattern.strip_suffix('*') {
            Some(prefix) => entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            None => entries.keys().filter(|k| *k == pattern).cloned().collect(),
        };
        Ok(keys)
    }

    async fn ping(&self) -> StrataResult<()> {
        self.check_up()
    }

    fn close(&self) {}
}

/// In-memory append-only durable tier.
#[derive(Default)]
pub struct MemoryDurableStore {
    metadata: Mutex<Vec<MetadataRecord>>,
    analysis: Mutex<Vec<AnalysisRecord>>,
    stats: Mutex<Vec<UserStatsRecord>>,
    down: AtomicBool,
    quota_exhausted: AtomicBool,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the tier into (or out of) a failing state.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Make every insert fail with a quota rejection.
    pub fn set_quota_exhausted(&self, exhausted: bool) {
        self.quota_exhausted.store(exhausted, Ordering::SeqCst);
    }

    /// Seed a metadata row directly, bypassing the adapter contract.
    pub fn seed_metadata(&self, record: MetadataRecord) {
        self.metadata.lock().unwrap().push(record);
    }

    /// Number of metadata rows appended so far.
    pub fn metadata_rows(&self) -> usize {
        self.metadata.lock().unwrap().len()
    }

    fn check_up(&self) -> StrataResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StrataError::durable_store("durable store offline"))
        } else {
            Ok(())
        }
    }

    fn check_insert(&self) -> StrataResult<()> {
        self.check_up()?;
        if self.quota_exhausted.load(Ordering::SeqCst) {
            Err(StrataError::QuotaRejected(
                "streaming insert rejected".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn ensure_schema(&self) -> StrataResult<()> {
        self.check_up()
    }

    async fn insert_metadata(&self, record: &MetadataRecord) -> StrataResult<()> {
        self.check_insert()?;
        self.metadata.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn latest_metadata(
        &self,
        artifact_id: &str,
        principal: &str,
    ) -> StrataResult<Option<MetadataRecord>> {
        self.check_up()?;
        Ok(self
            .metadata
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.artifact_id == artifact_id && r.principal == principal)
            .max_by_key(|r| r.written_at)
            .cloned())
    }

    async fn insert_analysis(&self, record: &AnalysisRecord) -> StrataResult<()> {
        self.check_insert()?;
        self.analysis.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn latest_analysis(&self, analysis_key: &str) -> StrataResult<Option<AnalysisRecord>> {
        self.check_up()?;
        Ok(self
            .analysis
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.analysis_key == analysis_key)
            .max_by_key(|r| r.written_at)
            .cloned())
    }

    async fn insert_stats(&self, record: &UserStatsRecord) -> StrataResult<()> {
        self.check_insert()?;
        self.stats.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn latest_stats(&self, principal: &str) -> StrataResult<Option<UserStatsRecord>> {
        self.check_up()?;
        Ok(self
            .stats
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.principal == principal)
            .max_by_key(|r| r.written_at)
            .cloned())
    }

    async fn health_probe(&self) -> StrataResult<()> {
        self.check_up()
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
