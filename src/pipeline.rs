//! Verdict resolution pipeline
//!
//! Cache-aside resolution of the two hashes carried by every sensor event:
//!
//! ```text
//! cache hit ──────────────────────────▶ verdict
//! cache miss ─▶ store hit ─▶ populate cache ─▶ verdict
//! cache miss ─▶ store miss ──────────────────▶ Unknown (no write)
//! ```
//!
//! plus the scan path: raw content goes to the classification oracle and the
//! returned verdict is persisted to the store for future lookups.

use std::sync::Arc;

use crate::cache::VerdictCache;
use crate::error::{CacheError, ResolutionError, ScanError};
use crate::fanout::{EventBroker, EVENTS_TOPIC};
use crate::models::{Event, EventVerdicts, HashVerdict, VerdictRecord};
use crate::oracle::ClassificationOracle;
use crate::store::VerdictStore;

/// Orchestrates cache, store, oracle and fanout. Constructed once at
/// startup; collaborators are injected and shared behind `Arc`.
pub struct VerdictPipeline {
    cache: Arc<dyn VerdictCache>,
    store: Arc<dyn VerdictStore>,
    oracle: Arc<dyn ClassificationOracle>,
    broker: Arc<dyn EventBroker>,
}

impl VerdictPipeline {
    pub fn new(
        cache: Arc<dyn VerdictCache>,
        store: Arc<dyn VerdictStore>,
        oracle: Arc<dyn ClassificationOracle>,
        broker: Arc<dyn EventBroker>,
    ) -> Self {
        Self {
            cache,
            store,
            oracle,
            broker,
        }
    }

    /// Resolve verdicts for both hashes referenced by an event.
    ///
    /// The raw event is mirrored to the fanout channel first; a publish
    /// failure degrades downstream analytics, not the returned verdicts, so
    /// it is logged and dropped here. Storage failures propagate; they are
    /// never reported as unknown hashes.
    pub async fn resolve_event(&self, event: &Event) -> Result<EventVerdicts, ResolutionError> {
        self.mirror_event(event).await;

        let (file, process) = tokio::try_join!(
            self.resolve_hash(&event.file.hash),
            self.resolve_hash(&event.process.hash),
        )?;

        Ok(EventVerdicts { file, process })
    }

    /// Classify raw content via the oracle and persist the verdict.
    ///
    /// The cache is deliberately left untouched: the store stays the single
    /// durable source of truth, and the next resolution of this hash
    /// re-reads it through the normal cache-aside path. No retries; retry
    /// policy belongs to the caller.
    pub async fn submit_scan(&self, content: &[u8]) -> Result<VerdictRecord, ScanError> {
        let record = self.oracle.classify(content).await?;
        self.store.insert(&record).await?;

        tracing::info!("Verdict stored: {} -> {}", record.hash, record.risk_level);
        Ok(record)
    }

    async fn mirror_event(&self, event: &Event) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Event fanout serialization failed: {}", e);
                return;
            }
        };

        if let Err(e) = self.broker.publish(EVENTS_TOPIC, &payload).await {
            tracing::warn!("Event fanout publish failed: {}", e);
        }
    }

    /// Cache-aside lookup for one hash.
    ///
    /// A store miss is the only path that returns `Unknown`, and it writes
    /// nothing. Concurrent resolutions of the same hash may both populate
    /// the cache; both write the value read from the same authoritative
    /// store record, so the last writer wins with an identical value.
    async fn resolve_hash(&self, hash: &str) -> Result<HashVerdict, ResolutionError> {
        if let Some(bytes) = self.cache.get(hash).await? {
            // A corrupt entry is a cache failure, not a miss.
            let record: VerdictRecord = serde_json::from_slice(&bytes)
                .map_err(|e| CacheError(format!("corrupt entry for {}: {}", hash, e)))?;
            return Ok(HashVerdict::Known(record));
        }

        match self.store.find(hash).await? {
            Some(record) => {
                let bytes = serde_json::to_vec(&record)
                    .map_err(|e| CacheError(e.to_string()))?;
                self.cache.set(hash, bytes).await?;
                Ok(HashVerdict::Known(record))
            }
            None => Ok(HashVerdict::Unknown {
                hash: hash.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sha2::{Digest, Sha256};

    use crate::error::{FanoutError, OracleError, StoreError};
    use crate::models::{Device, FileObservation, FileTimes, ProcessObservation, RISK_UNKNOWN};

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<String, Vec<u8>>>,
        fail: AtomicBool,
        sets: AtomicUsize,
    }

    impl FakeCache {
        fn contains(&self, hash: &str) -> bool {
            self.entries.lock().unwrap().contains_key(hash)
        }

        fn evict_all(&self) {
            self.entries.lock().unwrap().clear();
        }

        fn poison(&self, hash: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(hash.to_string(), b"not json".to_vec());
        }
    }

    #[async_trait]
    impl VerdictCache for FakeCache {
        async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, CacheError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CacheError("connection refused".to_string()));
            }
            Ok(self.entries.lock().unwrap().get(hash).cloned())
        }

        async fn set(&self, hash: &str, value: Vec<u8>) -> Result<(), CacheError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CacheError("connection refused".to_string()));
            }
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().unwrap().insert(hash.to_string(), value);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        records: Mutex<HashMap<String, i32>>,
        fail: AtomicBool,
        finds: AtomicUsize,
        inserts: AtomicUsize,
    }

    impl FakeStore {
        fn put(&self, hash: &str, level: i32) {
            self.records.lock().unwrap().insert(hash.to_string(), level);
        }

        fn level_of(&self, hash: &str) -> Option<i32> {
            self.records.lock().unwrap().get(hash).copied()
        }
    }

    #[async_trait]
    impl VerdictStore for FakeStore {
        async fn find(&self, hash: &str) -> Result<Option<VerdictRecord>, StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError("connection refused".to_string()));
            }
            self.finds.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(hash)
                .map(|level| VerdictRecord {
                    hash: hash.to_string(),
                    risk_level: *level,
                }))
        }

        async fn insert(&self, record: &VerdictRecord) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError("connection refused".to_string()));
            }
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.put(&record.hash, record.risk_level);
            Ok(())
        }
    }

    /// Hashes content with SHA-256 and classifies it at a fixed level.
    struct FakeOracle {
        level: i32,
        fail: AtomicBool,
    }

    impl FakeOracle {
        fn new(level: i32) -> Self {
            Self {
                level,
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ClassificationOracle for FakeOracle {
        async fn classify(&self, content: &[u8]) -> Result<VerdictRecord, OracleError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(OracleError::Transport("connection reset".to_string()));
            }
            Ok(VerdictRecord {
                hash: format!("{:x}", Sha256::digest(content)),
                risk_level: self.level,
            })
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        fail: AtomicBool,
    }

    impl RecordingBroker {
        fn publish_count(&self) -> usize {
            self.published.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EventBroker for RecordingBroker {
        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), FanoutError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(FanoutError("broker down".to_string()));
            }
            Ok(())
        }
    }

    struct Harness {
        pipeline: VerdictPipeline,
        cache: Arc<FakeCache>,
        store: Arc<FakeStore>,
        oracle: Arc<FakeOracle>,
        broker: Arc<RecordingBroker>,
    }

    fn harness(oracle_level: i32) -> Harness {
        let cache = Arc::new(FakeCache::default());
        let store = Arc::new(FakeStore::default());
        let oracle = Arc::new(FakeOracle::new(oracle_level));
        let broker = Arc::new(RecordingBroker::default());

        let pipeline = VerdictPipeline::new(
            cache.clone(),
            store.clone(),
            oracle.clone(),
            broker.clone(),
        );

        Harness {
            pipeline,
            cache,
            store,
            oracle,
            broker,
        }
    }

    fn event(file_hash: &str, process_hash: &str) -> Event {
        Event {
            device: Device {
                id: "3f6c0a1e-device".to_string(),
                os: "linux".to_string(),
            },
            file: FileObservation {
                hash: file_hash.to_string(),
                path: "/opt/payload.elf".to_string(),
                time: FileTimes {
                    accessed: 1_700_000_100_000,
                    modified: 1_700_000_000_000,
                },
            },
            process: ProcessObservation {
                hash: process_hash.to_string(),
                path: "/usr/bin/daemon".to_string(),
                pid: 4312,
            },
        }
    }

    fn sha256_hex(content: &[u8]) -> String {
        format!("{:x}", Sha256::digest(content))
    }

    #[tokio::test]
    async fn test_unknown_hashes_return_sentinel_without_writes() {
        let h = harness(3);
        let event = event(&"a".repeat(64), &"b".repeat(64));

        let verdicts = h.pipeline.resolve_event(&event).await.unwrap();

        assert!(verdicts.file.is_unknown());
        assert!(verdicts.process.is_unknown());
        assert!(!h.cache.contains(&event.file.hash));
        assert!(!h.cache.contains(&event.process.hash));
        assert_eq!(h.store.inserts.load(Ordering::SeqCst), 0);

        let wire: crate::models::EventsResponse = verdicts.into();
        assert_eq!(wire.file.risk_level, RISK_UNKNOWN);
        assert_eq!(wire.process.risk_level, RISK_UNKNOWN);
        assert_eq!(wire.file.hash, event.file.hash);
    }

    #[tokio::test]
    async fn test_store_hit_populates_cache_and_skips_store_next_time() {
        let h = harness(3);
        let hash = "c".repeat(64);
        h.store.put(&hash, 2);
        let event = event(&hash, &"b".repeat(64));

        let first = h.pipeline.resolve_event(&event).await.unwrap();
        assert_eq!(first.file.clone().into_record().risk_level, 2);
        assert!(h.cache.contains(&hash));

        let finds_after_first = h.store.finds.load(Ordering::SeqCst);
        let second = h.pipeline.resolve_event(&event).await.unwrap();
        assert_eq!(second.file.into_record().risk_level, 2);

        // Only the still-unknown process hash goes back to the store.
        assert_eq!(h.store.finds.load(Ordering::SeqCst), finds_after_first + 1);
    }

    #[tokio::test]
    async fn test_read_stability_across_cache_eviction() {
        let h = harness(3);
        let hash = "d".repeat(64);
        h.store.put(&hash, 7);
        let event = event(&hash, &hash);

        let first = h.pipeline.resolve_event(&event).await.unwrap();
        assert_eq!(first.file.into_record().risk_level, 7);

        h.cache.evict_all();

        let second = h.pipeline.resolve_event(&event).await.unwrap();
        assert_eq!(second.file.into_record().risk_level, 7);
        assert_eq!(second.process.into_record().risk_level, 7);
    }

    #[tokio::test]
    async fn test_scan_writes_store_but_never_cache() {
        let h = harness(4);
        let content = b"#!/bin/sh\nrm -rf --no-preserve-root /\n";
        let expected_hash = sha256_hex(content);

        let record = h.pipeline.submit_scan(content).await.unwrap();

        assert_eq!(record.hash, expected_hash);
        assert_eq!(record.risk_level, 4);
        assert_eq!(h.store.level_of(&expected_hash), Some(4));
        assert!(!h.cache.contains(&expected_hash));
        assert_eq!(h.cache.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scan_then_resolve_observes_persisted_verdict() {
        let h = harness(3);
        let content = b"MZ\x90\x00suspicious";
        let file_hash = sha256_hex(content);
        let process_hash = "b".repeat(64);
        let event = event(&file_hash, &process_hash);

        // First resolution: both unknown.
        let before = h.pipeline.resolve_event(&event).await.unwrap();
        assert!(before.file.is_unknown());
        assert!(before.process.is_unknown());

        let record = h.pipeline.submit_scan(content).await.unwrap();
        assert_eq!(record.hash, file_hash);
        assert_eq!(record.risk_level, 3);

        let after = h.pipeline.resolve_event(&event).await.unwrap();
        assert_eq!(after.file.into_record().risk_level, 3);
        assert_eq!(after.process.into_record().risk_level, RISK_UNKNOWN);
    }

    #[tokio::test]
    async fn test_rescan_overwrites_previous_verdict() {
        let h = harness(1);
        let content = b"grayware sample";
        let hash = sha256_hex(content);
        h.store.put(&hash, 9);

        let record = h.pipeline.submit_scan(content).await.unwrap();

        assert_eq!(record.risk_level, 1);
        assert_eq!(h.store.level_of(&hash), Some(1));
    }

    #[tokio::test]
    async fn test_cache_outage_is_an_error_not_unknown() {
        let h = harness(3);
        h.store.put(&"e".repeat(64), 5);
        h.cache.fail.store(true, Ordering::SeqCst);

        let err = h
            .pipeline
            .resolve_event(&event(&"e".repeat(64), &"b".repeat(64)))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::CacheUnavailable(_)));
    }

    #[tokio::test]
    async fn test_store_outage_is_an_error_not_unknown() {
        let h = harness(3);
        h.store.fail.store(true, Ordering::SeqCst);

        let err = h
            .pipeline
            .resolve_event(&event(&"e".repeat(64), &"b".repeat(64)))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_a_cache_failure() {
        let h = harness(3);
        let hash = "f".repeat(64);
        h.cache.poison(&hash);

        let err = h
            .pipeline
            .resolve_event(&event(&hash, &hash))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::CacheUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fanout_failure_never_aborts_resolution() {
        let h = harness(3);
        h.broker.fail.store(true, Ordering::SeqCst);
        h.store.put(&"a".repeat(64), 6);

        let verdicts = h
            .pipeline
            .resolve_event(&event(&"a".repeat(64), &"b".repeat(64)))
            .await
            .unwrap();

        assert_eq!(verdicts.file.into_record().risk_level, 6);
        // The publish was attempted, its failure discarded.
        assert_eq!(h.broker.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_every_event_is_mirrored_verbatim() {
        let h = harness(3);
        let event = event(&"a".repeat(64), &"b".repeat(64));

        h.pipeline.resolve_event(&event).await.unwrap();

        let published = h.broker.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (topic, payload) = &published[0];
        assert_eq!(topic, EVENTS_TOPIC);

        let mirrored: Event = serde_json::from_slice(payload).unwrap();
        assert_eq!(mirrored.file.hash, event.file.hash);
        assert_eq!(mirrored.process.pid, event.process.pid);
    }

    #[tokio::test]
    async fn test_oracle_failure_leaves_store_untouched() {
        let h = harness(3);
        h.oracle.fail.store(true, Ordering::SeqCst);

        let err = h.pipeline.submit_scan(b"content").await.unwrap_err();

        assert!(matches!(err, ScanError::Oracle(_)));
        assert_eq!(h.store.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_during_scan_surfaces() {
        let h = harness(3);
        h.store.fail.store(true, Ordering::SeqCst);

        let err = h.pipeline.submit_scan(b"content").await.unwrap_err();

        assert!(matches!(err, ScanError::Store(_)));
    }
}
