//! Bulk TTL Cache
//!
//! Caches whole sub-cubes rather than single series: a request for one
//! series fetches every series under a configurable root (the requested key
//! with its trailing slots wildcarded) and keeps the batch alive for a TTL.
//! Later requests for sibling series are answered from the cached batch
//! without touching the source. Supports:
//! - Per-root single-flight: concurrent misses on the same root block on one
//!   upstream fetch instead of racing
//! - TTL expiration, lazy (checked on access)
//! - Per-source invalidation

use crate::config::SourceConfig;
use crate::cube::{CubeEngine, SeriesSource};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::types::{FlowRef, Series};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration for bulk result caching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a fetched batch stays valid (default: 300 seconds).
    /// A zero TTL disables the cache: every request goes upstream.
    pub ttl: Duration,

    /// How many trailing key slots are widened to form the batch root
    /// (default: 0, which caches single series)
    pub depth: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            depth: 0,
        }
    }
}

impl CacheConfig {
    /// Set the batch TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the bulk depth
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Derive cache settings from a source configuration
    pub fn from_source(config: &SourceConfig) -> Self {
        Self {
            ttl: config.cache_ttl(),
            depth: config.cache_depth(),
        }
    }

    fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Identity of one cached batch: which source, which flow, which root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    source_id: String,
    flow: String,
    root: String,
}

impl Fingerprint {
    fn new(source_id: &str, flow: &FlowRef, root: &Key) -> Self {
        Self {
            source_id: source_id.to_string(),
            flow: flow.to_string(),
            root: root.to_string(),
        }
    }
}

// ============================================================================
// Cached Payload
// ============================================================================

/// One cached fetch result
///
/// A depth-0 fetch holds the single requested series; a deeper fetch holds
/// every series under the root, indexed by key text. Duplicated keys in the
/// upstream document are remembered so that requests for them keep failing
/// consistently for the lifetime of the batch.
#[derive(Debug)]
pub enum CubePayload {
    /// Exactly the requested series
    Single(Series),

    /// Every series under the batch root
    SubCube {
        series: HashMap<String, Series>,
        ambiguous: HashSet<String>,
    },
}

impl CubePayload {
    /// Number of series held by this payload
    pub fn len(&self) -> usize {
        match self {
            CubePayload::Single(_) => 1,
            CubePayload::SubCube { series, .. } => series.len(),
        }
    }

    /// True when the payload holds no series
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn extract(&self, key: &Key, flow: &FlowRef) -> Result<Series> {
        match self {
            CubePayload::Single(series) if &series.key == key => Ok(series.clone()),
            CubePayload::Single(series) => Err(Error::NotFound(format!(
                "series '{}' in flow '{}' (batch holds '{}')",
                key, flow, series.key
            ))),
            CubePayload::SubCube { series, ambiguous } => {
                let text = key.to_string();
                if ambiguous.contains(&text) {
                    return Err(Error::AmbiguousKey(text));
                }
                series.get(&text).cloned().ok_or_else(|| {
                    Error::NotFound(format!("series '{}' in flow '{}'", key, flow))
                })
            }
        }
    }
}

struct CachedEntry {
    payload: Arc<CubePayload>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Per-root slot; the mutex serializes fetches for one root
#[derive(Default)]
struct Slot {
    entry: Option<CachedEntry>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Cache statistics
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time view of the cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    /// Requests answered from a live batch
    pub hits: u64,

    /// Requests that went upstream
    pub misses: u64,

    /// Batches dropped because their TTL had passed
    pub evictions: u64,

    /// Batches dropped by explicit invalidation
    pub invalidations: u64,
}

// ============================================================================
// Bulk Cache
// ============================================================================

/// TTL cache of sub-cube batches in front of a [`CubeEngine`]
///
/// Thread-safe; one instance is shared across request threads. Slots are
/// sharded so a slow fetch on one root never blocks hits on another.
///
/// # Example
/// ```ignore
/// let cache = BulkCache::new(CacheConfig::default().with_depth(1));
/// let series = cache.series_with_data(&engine, &source, &flow, &key)?;
/// ```
pub struct BulkCache {
    config: RwLock<Arc<CacheConfig>>,
    slots: DashMap<Fingerprint, Arc<Mutex<Slot>>>,
    stats: CacheStats,
}

impl BulkCache {
    /// Create a cache with the given settings
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            slots: DashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Fetch one series by full key, served from cache when a live batch
    /// covers it
    ///
    /// `key` must be series-level. Misses fetch the whole batch under the
    /// configured root before answering; fetch failures propagate and leave
    /// nothing cached.
    pub fn series_with_data(
        &self,
        engine: &CubeEngine,
        source: &dyn SeriesSource,
        flow: &FlowRef,
        key: &Key,
    ) -> Result<Series> {
        if !key.is_series() {
            return Err(Error::InvalidArgument(format!(
                "'{}' has wildcard slots; a series-level key is required",
                key
            )));
        }
        let config = self.config.read().clone();
        if !config.enabled() {
            return engine.series_with_data(source, flow, key);
        }

        let root = key.with_wildcards_after(key.size().saturating_sub(config.depth));
        let fingerprint = Fingerprint::new(source.id(), flow, &root);

        // Clone the slot handle out of the map before locking it, so the
        // shard lock is not held across the fetch
        let slot = self
            .slots
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .clone();
        let mut slot = slot.lock();

        if let Some(entry) = &slot.entry {
            if entry.is_expired() {
                slot.entry = None;
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                let payload = entry.payload.clone();
                return payload.extract(key, flow);
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(%flow, %root, "batch miss, fetching");
        let payload = Arc::new(fetch_batch(engine, source, flow, &root, key, config.depth)?);
        slot.entry = Some(CachedEntry {
            payload: payload.clone(),
            expires_at: Instant::now() + config.ttl,
        });
        payload.extract(key, flow)
    }

    /// Drop every batch fetched from one source
    pub fn invalidate_source(&self, source_id: &str) {
        let before = self.slots.len();
        self.slots.retain(|fp, _| fp.source_id != source_id);
        let removed = (before - self.slots.len()) as u64;
        if removed > 0 {
            self.stats
                .invalidations
                .fetch_add(removed, Ordering::Relaxed);
            debug!(source_id, removed, "invalidated source batches");
        }
    }

    /// Drop every cached batch
    pub fn invalidate_all(&self) {
        let removed = self.slots.len() as u64;
        self.slots.clear();
        self.stats
            .invalidations
            .fetch_add(removed, Ordering::Relaxed);
    }

    /// Replace the cache settings and drop everything cached under the old
    /// ones
    pub fn set_config(&self, config: CacheConfig) {
        *self.config.write() = Arc::new(config);
        self.invalidate_all();
    }

    /// Current cache settings
    pub fn config(&self) -> CacheConfig {
        (**self.config.read()).clone()
    }

    /// Number of live (unexpired) batches
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| {
                slot.value()
                    .lock()
                    .entry
                    .as_ref()
                    .is_some_and(|e| !e.is_expired())
            })
            .count()
    }

    /// True when no live batch is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit/miss counters
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl Default for BulkCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Materialize the batch under `root`
///
/// Depth 0 short-circuits to a single-series fetch. Deeper batches collect
/// every series under the root; duplicated keys are recorded rather than
/// aborting, so one malformed series does not poison its siblings.
fn fetch_batch(
    engine: &CubeEngine,
    source: &dyn SeriesSource,
    flow: &FlowRef,
    root: &Key,
    key: &Key,
    depth: usize,
) -> Result<CubePayload> {
    if depth == 0 {
        return engine
            .series_with_data(source, flow, key)
            .map(CubePayload::Single);
    }
    let mut series = HashMap::new();
    let mut ambiguous = HashSet::new();
    for item in engine.all_series_with_data(source, flow, root)? {
        match item {
            Ok(s) => {
                series.insert(s.key.to_string(), s);
            }
            Err(Error::AmbiguousKey(text)) => {
                ambiguous.insert(text);
            }
            Err(err) => return Err(err),
        }
    }
    debug!(%root, count = series.len(), "batch fetched");
    Ok(CubePayload::SubCube { series, ambiguous })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::{BoxedReader, DataDetail, MemorySource};
    use crate::decode::SeriesCursor;
    use crate::types::{DataStructure, Dimension};
    use std::sync::atomic::AtomicUsize;

    fn structure() -> Arc<DataStructure> {
        Arc::new(
            DataStructure::new(
                "TEST",
                "Test",
                vec![
                    Dimension::new("FREQ", "Frequency", 1),
                    Dimension::new("AREA", "Area", 2),
                ],
                "TIME_PERIOD",
                "OBS_VALUE",
            )
            .unwrap(),
        )
    }

    const DOC: &str = r#"<CompactData>
      <DataSet>
        <Series FREQ="A" AREA="DEU" TIME_FORMAT="P1Y">
          <Obs TIME_PERIOD="1991" OBS_VALUE="1.0"/>
        </Series>
        <Series FREQ="A" AREA="POL" TIME_FORMAT="P1Y">
          <Obs TIME_PERIOD="1991" OBS_VALUE="2.0"/>
        </Series>
      </DataSet>
    </CompactData>"#;

    /// Source wrapper that counts upstream opens
    struct CountingSource {
        inner: MemorySource,
        opens: AtomicUsize,
    }

    impl CountingSource {
        fn new(inner: MemorySource) -> Self {
            Self {
                inner,
                opens: AtomicUsize::new(0),
            }
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    impl SeriesSource for CountingSource {
        fn id(&self) -> &str {
            self.inner.id()
        }

        fn structure(&self, flow: &FlowRef) -> Result<Arc<DataStructure>> {
            self.inner.structure(flow)
        }

        fn open(
            &self,
            flow: &FlowRef,
            key: &Key,
            detail: DataDetail,
        ) -> Result<SeriesCursor<BoxedReader>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.inner.open(flow, key, detail)
        }
    }

    fn counting_source() -> CountingSource {
        CountingSource::new(MemorySource::new("mem", FlowRef::new("F"), DOC, structure()))
    }

    #[test]
    fn test_sibling_served_from_batch() {
        let cache = BulkCache::new(CacheConfig::default().with_depth(1));
        let engine = CubeEngine::new();
        let source = counting_source();
        let flow = FlowRef::new("F");

        let deu = Key::parse("A.DEU", '.', 2).unwrap();
        let pol = Key::parse("A.POL", '.', 2).unwrap();

        let series = cache
            .series_with_data(&engine, &source, &flow, &deu)
            .unwrap();
        assert_eq!(series.obs[0].value, Some(1.0));
        assert_eq!(source.opens(), 1);

        // Sibling under the same root: no second fetch
        let series = cache
            .series_with_data(&engine, &source, &flow, &pol)
            .unwrap();
        assert_eq!(series.obs[0].value, Some(2.0));
        assert_eq!(source.opens(), 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_absent_series_under_cached_batch() {
        let cache = BulkCache::new(CacheConfig::default().with_depth(1));
        let engine = CubeEngine::new();
        let source = counting_source();
        let flow = FlowRef::new("F");

        let missing = Key::parse("A.XXX", '.', 2).unwrap();
        let err = cache
            .series_with_data(&engine, &source, &flow, &missing)
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(source.opens(), 1);

        // The batch is valid data: the repeat lookup is a hit, not a refetch
        let err = cache
            .series_with_data(&engine, &source, &flow, &missing)
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(source.opens(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_zero_ttl_bypasses_cache() {
        let cache = BulkCache::new(CacheConfig::default().with_ttl(Duration::ZERO));
        let engine = CubeEngine::new();
        let source = counting_source();
        let flow = FlowRef::new("F");
        let key = Key::parse("A.DEU", '.', 2).unwrap();

        cache
            .series_with_data(&engine, &source, &flow, &key)
            .unwrap();
        cache
            .series_with_data(&engine, &source, &flow, &key)
            .unwrap();
        assert_eq!(source.opens(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_expiry_refetches() {
        let cache = BulkCache::new(
            CacheConfig::default()
                .with_ttl(Duration::from_millis(20))
                .with_depth(1),
        );
        let engine = CubeEngine::new();
        let source = counting_source();
        let flow = FlowRef::new("F");
        let key = Key::parse("A.DEU", '.', 2).unwrap();

        cache
            .series_with_data(&engine, &source, &flow, &key)
            .unwrap();
        std::thread::sleep(Duration::from_millis(40));
        cache
            .series_with_data(&engine, &source, &flow, &key)
            .unwrap();

        assert_eq!(source.opens(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_invalidate_source() {
        let cache = BulkCache::new(CacheConfig::default().with_depth(1));
        let engine = CubeEngine::new();
        let source = counting_source();
        let flow = FlowRef::new("F");
        let key = Key::parse("A.DEU", '.', 2).unwrap();

        cache
            .series_with_data(&engine, &source, &flow, &key)
            .unwrap();
        cache.invalidate_source("other");
        assert_eq!(cache.len(), 1);

        cache.invalidate_source("mem");
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 1);

        cache
            .series_with_data(&engine, &source, &flow, &key)
            .unwrap();
        assert_eq!(source.opens(), 2);
    }

    #[test]
    fn test_set_config_drops_batches() {
        let cache = BulkCache::new(CacheConfig::default().with_depth(1));
        let engine = CubeEngine::new();
        let source = counting_source();
        let flow = FlowRef::new("F");
        let key = Key::parse("A.DEU", '.', 2).unwrap();

        cache
            .series_with_data(&engine, &source, &flow, &key)
            .unwrap();
        cache.set_config(CacheConfig::default().with_depth(0));
        assert!(cache.is_empty());
        assert_eq!(cache.config().depth, 0);
    }

    #[test]
    fn test_fetch_error_not_cached() {
        struct FailingSource {
            calls: AtomicUsize,
        }
        impl SeriesSource for FailingSource {
            fn id(&self) -> &str {
                "failing"
            }
            fn structure(&self, _flow: &FlowRef) -> Result<Arc<DataStructure>> {
                Ok(structure())
            }
            fn open(
                &self,
                _flow: &FlowRef,
                _key: &Key,
                _detail: DataDetail,
            ) -> Result<SeriesCursor<BoxedReader>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "unreachable",
                )))
            }
        }

        let cache = BulkCache::new(CacheConfig::default().with_depth(1));
        let engine = CubeEngine::new();
        let source = FailingSource {
            calls: AtomicUsize::new(0),
        };
        let flow = FlowRef::new("F");
        let key = Key::parse("A.DEU", '.', 2).unwrap();

        assert!(cache
            .series_with_data(&engine, &source, &flow, &key)
            .is_err());
        assert!(cache
            .series_with_data(&engine, &source, &flow, &key)
            .is_err());
        // Both attempts went upstream: failures leave nothing cached
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_key_required() {
        let cache = BulkCache::default();
        let engine = CubeEngine::new();
        let source = counting_source();
        let err = cache
            .series_with_data(&engine, &source, &FlowRef::new("F"), &Key::all(2))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(source.opens(), 0);
    }
}
