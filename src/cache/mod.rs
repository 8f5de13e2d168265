//! Bulk result caching
//!
//! Fronts the cube engine with a TTL cache keyed on (source, flow, root
//! key): one fetch materializes a whole sub-cube and subsequent series
//! requests under the same root are answered from memory. Concurrent misses
//! on the same root are collapsed into a single upstream fetch.

pub mod bulk;

pub use bulk::{BulkCache, CacheConfig, CacheStatsSnapshot, CubePayload};
