//! sdmx-cube - Multi-dimensional statistical time-series retrieval
//!
//! This library reads SDMX-ML data streams and answers cube-style queries
//! over them:
//! - Streaming decoders for four wire dialects (generic and compact, 2.0
//!   and 2.1) behind one cursor protocol
//! - A key algebra for addressing slices of the dimension space
//! - Lazy cube queries: list series, materialize series with data, fetch one
//!   series, enumerate children of a partial key
//! - A bulk TTL cache that fetches whole sub-cubes and serves sibling
//!   requests from memory

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Streaming wire-format decoding and the series cursor protocol
pub mod decode;

/// Cube query engine and the series source boundary
pub mod cube;

/// Bulk TTL caching in front of the query engine
pub mod cache;

// Re-export main types
pub use cache::{BulkCache, CacheConfig};
pub use config::SourceConfig;
pub use cube::{CubeEngine, DataDetail, SeriesSource};
pub use decode::{Dialect, SeriesCursor};
pub use error::{Error, Result};
pub use key::{Key, KeyBuilder};
pub use types::{DataStructure, Dimension, FlowRef, Frequency, Obs, Series, SeriesInfo};
