//! Cube query engine
//!
//! Answers hierarchical queries over a flow — list series, materialize
//! series with data, fetch one series by full key, enumerate the children of
//! a partial key — as filtered, lazy traversals of a fresh series cursor.
//! No caching happens at this layer; the bulk/TTL cache
//! ([`crate::cache`]) fronts it.

pub mod engine;
pub mod source;

pub use engine::{CubeEngine, SeriesDataIter, SeriesIter};
pub use source::{BoxedReader, DataDetail, MemorySource, SeriesSource, XmlFileSource};
