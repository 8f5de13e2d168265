//! Series source collaborator boundary
//!
//! The core does not care whether series come from a local file, an HTTP
//! endpoint or an in-memory fixture: a [`SeriesSource`] supplies the data
//! structure for a flow and opens a fresh cursor for a key-and-detail query.
//! Two implementations live here — [`XmlFileSource`] for local files and
//! [`MemorySource`] for fixtures — transport clients plug in behind the same
//! trait.

use crate::decode::{probe, SeriesCursor};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::types::{DataStructure, FlowRef};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// How much of each series a query needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDetail {
    /// Keys, attributes and observations
    Full,
    /// Keys and attributes only; sources that can filter server-side may
    /// omit observations
    NoData,
}

/// Boxed stream handed to cursors, so sources with different transports
/// share one cursor type
pub type BoxedReader = Box<dyn BufRead + Send>;

/// Supplier of structure metadata and series cursors for a flow
///
/// Implementations must hand out a *fresh* cursor per [`open`](Self::open)
/// call: cursors are single-pass and not thread-safe, so they are never
/// shared or reused.
pub trait SeriesSource: Send + Sync {
    /// Stable identity of this logical source, used as a cache fingerprint
    /// component
    fn id(&self) -> &str;

    /// The dimensional schema of a flow
    ///
    /// Unknown flows fail with [`Error::NotFound`].
    fn structure(&self, flow: &FlowRef) -> Result<Arc<DataStructure>>;

    /// Open a fresh cursor over a flow
    ///
    /// `key` and `detail` are hints: sources that cannot filter server-side
    /// may return the full stream, and callers filter on their side.
    fn open(&self, flow: &FlowRef, key: &Key, detail: DataDetail)
        -> Result<SeriesCursor<BoxedReader>>;
}

/// File-backed source
///
/// Probes the wire dialect on every open, then re-opens the file for the
/// full decode. Serves exactly one flow.
pub struct XmlFileSource {
    id: String,
    flow: FlowRef,
    path: PathBuf,
    structure: Arc<DataStructure>,
}

impl XmlFileSource {
    /// Create a source for one flow backed by one data file
    pub fn new(
        id: impl Into<String>,
        flow: FlowRef,
        path: impl Into<PathBuf>,
        structure: Arc<DataStructure>,
    ) -> Self {
        Self {
            id: id.into(),
            flow,
            path: path.into(),
            structure,
        }
    }

    fn check_flow(&self, flow: &FlowRef) -> Result<()> {
        if flow != &self.flow {
            return Err(Error::NotFound(format!(
                "flow '{}' (source '{}' serves '{}')",
                flow, self.id, self.flow
            )));
        }
        Ok(())
    }
}

impl SeriesSource for XmlFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn structure(&self, flow: &FlowRef) -> Result<Arc<DataStructure>> {
        self.check_flow(flow)?;
        Ok(self.structure.clone())
    }

    fn open(
        &self,
        flow: &FlowRef,
        _key: &Key,
        _detail: DataDetail,
    ) -> Result<SeriesCursor<BoxedReader>> {
        self.check_flow(flow)?;
        // Probe pass: classify the dialect, then rewind by re-opening
        let probe_reader = BufReader::new(File::open(&self.path)?);
        let dialect = probe::sniff(probe_reader)?;
        debug!(source = %self.id, path = %self.path.display(), %dialect, "opening file cursor");
        let reader: BoxedReader = Box::new(BufReader::new(File::open(&self.path)?));
        Ok(SeriesCursor::new(reader, dialect, self.structure.clone()))
    }
}

/// In-memory source for fixtures and tests
///
/// Holds a complete document as bytes; every open probes and decodes a fresh
/// view of it.
pub struct MemorySource {
    id: String,
    flow: FlowRef,
    document: Vec<u8>,
    structure: Arc<DataStructure>,
}

impl MemorySource {
    /// Create a source serving one flow from an in-memory document
    pub fn new(
        id: impl Into<String>,
        flow: FlowRef,
        document: impl Into<Vec<u8>>,
        structure: Arc<DataStructure>,
    ) -> Self {
        Self {
            id: id.into(),
            flow,
            document: document.into(),
            structure,
        }
    }
}

impl SeriesSource for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn structure(&self, flow: &FlowRef) -> Result<Arc<DataStructure>> {
        if flow != &self.flow {
            return Err(Error::NotFound(format!("flow '{}'", flow)));
        }
        Ok(self.structure.clone())
    }

    fn open(
        &self,
        flow: &FlowRef,
        _key: &Key,
        _detail: DataDetail,
    ) -> Result<SeriesCursor<BoxedReader>> {
        if flow != &self.flow {
            return Err(Error::NotFound(format!("flow '{}'", flow)));
        }
        let dialect = probe::sniff(Cursor::new(&self.document))?;
        let reader: BoxedReader = Box::new(Cursor::new(self.document.clone()));
        Ok(SeriesCursor::new(reader, dialect, self.structure.clone()))
    }
}
