//! Error types for the cube core
//!
//! One top-level [`Error`] covers the whole crate; decode-specific failures
//! live in [`DecodeError`] and convert upward via `#[from]`. The taxonomy
//! mirrors the failure classes of the system:
//!
//! - `Decode` — malformed or dialect-mismatched document, fatal to a cursor
//! - `NotFound` — requested flow/structure/series absent from the source
//! - `AmbiguousKey` — two decoded series resolved to the same key
//! - `InvalidArgument` / `InvalidKey` — caller input inconsistent with the
//!   target structure, rejected before any I/O
//! - `IllegalState` / `Closed` — cursor protocol violations

use thiserror::Error;

/// Main error type for cube operations
#[derive(Error, Debug)]
pub enum Error {
    /// Document decoding failed; the cursor is closed
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Requested flow, structure or series does not exist in the source
    #[error("Not found: {0}")]
    NotFound(String),

    /// Two decoded series resolved to the same key
    #[error("Cannot resolve data: duplicated key '{0}'")]
    AmbiguousKey(String),

    /// Caller-supplied key or depth inconsistent with the data structure
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key text does not match the target structure arity
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Cursor accessor called outside its valid phase
    #[error("Illegal cursor state: {0}")]
    IllegalState(&'static str),

    /// Cursor used after close()
    #[error("Cursor is closed")]
    Closed,

    /// IO error from the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Decoding errors
///
/// Fatal to the cursor that raised them; the underlying cause is preserved
/// for the caller, never swallowed.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// XML syntax or structure error from the underlying parser
    #[error("Malformed document: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error from the underlying parser
    #[error("Malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// Root element does not match any known wire dialect
    #[error("Unrecognized wire format: root element '{0}'")]
    UnknownDialect(String),

    /// Series references a dimension id absent from the data structure
    #[error("Dimension '{0}' not found in structure '{1}'")]
    UnknownDimension(String, String),

    /// Document ended inside an element that requires more content
    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(&'static str),

    /// Stream-level IO error while decoding
    #[error("IO error while decoding: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the per-series failure class that does not abort a whole
    /// cursor traversal
    pub fn is_ambiguous_key(&self) -> bool {
        matches!(self, Error::AmbiguousKey(_))
    }

    /// True for absent-result conditions
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
