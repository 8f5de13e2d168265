//! Wire-format classification
//!
//! Reads only enough of a stream to identify which of the four dialects it
//! carries: the root element's local name plus the schema-version marker in
//! its namespace declarations. Callers re-open the stream for full decoding.

use super::{local_name, Dialect};
use crate::error::{DecodeError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use tracing::debug;

/// Classify the dialect of an XML stream from its root element
///
/// Consumes the reader up to (and including) the root start tag; unknown
/// roots fail with [`DecodeError::UnknownDialect`].
pub fn sniff<R: BufRead>(reader: R) -> Result<Dialect> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match xml.read_event_into(&mut buf).map_err(DecodeError::Xml)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let root = local_name(e.name());
                let v21 = declares_v21_namespace(e)?;
                let dialect = match root.as_str() {
                    "GenericData" if v21 => Dialect::Generic21,
                    "GenericData" => Dialect::Generic20,
                    "CompactData" => Dialect::Compact20,
                    "StructureSpecificData" => Dialect::Compact21,
                    _ => return Err(DecodeError::UnknownDialect(root).into()),
                };
                debug!(%dialect, "classified wire format");
                return Ok(dialect);
            }
            Event::Eof => {
                return Err(DecodeError::UnexpectedEof("document root").into());
            }
            // Prolog: declaration, comments, doctype, processing instructions
            _ => continue,
        }
    }
}

/// True when any xmlns declaration on the element carries the 2.1 schema
/// version marker
fn declares_v21_namespace(e: &BytesStart<'_>) -> Result<bool> {
    for attr in e.attributes() {
        let attr = attr.map_err(DecodeError::Attr)?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            let value = attr.unescape_value().map_err(DecodeError::Xml)?;
            if value.contains("v2_1") {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
