//! Attribute-driven decoder for the compact wire dialects
//!
//! Compact documents carry each series as a single element whose attributes
//! hold the dimension values and the series-level attributes side by side;
//! observations are attribute-only child elements (time period and value).
//! Decoding is faster than the generic walk but schema-sensitive: the
//! attribute names must match the structure's concept ids.
//!
//! Covers SDMX-ML 2.0 compact data and 2.1 structure-specific data, which
//! share this layout; the dialects differ only in how frequency is resolved,
//! which the cursor layer handles.

use super::{attr_pairs, is_element, is_end_element, RawObs, RawSeries};
use crate::error::DecodeError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

/// Streaming decoder for compact/structure-specific documents
pub(crate) struct CompactDecoder<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Attribute name carrying the observation period
    time_concept: Vec<u8>,
    /// Attribute name carrying the observation value
    measure_concept: Vec<u8>,
    in_series: bool,
    series_done: bool,
}

impl<R: BufRead> CompactDecoder<R> {
    pub(crate) fn new(reader: R, time_concept: &str, measure_concept: &str) -> Self {
        let mut xml = Reader::from_reader(reader);
        xml.trim_text(true);
        Self {
            reader: xml,
            buf: Vec::new(),
            time_concept: time_concept.as_bytes().to_vec(),
            measure_concept: measure_concept.as_bytes().to_vec(),
            in_series: false,
            series_done: false,
        }
    }

    /// Advance to the next `Series` element and collect its attributes
    ///
    /// Dimension values and series attributes arrive mixed; the cursor layer
    /// routes them apart against the data structure.
    pub(crate) fn next_series(&mut self) -> Result<Option<RawSeries>, DecodeError> {
        if self.in_series && !self.series_done {
            self.drain_series()?;
        }
        self.in_series = false;
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) if is_element(e, b"Series") => {
                    let values = attr_pairs(e)?;
                    self.in_series = true;
                    self.series_done = false;
                    return Ok(Some(RawSeries {
                        values,
                        attributes: Vec::new(),
                        mixed_values: true,
                    }));
                }
                Event::Empty(ref e) if is_element(e, b"Series") => {
                    let values = attr_pairs(e)?;
                    self.in_series = true;
                    self.series_done = true;
                    return Ok(Some(RawSeries {
                        values,
                        attributes: Vec::new(),
                        mixed_values: true,
                    }));
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    /// Advance to the next `Obs` element within the current series
    pub(crate) fn next_obs(&mut self) -> Result<Option<RawObs>, DecodeError> {
        if !self.in_series || self.series_done {
            return Ok(None);
        }
        loop {
            self.buf.clear();
            let mut obs_with_body = None;
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Empty(ref e) if is_element(e, b"Obs") => {
                    return read_obs_attrs(e, &self.time_concept, &self.measure_concept).map(Some);
                }
                Event::Start(ref e) if is_element(e, b"Obs") => {
                    obs_with_body =
                        Some(read_obs_attrs(e, &self.time_concept, &self.measure_concept)?);
                }
                Event::End(ref e) if is_end_element(e, b"Series") => {
                    self.series_done = true;
                    return Ok(None);
                }
                Event::Eof => return Err(DecodeError::UnexpectedEof("Series")),
                _ => {}
            }
            if let Some(obs) = obs_with_body {
                self.drain_obs()?;
                return Ok(Some(obs));
            }
        }
    }

    /// Skip any children of a non-empty `Obs` element
    fn drain_obs(&mut self) -> Result<(), DecodeError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::End(ref e) if is_end_element(e, b"Obs") => return Ok(()),
                Event::Eof => return Err(DecodeError::UnexpectedEof("Obs")),
                _ => {}
            }
        }
    }

    /// Skip the remainder of the current series
    fn drain_series(&mut self) -> Result<(), DecodeError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::End(ref e) if is_end_element(e, b"Series") => {
                    self.series_done = true;
                    return Ok(());
                }
                Event::Eof => return Err(DecodeError::UnexpectedEof("Series")),
                _ => {}
            }
        }
    }
}

/// Period and value attributes of an `Obs` element
fn read_obs_attrs(
    e: &BytesStart<'_>,
    time_concept: &[u8],
    measure_concept: &[u8],
) -> Result<RawObs, DecodeError> {
    let mut obs = RawObs::default();
    for attr in e.attributes() {
        let attr = attr?;
        let name = attr.key.local_name();
        if name.as_ref() == time_concept {
            obs.period = Some(attr.unescape_value().map_err(DecodeError::Xml)?.into_owned());
        } else if name.as_ref() == measure_concept {
            obs.value = Some(attr.unescape_value().map_err(DecodeError::Xml)?.into_owned());
        }
    }
    Ok(obs)
}
