//! Element-driven decoder for the generic wire dialects
//!
//! Generic documents spell each series out as an explicit `SeriesKey` of
//! dimension-value pairs, an optional `Attributes` list, and `Obs` elements
//! with time/value children. The two versions differ in detail:
//!
//! - 2.0 references dimensions through a `concept` attribute and carries the
//!   observation time as text inside a `Time` child element.
//! - 2.1 references dimensions through an `id` attribute and carries the
//!   observation time in the `value` attribute of an `ObsDimension` child.
//!
//! Key reconstruction is order-independent: pairs land in the slot their
//! dimension id maps to, wherever they appear in the document.

use super::{attr_value, is_element, is_end_element, RawObs, RawSeries};
use crate::error::DecodeError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::BufRead;

/// Which part of the series header the walk is inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Key,
    Attributes,
}

/// Streaming decoder for generic 2.0/2.1 documents
pub(crate) struct GenericDecoder<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    v21: bool,
    in_series: bool,
    series_done: bool,
    /// First observation of the current series, when the header walk had to
    /// consume its opening tag to know the header was complete
    pending_obs: Option<RawObs>,
}

impl<R: BufRead> GenericDecoder<R> {
    pub(crate) fn new(reader: R, v21: bool) -> Self {
        let mut xml = Reader::from_reader(reader);
        xml.trim_text(true);
        Self {
            reader: xml,
            buf: Vec::new(),
            v21,
            in_series: false,
            series_done: false,
            pending_obs: None,
        }
    }

    /// Advance to the next `Series` element and read its header
    pub(crate) fn next_series(&mut self) -> Result<Option<RawSeries>, DecodeError> {
        if self.in_series {
            self.drain_series()?;
        }
        loop {
            self.buf.clear();
            let mut found_start = false;
            let mut found_empty = false;
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) if is_element(e, b"Series") => found_start = true,
                Event::Empty(ref e) if is_element(e, b"Series") => found_empty = true,
                Event::Eof => return Ok(None),
                _ => {}
            }
            if found_start {
                self.in_series = true;
                self.series_done = false;
                self.pending_obs = None;
                return self.read_series_header().map(Some);
            }
            if found_empty {
                self.in_series = true;
                self.series_done = true;
                self.pending_obs = None;
                return Ok(Some(RawSeries::default()));
            }
        }
    }

    /// Advance to the next observation within the current series
    pub(crate) fn next_obs(&mut self) -> Result<Option<RawObs>, DecodeError> {
        if !self.in_series || self.series_done {
            return Ok(None);
        }
        if let Some(obs) = self.pending_obs.take() {
            return Ok(Some(obs));
        }
        loop {
            self.buf.clear();
            let mut found_obs = false;
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) if is_element(e, b"Obs") => found_obs = true,
                Event::Empty(ref e) if is_element(e, b"Obs") => {
                    return Ok(Some(RawObs::default()))
                }
                Event::End(ref e) if is_end_element(e, b"Series") => {
                    self.series_done = true;
                    return Ok(None);
                }
                Event::Eof => return Err(DecodeError::UnexpectedEof("Series")),
                _ => {}
            }
            if found_obs {
                return self.read_obs_body().map(Some);
            }
        }
    }

    /// Read the `SeriesKey`/`Attributes` sections of the series the reader
    /// just entered, stopping at the first observation or the series end
    fn read_series_header(&mut self) -> Result<RawSeries, DecodeError> {
        let concept_attr: &[u8] = if self.v21 { b"id" } else { b"concept" };
        let mut raw = RawSeries::default();
        let mut section = Section::None;
        loop {
            self.buf.clear();
            let mut found_obs = false;
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) | Event::Empty(ref e) if is_element(e, b"Value") => {
                    let id = attr_value(e, concept_attr)?;
                    let value = attr_value(e, b"value")?;
                    if let (Some(id), Some(value)) = (id, value) {
                        match section {
                            Section::Key => raw.values.push((id, value)),
                            Section::Attributes => raw.attributes.push((id, value)),
                            Section::None => {}
                        }
                    }
                }
                Event::Start(ref e) if is_element(e, b"SeriesKey") => section = Section::Key,
                Event::End(ref e) if is_end_element(e, b"SeriesKey") => section = Section::None,
                Event::Start(ref e) if is_element(e, b"Attributes") => {
                    section = Section::Attributes
                }
                Event::End(ref e) if is_end_element(e, b"Attributes") => section = Section::None,
                Event::Start(ref e) if is_element(e, b"Obs") => found_obs = true,
                Event::Empty(ref e) if is_element(e, b"Obs") => {
                    self.pending_obs = Some(RawObs::default());
                    return Ok(raw);
                }
                Event::End(ref e) if is_end_element(e, b"Series") => {
                    self.series_done = true;
                    return Ok(raw);
                }
                Event::Eof => return Err(DecodeError::UnexpectedEof("Series")),
                _ => {}
            }
            if found_obs {
                self.pending_obs = Some(self.read_obs_body()?);
                return Ok(raw);
            }
        }
    }

    /// Read the body of an `Obs` element the reader just entered
    fn read_obs_body(&mut self) -> Result<RawObs, DecodeError> {
        let mut obs = RawObs::default();
        let mut in_time = false;
        let mut obs_depth = 0usize;
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) if is_element(e, b"Time") => in_time = true,
                Event::End(ref e) if is_end_element(e, b"Time") => in_time = false,
                Event::Text(ref t) if in_time => {
                    obs.period = Some(t.unescape().map_err(DecodeError::Xml)?.into_owned());
                }
                Event::Start(ref e) | Event::Empty(ref e)
                    if is_element(e, b"ObsDimension") =>
                {
                    obs.period = attr_value(e, b"value")?;
                }
                Event::Start(ref e) | Event::Empty(ref e) if is_element(e, b"ObsValue") => {
                    obs.value = attr_value(e, b"value")?;
                }
                // Nested obs-level Attributes blocks are skipped wholesale
                Event::Start(ref e) if is_element(e, b"Attributes") => obs_depth += 1,
                Event::End(ref e) if is_end_element(e, b"Attributes") && obs_depth > 0 => {
                    obs_depth -= 1
                }
                Event::End(ref e) if is_end_element(e, b"Obs") => return Ok(obs),
                Event::Eof => return Err(DecodeError::UnexpectedEof("Obs")),
                _ => {}
            }
        }
    }

    /// Skip the remainder of the current series
    fn drain_series(&mut self) -> Result<(), DecodeError> {
        self.pending_obs = None;
        if self.series_done {
            self.in_series = false;
            return Ok(());
        }
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::End(ref e) if is_end_element(e, b"Series") => {
                    self.in_series = false;
                    return Ok(());
                }
                Event::Eof => return Err(DecodeError::UnexpectedEof("Series")),
                _ => {}
            }
        }
    }
}
