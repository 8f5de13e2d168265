//! Streaming decoders for the SDMX-ML wire dialects
//!
//! Four incompatible XML layouts carry the same logical data model:
//!
//! - **Generic 2.0 / 2.1**: each series is an explicit list of
//!   dimension-value pairs plus observation elements with time/value
//!   children. Decoding is element-driven and order-independent.
//! - **Compact 2.0 / structure-specific 2.1**: each series is a single
//!   element whose attributes carry the dimension values, with observations
//!   as attribute-only child elements. Decoding is attribute-driven.
//!
//! The public surface is [`SeriesCursor`], a forward-only, single-pass pull
//! reader with three phases: before the first series, positioned on a series
//! (optionally on an observation within it), and closed. Dialect dispatch is
//! a tagged enum selected once after [`probe::sniff`] classifies the stream;
//! there is no open-ended dynamic dispatch.
//!
//! Cursors are strictly sequential and not thread-safe. A decode failure
//! closes the cursor and releases the underlying stream.

pub mod compact;
pub mod generic;
pub mod probe;

use crate::error::{DecodeError, Error, Result};
use crate::key::{Key, KeyBuilder};
use crate::types::{DataStructure, Frequency, Obs};
use compact::CompactDecoder;
use generic::GenericDecoder;
use quick_xml::events::{BytesEnd, BytesStart};
use quick_xml::name::QName;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, trace};

/// The four supported wire dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SDMX-ML 2.0 generic data
    Generic20,
    /// SDMX-ML 2.1 generic data
    Generic21,
    /// SDMX-ML 2.0 compact data
    Compact20,
    /// SDMX-ML 2.1 structure-specific data
    Compact21,
}

impl Dialect {
    /// True for the 2.1 dialects, which carry frequency in the key instead
    /// of a `TIME_FORMAT` attribute
    pub fn is_v21(self) -> bool {
        matches!(self, Dialect::Generic21 | Dialect::Compact21)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dialect::Generic20 => "Generic20",
            Dialect::Generic21 => "Generic21",
            Dialect::Compact20 => "Compact20",
            Dialect::Compact21 => "Compact21",
        };
        write!(f, "{}", name)
    }
}

/// Series header as it appears on the wire, before key resolution
#[derive(Debug, Default)]
pub(crate) struct RawSeries {
    /// Dimension-id/value pairs; for compact dialects these also carry the
    /// series attributes, routed apart against the structure
    pub values: Vec<(String, String)>,

    /// Series-level attributes the dialect keeps separate from the key
    /// (generic dialects only)
    pub attributes: Vec<(String, String)>,

    /// True when `values` may legitimately mix dimensions and attributes
    /// (compact dialects); unknown ids then route to attributes instead of
    /// failing
    pub mixed_values: bool,
}

/// Observation as it appears on the wire
#[derive(Debug, Default)]
pub(crate) struct RawObs {
    /// Raw period text, unparsed
    pub period: Option<String>,

    /// Raw value text, unparsed
    pub value: Option<String>,
}

/// Per-dialect decoder, selected once at cursor construction
pub(crate) enum DialectDecoder<R: BufRead> {
    Generic(GenericDecoder<R>),
    Compact(CompactDecoder<R>),
}

impl<R: BufRead> DialectDecoder<R> {
    fn next_series(&mut self) -> std::result::Result<Option<RawSeries>, DecodeError> {
        match self {
            DialectDecoder::Generic(d) => d.next_series(),
            DialectDecoder::Compact(d) => d.next_series(),
        }
    }

    fn next_obs(&mut self) -> std::result::Result<Option<RawObs>, DecodeError> {
        match self {
            DialectDecoder::Generic(d) => d.next_obs(),
            DialectDecoder::Compact(d) => d.next_obs(),
        }
    }
}

/// Frequency resolution strategy, fixed per dialect
///
/// The 2.0 dialects declare a `TIME_FORMAT`-style series attribute; the 2.1
/// dialects carry a letter code in the key slot of the dimension
/// conventionally named `FREQ` or `FREQUENCY`.
#[derive(Debug, Clone, Copy)]
enum FreqResolver {
    TimeFormatAttribute,
    FreqDimension(Option<usize>),
}

impl FreqResolver {
    fn for_dialect(dialect: Dialect, structure: &DataStructure) -> Self {
        if dialect.is_v21() {
            let slot = structure
                .dimension_index("FREQ")
                .or_else(|| structure.dimension_index("FREQUENCY"));
            FreqResolver::FreqDimension(slot)
        } else {
            FreqResolver::TimeFormatAttribute
        }
    }

    fn resolve(self, key: &Key, attributes: &BTreeMap<String, String>) -> Frequency {
        match self {
            FreqResolver::TimeFormatAttribute => attributes
                .get("TIME_FORMAT")
                .map(|tf| Frequency::parse_time_format(tf))
                .unwrap_or(Frequency::Undefined),
            FreqResolver::FreqDimension(slot) => slot
                .and_then(|i| key.get(i))
                .map(Frequency::parse_code)
                .unwrap_or(Frequency::Undefined),
        }
    }
}

/// Cursor phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    OnSeries,
    End,
    Closed,
}

/// Resolved state of the series the cursor is positioned on
struct CurrentSeries {
    key: Key,
    freq: Frequency,
    attributes: BTreeMap<String, String>,
}

/// Forward-only streaming reader over decoded series and observations
///
/// Protocol: call [`next_series`](Self::next_series) to advance;
/// series accessors are valid only while positioned on a series, observation
/// accessors only while positioned on an observation within it. Calling an
/// accessor outside its phase fails with [`Error::IllegalState`]; any call
/// but `close` after [`close`](Self::close) fails with [`Error::Closed`].
pub struct SeriesCursor<R: BufRead> {
    decoder: Option<DialectDecoder<R>>,
    structure: Arc<DataStructure>,
    resolver: FreqResolver,
    builder: KeyBuilder,
    state: CursorState,
    current: Option<CurrentSeries>,
    current_obs: Option<Obs>,
}

impl<R: BufRead> SeriesCursor<R> {
    /// Open a cursor over `reader`, decoding with the given dialect
    ///
    /// Callers classify the stream first (see [`probe::sniff`]) and re-open
    /// it for decoding; this constructor performs no read.
    pub fn new(reader: R, dialect: Dialect, structure: Arc<DataStructure>) -> Self {
        let decoder = match dialect {
            Dialect::Generic20 | Dialect::Generic21 => {
                DialectDecoder::Generic(GenericDecoder::new(reader, dialect.is_v21()))
            }
            Dialect::Compact20 | Dialect::Compact21 => DialectDecoder::Compact(
                CompactDecoder::new(reader, &structure.time_dimension_id, &structure.primary_measure_id),
            ),
        };
        let resolver = FreqResolver::for_dialect(dialect, &structure);
        let builder = KeyBuilder::new(structure.dimensions());
        debug!(%dialect, structure = %structure.ref_id, "opening series cursor");
        Self {
            decoder: Some(decoder),
            structure,
            resolver,
            builder,
            state: CursorState::BeforeFirst,
            current: None,
            current_obs: None,
        }
    }

    /// Advance to the next series
    ///
    /// Returns `false` at end of stream; resets any observation position.
    /// A decode failure closes the cursor and is surfaced with its cause.
    pub fn next_series(&mut self) -> Result<bool> {
        let decoder = match self.state {
            CursorState::Closed => return Err(Error::Closed),
            CursorState::End => return Ok(false),
            _ => self.decoder.as_mut().ok_or(Error::Closed)?,
        };
        self.current_obs = None;
        match decoder.next_series() {
            Ok(Some(raw)) => {
                match self.resolve_series(raw) {
                    Ok(current) => {
                        trace!(key = %current.key, "positioned on series");
                        self.current = Some(current);
                        self.state = CursorState::OnSeries;
                        Ok(true)
                    }
                    Err(err) => {
                        self.close();
                        Err(err)
                    }
                }
            }
            Ok(None) => {
                self.current = None;
                self.state = CursorState::End;
                Ok(false)
            }
            Err(err) => {
                self.close();
                Err(err.into())
            }
        }
    }

    /// Key of the current series
    pub fn series_key(&self) -> Result<&Key> {
        Ok(&self.on_series()?.key)
    }

    /// Resolved frequency of the current series
    pub fn series_frequency(&self) -> Result<Frequency> {
        Ok(self.on_series()?.freq)
    }

    /// All attributes of the current series
    pub fn series_attributes(&self) -> Result<&BTreeMap<String, String>> {
        Ok(&self.on_series()?.attributes)
    }

    /// One attribute of the current series, by name
    pub fn series_attribute(&self, name: &str) -> Result<Option<&str>> {
        Ok(self.on_series()?.attributes.get(name).map(String::as_str))
    }

    /// Advance to the next observation within the current series
    ///
    /// Returns `false` when the series has no further observations.
    pub fn next_obs(&mut self) -> Result<bool> {
        let freq = self.on_series()?.freq;
        let decoder = self.decoder.as_mut().ok_or(Error::Closed)?;
        match decoder.next_obs() {
            Ok(Some(raw)) => {
                let period = raw.period.as_deref().and_then(|p| freq.parse_period(p));
                if period.is_none() {
                    if let Some(p) = raw.period.as_deref() {
                        trace!(period = p, "unparseable observation period");
                    }
                }
                let value = raw.value.as_deref().and_then(|v| v.trim().parse().ok());
                self.current_obs = Some(Obs::new(period, value));
                Ok(true)
            }
            Ok(None) => {
                self.current_obs = None;
                Ok(false)
            }
            Err(err) => {
                self.close();
                Err(err.into())
            }
        }
    }

    /// Period of the current observation (`None` when unparseable or absent)
    pub fn obs_period(&self) -> Result<Option<chrono::NaiveDateTime>> {
        Ok(self.on_obs()?.period)
    }

    /// Value of the current observation (`None` when absent on the wire)
    pub fn obs_value(&self) -> Result<Option<f64>> {
        Ok(self.on_obs()?.value)
    }

    /// The structure this cursor decodes against
    pub fn structure(&self) -> &DataStructure {
        &self.structure
    }

    /// Close the cursor and release the underlying stream
    ///
    /// Idempotent; all further calls except repeated `close` fail with
    /// [`Error::Closed`].
    pub fn close(&mut self) {
        self.decoder = None;
        self.current = None;
        self.current_obs = None;
        self.state = CursorState::Closed;
    }

    fn on_series(&self) -> Result<&CurrentSeries> {
        match self.state {
            CursorState::Closed => Err(Error::Closed),
            CursorState::OnSeries => self
                .current
                .as_ref()
                .ok_or(Error::IllegalState("cursor is not on a series")),
            CursorState::BeforeFirst => Err(Error::IllegalState(
                "next_series() has not been called yet",
            )),
            CursorState::End => Err(Error::IllegalState("cursor is past the last series")),
        }
    }

    fn on_obs(&self) -> Result<&Obs> {
        self.on_series()?;
        self.current_obs
            .as_ref()
            .ok_or(Error::IllegalState("cursor is not on an observation"))
    }

    /// Map a wire-level series header onto the structure: dimension values
    /// into key slots, the rest into attributes
    fn resolve_series(&mut self, raw: RawSeries) -> Result<CurrentSeries> {
        self.builder.clear();
        let mut attributes = BTreeMap::new();
        for (id, value) in raw.values {
            match self.builder.index_of(&id) {
                Some(slot) => {
                    self.builder.set_at(slot + 1, &value)?;
                }
                None if raw.mixed_values => {
                    attributes.insert(id, value);
                }
                None => {
                    return Err(DecodeError::UnknownDimension(
                        id,
                        self.structure.ref_id.clone(),
                    )
                    .into());
                }
            }
        }
        for (id, value) in raw.attributes {
            attributes.insert(id, value);
        }
        let key = self.builder.build();
        let freq = self.resolver.resolve(&key, &attributes);
        Ok(CurrentSeries {
            key,
            freq,
            attributes,
        })
    }
}

// ============================================================================
// Shared XML helpers
// ============================================================================

/// Local part of a qualified name, lossily decoded
pub(crate) fn local_name(qname: QName<'_>) -> String {
    String::from_utf8_lossy(qname.local_name().as_ref()).into_owned()
}

/// True when the element's local name matches `expected`
pub(crate) fn is_element(e: &BytesStart<'_>, expected: &[u8]) -> bool {
    e.local_name().as_ref() == expected
}

/// True when the closing element's local name matches `expected`
pub(crate) fn is_end_element(e: &BytesEnd<'_>, expected: &[u8]) -> bool {
    e.local_name().as_ref() == expected
}

/// All attributes of an element as owned (local-name, value) pairs
pub(crate) fn attr_pairs(
    e: &BytesStart<'_>,
) -> std::result::Result<Vec<(String, String)>, DecodeError> {
    let mut pairs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let name = local_name(attr.key);
        let value = attr.unescape_value().map_err(DecodeError::Xml)?.into_owned();
        pairs.push((name, value));
    }
    Ok(pairs)
}

/// Value of one attribute by local name, if present
pub(crate) fn attr_value(
    e: &BytesStart<'_>,
    name: &[u8],
) -> std::result::Result<Option<String>, DecodeError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(
                attr.unescape_value().map_err(DecodeError::Xml)?.into_owned(),
            ));
        }
    }
    Ok(None)
}
