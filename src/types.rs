//! Core data types shared by every layer of the cube
//!
//! This module defines the value types of the series model:
//!
//! # Key Types
//!
//! - **`Dimension`**: one named, positioned axis of a data structure
//! - **`DataStructure`**: the ordered dimensional schema of a flow
//! - **`FlowRef`**: a named, versioned dataset reference
//! - **`Frequency`**: the period grammar of a series (annual, monthly, ...)
//! - **`Obs`**: a single observation (optional period, optional value)
//! - **`Series`**: a fully-keyed leaf of the cube with its observations
//! - **`SeriesInfo`**: series identity without observations, for listings
//!
//! # Example
//!
//! ```rust
//! use sdmx_cube::types::{DataStructure, Dimension, Frequency};
//!
//! let dsd = DataStructure::new(
//!     "ECB_EXR1",
//!     "Exchange rates",
//!     vec![
//!         Dimension::new("FREQ", "Frequency", 1),
//!         Dimension::new("CURRENCY", "Currency", 2),
//!     ],
//!     "TIME_PERIOD",
//!     "OBS_VALUE",
//! )
//! .unwrap();
//!
//! assert_eq!(dsd.dimension_index("CURRENCY"), Some(1));
//! assert_eq!(Frequency::parse_code("A"), Frequency::Annual);
//! ```

use crate::error::Error;
use crate::key::Key;
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reference to a dataflow exposed by a source
///
/// Opaque to the core: the series source collaborator interprets it. Kept as
/// a newtype so flow identifiers never mix with other strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRef(String);

impl FlowRef {
    /// Create a flow reference from its textual identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The textual identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FlowRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// One named axis of a data structure
///
/// `position` is 1-based and defines the key-slot ordering: the dimension at
/// position 1 fills slot 0 of every [`Key`](crate::key::Key) built against
/// the structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Identifier used by wire documents to reference this dimension
    pub id: String,

    /// Human-readable label
    pub label: String,

    /// 1-based position within the structure
    pub position: usize,
}

impl Dimension {
    /// Create a dimension
    pub fn new(id: impl Into<String>, label: impl Into<String>, position: usize) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            position,
        }
    }
}

/// The dimensional schema of a flow
///
/// Immutable once constructed and shared read-only (typically behind an
/// `Arc`) by every cursor opened over the same flow. Dimensions are kept
/// sorted by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStructure {
    /// Stable structure reference (e.g. agency:id(version))
    pub ref_id: String,

    /// Human-readable label
    pub label: String,

    /// Dimensions sorted by position
    dimensions: Vec<Dimension>,

    /// Concept id of the time dimension
    pub time_dimension_id: String,

    /// Concept id of the primary measure
    pub primary_measure_id: String,
}

impl DataStructure {
    /// Create a structure, validating dimension positions
    ///
    /// Positions must be unique and at least 1; dimensions are re-sorted by
    /// position. An empty dimension list is rejected.
    pub fn new(
        ref_id: impl Into<String>,
        label: impl Into<String>,
        mut dimensions: Vec<Dimension>,
        time_dimension_id: impl Into<String>,
        primary_measure_id: impl Into<String>,
    ) -> Result<Self, Error> {
        if dimensions.is_empty() {
            return Err(Error::Configuration(
                "Data structure requires at least one dimension".to_string(),
            ));
        }
        dimensions.sort_by_key(|d| d.position);
        for pair in dimensions.windows(2) {
            if pair[0].position == pair[1].position {
                return Err(Error::Configuration(format!(
                    "Duplicate dimension position {} ('{}' and '{}')",
                    pair[0].position, pair[0].id, pair[1].id
                )));
            }
        }
        if dimensions[0].position == 0 {
            return Err(Error::Configuration(format!(
                "Dimension '{}' has position 0; positions are 1-based",
                dimensions[0].id
            )));
        }
        Ok(Self {
            ref_id: ref_id.into(),
            label: label.into(),
            dimensions,
            time_dimension_id: time_dimension_id.into(),
            primary_measure_id: primary_measure_id.into(),
        })
    }

    /// Dimensions sorted by position
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Number of dimensions, i.e. the key arity
    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    /// Key-slot index for a dimension id, if the id belongs to the structure
    pub fn dimension_index(&self, id: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.id == id)
    }
}

/// Period grammar of a series
///
/// Determines which parser applies to an observation's raw time text. Codes
/// follow the single-letter convention (A, S, Q, M, W, D, B, H, N), with an
/// optional multiplier digit suffix that is accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// One observation per year (code `A`)
    Annual,
    /// Two observations per year (code `S`)
    HalfYearly,
    /// Four observations per year (code `Q`)
    Quarterly,
    /// One observation per month (code `M`)
    Monthly,
    /// One observation per ISO week (code `W`)
    Weekly,
    /// One observation per calendar day (code `D`)
    Daily,
    /// One observation per business day (code `B`)
    DailyBusiness,
    /// One observation per hour (code `H`)
    Hourly,
    /// One observation per minute (code `N`)
    Minutely,
    /// Frequency could not be determined
    Undefined,
}

impl Frequency {
    /// Parse a single-letter frequency code, optionally followed by a
    /// multiplier digit-string (`"A"`, `"W2"`, ...)
    ///
    /// Any unrecognized code maps to [`Frequency::Undefined`] rather than
    /// failing, so one odd series never poisons a whole document.
    pub fn parse_code(code: &str) -> Self {
        let code = code.trim();
        let mut chars = code.chars();
        let letter = match chars.next() {
            Some(c) => c,
            None => return Frequency::Undefined,
        };
        let multiplier = chars.as_str();
        if !multiplier.is_empty() && !multiplier.bytes().all(|b| b.is_ascii_digit()) {
            return Frequency::Undefined;
        }
        match letter {
            'A' => Frequency::Annual,
            'S' => Frequency::HalfYearly,
            'Q' => Frequency::Quarterly,
            'M' => Frequency::Monthly,
            'W' => Frequency::Weekly,
            'D' => Frequency::Daily,
            'B' => Frequency::DailyBusiness,
            'H' => Frequency::Hourly,
            'N' => Frequency::Minutely,
            _ => Frequency::Undefined,
        }
    }

    /// Parse a `TIME_FORMAT`-style attribute value
    ///
    /// Accepts the ISO-8601 duration codes used by the older wire dialects
    /// (`P1Y`, `P6M`, `P3M`, `P1M`, `P7D`, `P1D`, `PT1H`, `PT1M`) and falls
    /// back to [`Frequency::parse_code`] for sources that put letter codes in
    /// the same attribute.
    pub fn parse_time_format(tf: &str) -> Self {
        match tf.trim() {
            "P1Y" => Frequency::Annual,
            "P6M" => Frequency::HalfYearly,
            "P3M" => Frequency::Quarterly,
            "P1M" => Frequency::Monthly,
            "P7D" | "P1W" => Frequency::Weekly,
            "P1D" => Frequency::Daily,
            "PT1H" => Frequency::Hourly,
            "PT1M" => Frequency::Minutely,
            other => Frequency::parse_code(other),
        }
    }

    /// Parse an observation period string under this frequency's grammar
    ///
    /// Returns `None` on any unparseable text: a malformed period yields an
    /// observation with no timestamp instead of failing the cursor.
    pub fn parse_period(self, text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match self {
            Frequency::Annual => parse_year_start(text),
            Frequency::HalfYearly => parse_year_sub(text, &['S', 'H'], 2, 6),
            Frequency::Quarterly => parse_year_sub(text, &['Q'], 4, 3),
            Frequency::Monthly => parse_monthly(text),
            Frequency::Weekly => parse_iso_week(text),
            Frequency::Daily | Frequency::DailyBusiness => parse_date(text),
            Frequency::Hourly | Frequency::Minutely => parse_datetime(text),
            Frequency::Undefined => parse_datetime(text)
                .or_else(|| parse_date(text))
                .or_else(|| parse_monthly(text))
                .or_else(|| parse_year_start(text)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Annual => "Annual",
            Frequency::HalfYearly => "HalfYearly",
            Frequency::Quarterly => "Quarterly",
            Frequency::Monthly => "Monthly",
            Frequency::Weekly => "Weekly",
            Frequency::Daily => "Daily",
            Frequency::DailyBusiness => "DailyBusiness",
            Frequency::Hourly => "Hourly",
            Frequency::Minutely => "Minutely",
            Frequency::Undefined => "Undefined",
        };
        write!(f, "{}", name)
    }
}

fn year_start(year: i32, month: u32) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    date.and_hms_opt(0, 0, 0)
}

fn parse_year_start(text: &str) -> Option<NaiveDateTime> {
    if text.len() != 4 {
        return None;
    }
    let year: i32 = text.parse().ok()?;
    year_start(year, 1)
}

/// `yyyy-Xn` periods where X is one of `markers` and n is 1..=periods;
/// `months_per_period` spaces the period start months.
fn parse_year_sub(
    text: &str,
    markers: &[char],
    periods: u32,
    months_per_period: u32,
) -> Option<NaiveDateTime> {
    let (year_text, rest) = text.split_once('-')?;
    let year: i32 = year_text.parse().ok()?;
    let mut chars = rest.chars();
    let marker = chars.next()?;
    if !markers.contains(&marker) {
        return None;
    }
    let index: u32 = chars.as_str().parse().ok()?;
    if index < 1 || index > periods {
        return None;
    }
    year_start(year, (index - 1) * months_per_period + 1)
}

/// `yyyy-MM` or `yyyy-Mn`
fn parse_monthly(text: &str) -> Option<NaiveDateTime> {
    let (year_text, rest) = text.split_once('-')?;
    let year: i32 = year_text.parse().ok()?;
    let month_text = rest.strip_prefix('M').unwrap_or(rest);
    let month: u32 = month_text.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    year_start(year, month)
}

/// `yyyy-Www` ISO week periods, mapped to the Monday of that week
fn parse_iso_week(text: &str) -> Option<NaiveDateTime> {
    let (year_text, rest) = text.split_once('-')?;
    let year: i32 = year_text.parse().ok()?;
    let week_text = rest.strip_prefix('W')?;
    let week: u32 = week_text.parse().ok()?;
    let date = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    date.and_hms_opt(0, 0, 0)
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    date.and_hms_opt(0, 0, 0)
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").ok())
}

/// A single observation
///
/// Both fields may be absent: a declared-but-missing observation keeps its
/// place in the series without a period or a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obs {
    /// Period start, when the raw time text was parseable
    pub period: Option<NaiveDateTime>,

    /// Observation value, when present on the wire
    pub value: Option<f64>,
}

impl Obs {
    /// Create an observation
    pub fn new(period: Option<NaiveDateTime>, value: Option<f64>) -> Self {
        Self { period, value }
    }
}

/// A fully-keyed leaf of the cube
///
/// Invariant: `key.is_series()` holds (no wildcard slots). Immutable once
/// constructed; observations keep wire order, which sources emit
/// time-ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Full key, one concrete value per dimension
    pub key: Key,

    /// Resolved frequency
    pub freq: Frequency,

    /// Observations in wire order
    pub obs: Vec<Obs>,

    /// Series-level attributes (attribute id to value)
    pub meta: BTreeMap<String, String>,
}

impl Series {
    /// Create a series
    pub fn new(key: Key, freq: Frequency, obs: Vec<Obs>, meta: BTreeMap<String, String>) -> Self {
        Self {
            key,
            freq,
            obs,
            meta,
        }
    }
}

/// Series identity without observations
///
/// What `all_series` yields: enough to list and label a series without
/// materializing its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// Full key, one concrete value per dimension
    pub key: Key,

    /// Display label: the configured label attribute when present on the
    /// series, otherwise the key text
    pub label: String,

    /// Series-level attributes
    pub meta: BTreeMap<String, String>,
}
