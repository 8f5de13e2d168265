//! Stateless cube queries over a series source
//!
//! Every function validates its arguments against the flow's data structure
//! before any I/O, then opens a fresh cursor and answers the query as a lazy
//! traversal. Ordering follows document order of the underlying stream; it
//! is not guaranteed stable across wire dialects or repeated fetches from a
//! live source, so callers compare results as sets.

use crate::cube::source::{BoxedReader, DataDetail, SeriesSource};
use crate::decode::SeriesCursor;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::types::{DataStructure, Series, SeriesInfo};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Cube query functions over a [`SeriesSource`]
///
/// Holds only presentation options; each call re-opens a fresh cursor and
/// never caches.
#[derive(Debug, Clone, Default)]
pub struct CubeEngine {
    label_attribute: Option<String>,
}

impl CubeEngine {
    /// Engine with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a series attribute as the display label in listings
    pub fn with_label_attribute(attribute: impl Into<String>) -> Self {
        Self {
            label_attribute: Some(attribute.into()),
        }
    }

    /// List every series contained by `key`, without observations
    ///
    /// Lazy: series outside the selection are filtered as the stream is
    /// read, and observations are never materialized. Yields items in
    /// document order.
    pub fn all_series(
        &self,
        source: &dyn SeriesSource,
        flow: &crate::types::FlowRef,
        key: &Key,
    ) -> Result<SeriesIter> {
        let structure = source.structure(flow)?;
        check_arity(key, &structure)?;
        let cursor = source.open(flow, key, DataDetail::NoData)?;
        Ok(SeriesIter {
            cursor,
            filter: key.clone(),
            label_attribute: self.label_attribute.clone(),
            done: false,
        })
    }

    /// Materialize every series contained by `key`, observations included
    ///
    /// When two decoded series resolve to the same key (typically a
    /// missing dimension on the wire), the second occurrence yields
    /// [`Error::AmbiguousKey`] for that one series; the traversal continues.
    pub fn all_series_with_data(
        &self,
        source: &dyn SeriesSource,
        flow: &crate::types::FlowRef,
        key: &Key,
    ) -> Result<SeriesDataIter> {
        let structure = source.structure(flow)?;
        check_arity(key, &structure)?;
        let cursor = source.open(flow, key, DataDetail::Full)?;
        Ok(SeriesDataIter {
            cursor,
            filter: key.clone(),
            seen: HashSet::new(),
            done: false,
        })
    }

    /// Fetch the single series identified by a full key
    ///
    /// `key` must be series-level ([`Key::is_series`]); stops reading the
    /// stream as soon as the match is found. Absent series fail with
    /// [`Error::NotFound`].
    pub fn series_with_data(
        &self,
        source: &dyn SeriesSource,
        flow: &crate::types::FlowRef,
        key: &Key,
    ) -> Result<Series> {
        if !key.is_series() {
            return Err(Error::InvalidArgument(format!(
                "'{}' has wildcard slots; a series-level key is required",
                key
            )));
        }
        for item in self.all_series_with_data(source, flow, key)? {
            let series = item?;
            if &series.key == key {
                return Ok(series);
            }
        }
        Err(Error::NotFound(format!(
            "series '{}' in flow '{}'",
            key, flow
        )))
    }

    /// Distinct values observed at slot `depth` among series contained by
    /// `key`, in document order
    ///
    /// `key` must have exactly `depth` leading concrete slots and wildcards
    /// thereafter; `depth` must address an existing slot.
    pub fn children(
        &self,
        source: &dyn SeriesSource,
        flow: &crate::types::FlowRef,
        key: &Key,
        depth: usize,
    ) -> Result<Vec<String>> {
        let structure = source.structure(flow)?;
        check_arity(key, &structure)?;
        if depth >= structure.dimension_count() {
            return Err(Error::InvalidArgument(format!(
                "depth {} out of range for {} dimensions",
                depth,
                structure.dimension_count()
            )));
        }
        if key.depth() != depth || !key.slots()[depth..].iter().all(String::is_empty) {
            return Err(Error::InvalidArgument(format!(
                "'{}' does not have exactly {} leading concrete slots",
                key, depth
            )));
        }
        debug!(%flow, %key, depth, "listing children");
        let mut cursor = source.open(flow, key, DataDetail::NoData)?;
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        while cursor.next_series()? {
            let series_key = cursor.series_key()?;
            if !key.contains(series_key) {
                continue;
            }
            if let Some(value) = series_key.get(depth) {
                if !value.is_empty() && seen.insert(value.to_string()) {
                    values.push(value.to_string());
                }
            }
        }
        Ok(values)
    }
}

fn check_arity(key: &Key, structure: &DataStructure) -> Result<()> {
    if key.size() != structure.dimension_count() {
        return Err(Error::InvalidArgument(format!(
            "key '{}' has {} slots, structure '{}' has {} dimensions",
            key,
            key.size(),
            structure.ref_id,
            structure.dimension_count()
        )));
    }
    Ok(())
}

/// Lazy series listing; yields identity without observations
pub struct SeriesIter {
    cursor: SeriesCursor<BoxedReader>,
    filter: Key,
    label_attribute: Option<String>,
    done: bool,
}

impl std::fmt::Debug for SeriesIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesIter")
            .field("filter", &self.filter)
            .field("label_attribute", &self.label_attribute)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Iterator for SeriesIter {
    type Item = Result<SeriesInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.cursor.next_series() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    self.cursor.close();
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
            match read_info(&self.cursor, &self.filter, self.label_attribute.as_deref()) {
                Ok(Some(info)) => return Some(Ok(info)),
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn read_info(
    cursor: &SeriesCursor<BoxedReader>,
    filter: &Key,
    label_attribute: Option<&str>,
) -> Result<Option<SeriesInfo>> {
    let key = cursor.series_key()?;
    if !filter.contains(key) {
        return Ok(None);
    }
    let meta: BTreeMap<String, String> = cursor.series_attributes()?.clone();
    let label = label_attribute
        .and_then(|attr| meta.get(attr).cloned())
        .unwrap_or_else(|| key.to_string());
    Ok(Some(SeriesInfo {
        key: key.clone(),
        label,
        meta,
    }))
}

/// Lazy series materialization; observations retained
pub struct SeriesDataIter {
    cursor: SeriesCursor<BoxedReader>,
    filter: Key,
    seen: HashSet<Key>,
    done: bool,
}

impl Iterator for SeriesDataIter {
    type Item = Result<Series>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.cursor.next_series() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    self.cursor.close();
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
            match self.read_series() {
                Ok(Some(result)) => return Some(result),
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl SeriesDataIter {
    /// Materialize the series the cursor is positioned on, if it passes the
    /// filter; `Ok(Some(Err(..)))` flags a duplicated key without aborting
    /// the traversal
    #[allow(clippy::type_complexity)]
    fn read_series(&mut self) -> Result<Option<Result<Series>>> {
        let key = self.cursor.series_key()?.clone();
        if !self.filter.contains(&key) {
            return Ok(None);
        }
        if !self.seen.insert(key.clone()) {
            return Ok(Some(Err(Error::AmbiguousKey(key.to_string()))));
        }
        let freq = self.cursor.series_frequency()?;
        let meta = self.cursor.series_attributes()?.clone();
        let mut obs = Vec::new();
        while self.cursor.next_obs()? {
            obs.push(crate::types::Obs::new(
                self.cursor.obs_period()?,
                self.cursor.obs_value()?,
            ));
        }
        Ok(Some(Ok(Series::new(key, freq, obs, meta))))
    }
}
