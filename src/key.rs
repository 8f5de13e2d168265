//! Key algebra for cube navigation
//!
//! A [`Key`] is a fixed-arity, ordered sequence of dimension values where the
//! empty string denotes a wildcard. Keys built against the same
//! [`DataStructure`](crate::types::DataStructure) are comparable: containment
//! and child derivation over them are the basis of hierarchical navigation.
//!
//! Pure and deterministic; no I/O anywhere in this module.
//!
//! # Example
//!
//! ```rust
//! use sdmx_cube::key::Key;
//!
//! let all = Key::all(3);
//! let partial = Key::parse("LOCSTL04..", '.', 3).unwrap();
//! let full = Key::parse("LOCSTL04.AUS.M", '.', 3).unwrap();
//!
//! assert!(all.contains(&partial));
//! assert!(partial.contains(&full));
//! assert!(!full.contains(&partial));
//! assert!(full.is_series());
//! assert_eq!(partial.to_string(), "LOCSTL04..");
//! ```

use crate::error::{Error, Result};
use crate::types::Dimension;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slot value that matches anything in that position
pub const WILDCARD: &str = "";

/// Ordered, fixed-arity dimension key with wildcard positions
///
/// Invariant: `size()` equals the dimension count of the structure the key
/// was built against. Two keys of different arity never contain each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(Vec<String>);

impl Key {
    /// The key that is wildcard in every slot; contains everything of the
    /// same arity
    pub fn all(arity: usize) -> Self {
        Self(vec![String::new(); arity])
    }

    /// Build a key directly from slot values (empty string = wildcard)
    pub fn of<I, S>(slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(slots.into_iter().map(Into::into).collect())
    }

    /// Parse a delimited key against a target arity
    ///
    /// Empty segments become wildcards. A slot count different from `arity`
    /// fails with [`Error::InvalidKey`]; callers pass the dimension count of
    /// the structure they query.
    pub fn parse(text: &str, separator: char, arity: usize) -> Result<Self> {
        let slots: Vec<String> = text.split(separator).map(str::to_string).collect();
        if slots.len() != arity {
            return Err(Error::InvalidKey(format!(
                "'{}' has {} slots, structure has {} dimensions",
                text,
                slots.len(),
                arity
            )));
        }
        Ok(Self(slots))
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Slot value at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// True if the slot at `index` is a wildcard
    pub fn is_wildcard(&self, index: usize) -> bool {
        self.0.get(index).map(|s| s.is_empty()).unwrap_or(false)
    }

    /// True if no slot is a wildcard: the key selects exactly one series
    pub fn is_series(&self) -> bool {
        self.0.iter().all(|s| !s.is_empty())
    }

    /// True if every slot is a wildcard
    pub fn is_all(&self) -> bool {
        self.0.iter().all(|s| s.is_empty())
    }

    /// Containment test: every slot of `self` is wildcard or equal to the
    /// slot of `other`
    ///
    /// Keys of different arity are never comparable and yield `false`.
    pub fn contains(&self, other: &Key) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.is_empty() || a == b)
    }

    /// Number of leading concrete slots before the first wildcard
    pub fn depth(&self) -> usize {
        self.0.iter().take_while(|s| !s.is_empty()).count()
    }

    /// Derive a child key by filling the first wildcard slot with `value`
    ///
    /// Fails with [`Error::InvalidArgument`] when the key has no wildcard
    /// slot left or when `value` is itself empty.
    pub fn child(&self, value: &str) -> Result<Key> {
        if value.is_empty() {
            return Err(Error::InvalidArgument(
                "Child value cannot be empty".to_string(),
            ));
        }
        let slot = self
            .0
            .iter()
            .position(|s| s.is_empty())
            .ok_or_else(|| Error::InvalidArgument(format!("'{}' has no wildcard slot", self)))?;
        let mut slots = self.0.clone();
        slots[slot] = value.to_string();
        Ok(Key(slots))
    }

    /// Copy of this key with every slot from `keep` onward wildcarded
    ///
    /// Root-key derivation for bulk fetching: `keep` is the number of leading
    /// slots to preserve.
    pub fn with_wildcards_after(&self, keep: usize) -> Key {
        let mut slots = self.0.clone();
        for slot in slots.iter_mut().skip(keep) {
            slot.clear();
        }
        Key(slots)
    }

    /// Render with an arbitrary separator; round-trips with
    /// [`Key::parse`] for the same separator
    pub fn to_delimited(&self, separator: char) -> String {
        let mut out = String::new();
        for (i, slot) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(separator);
            }
            out.push_str(slot);
        }
        out
    }

    /// Slot values in order
    pub fn slots(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_delimited('.'))
    }
}

/// Incremental key construction against a dimension list
///
/// Arity is fixed by the dimension count at creation; values land in the slot
/// of the dimension they are set for, independent of call order. Reusable
/// across series via [`KeyBuilder::clear`].
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    ids: Vec<String>,
    slots: Vec<String>,
}

impl KeyBuilder {
    /// Create a builder over the given dimensions (assumed position-sorted,
    /// as [`DataStructure`](crate::types::DataStructure) guarantees)
    pub fn new(dimensions: &[Dimension]) -> Self {
        Self {
            ids: dimensions.iter().map(|d| d.id.clone()).collect(),
            slots: vec![String::new(); dimensions.len()],
        }
    }

    /// Set the value for the dimension with the given id
    ///
    /// Unknown ids fail with [`Error::InvalidArgument`].
    pub fn set(&mut self, dimension_id: &str, value: &str) -> Result<&mut Self> {
        let index = self
            .ids
            .iter()
            .position(|id| id == dimension_id)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("Unknown dimension id '{}'", dimension_id))
            })?;
        self.slots[index] = value.to_string();
        Ok(self)
    }

    /// Set the value at a 1-based dimension position
    ///
    /// Out-of-range positions fail with [`Error::InvalidArgument`].
    pub fn set_at(&mut self, position: usize, value: &str) -> Result<&mut Self> {
        if position == 0 || position > self.slots.len() {
            return Err(Error::InvalidArgument(format!(
                "Position {} out of range 1..={}",
                position,
                self.slots.len()
            )));
        }
        self.slots[position - 1] = value.to_string();
        Ok(self)
    }

    /// Slot index for a dimension id, if known to this builder
    pub fn index_of(&self, dimension_id: &str) -> Option<usize> {
        self.ids.iter().position(|id| id == dimension_id)
    }

    /// Reset all slots to wildcard for the next series
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    /// Snapshot the current slots as a key
    pub fn build(&self) -> Key {
        Key(self.slots.clone())
    }
}
