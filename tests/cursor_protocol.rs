//! Cursor protocol over a full-size document

mod common;

use chrono::{Datelike, NaiveDate};
use sdmx_cube::cube::{DataDetail, SeriesSource};
use sdmx_cube::{Dialect, Error, Frequency, Key};

fn open(dialect: Dialect) -> sdmx_cube::SeriesCursor<sdmx_cube::cube::BoxedReader> {
    common::source(dialect)
        .open(&common::flow(), &Key::all(7), DataDetail::Full)
        .unwrap()
}

#[test]
fn test_walk_counts_every_series() {
    let mut cursor = open(Dialect::Compact20);
    let mut count = 0;
    while cursor.next_series().unwrap() {
        count += 1;
    }
    assert_eq!(count, common::AREAS.len() * common::ITEMS.len());
    // Past the end: accessors are illegal, advancing stays false
    assert!(matches!(cursor.series_key(), Err(Error::IllegalState(_))));
    assert!(!cursor.next_series().unwrap());
}

#[test]
fn test_reference_series_observations() {
    let want = Key::parse(common::REF_KEY, '.', 7).unwrap();
    let mut cursor = open(Dialect::Generic20);
    while cursor.next_series().unwrap() {
        if cursor.series_key().unwrap() != &want {
            continue;
        }
        assert_eq!(cursor.series_frequency().unwrap(), Frequency::Annual);
        assert_eq!(cursor.series_attribute("UNIT").unwrap(), Some("PC"));

        let mut periods = Vec::new();
        let mut values = Vec::new();
        while cursor.next_obs().unwrap() {
            periods.push(cursor.obs_period().unwrap().unwrap());
            values.push(cursor.obs_value().unwrap().unwrap());
        }
        assert_eq!(values.len(), 25);
        assert_eq!(values[0], -2.8574221);
        assert_eq!(values[24], -0.1420473);
        assert_eq!(periods[0].year(), 1991);
        assert_eq!(
            periods[24].date(),
            NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
        );
        return;
    }
    panic!("reference series not found");
}

#[test]
fn test_unread_observations_are_skipped() {
    let mut cursor = open(Dialect::Compact21);
    assert!(cursor.next_series().unwrap());
    let first = cursor.series_key().unwrap().clone();

    // Advance without touching the observations of the first series
    assert!(cursor.next_series().unwrap());
    let second = cursor.series_key().unwrap().clone();
    assert_ne!(first, second);
    assert!(cursor.next_obs().unwrap());
    assert!(cursor.obs_value().unwrap().is_some());
}

#[test]
fn test_observation_accessors_track_position() {
    let mut cursor = open(Dialect::Generic21);
    assert!(cursor.next_series().unwrap());
    // On a series but not yet on an observation
    assert!(matches!(cursor.obs_value(), Err(Error::IllegalState(_))));
    assert!(cursor.next_obs().unwrap());
    assert!(cursor.obs_period().unwrap().is_some());

    // Moving to the next series resets the observation position
    assert!(cursor.next_series().unwrap());
    assert!(matches!(cursor.obs_period(), Err(Error::IllegalState(_))));
}

#[test]
fn test_close_mid_stream() {
    let mut cursor = open(Dialect::Compact20);
    assert!(cursor.next_series().unwrap());
    cursor.close();
    cursor.close();
    assert!(matches!(cursor.next_series(), Err(Error::Closed)));
    assert!(matches!(cursor.series_key(), Err(Error::Closed)));
    assert!(matches!(cursor.next_obs(), Err(Error::Closed)));
}

#[test]
fn test_truncated_document_closes_cursor() {
    let full = common::document(Dialect::Compact20);
    let truncated = &full[..full.len() / 2];
    let mut cursor = sdmx_cube::SeriesCursor::new(
        truncated.as_bytes(),
        Dialect::Compact20,
        common::structure(),
    );
    fn walk<R: std::io::BufRead>(cursor: &mut sdmx_cube::SeriesCursor<R>) -> sdmx_cube::Result<()> {
        while cursor.next_series()? {
            while cursor.next_obs()? {}
        }
        Ok(())
    }
    assert!(walk(&mut cursor).is_err());
    // The failure closed the cursor
    assert!(matches!(cursor.next_series(), Err(Error::Closed)));
}
