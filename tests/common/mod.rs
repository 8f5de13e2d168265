//! Shared fixture: one government-finance style dataset rendered in all four
//! wire dialects
//!
//! Seven dimensions, 30 reference areas with 4 items each (120 series). One
//! well-known series (`A.DEU.1.0.319.0.UBLGE`) carries 25 annual
//! observations; the rest carry 3, enough to compare dialects without
//! megabyte fixtures.

// Not every test binary uses every helper.
#![allow(dead_code)]

use sdmx_cube::cube::MemorySource;
use sdmx_cube::{DataStructure, Dialect, Dimension, FlowRef};
use std::fmt::Write;
use std::sync::Arc;

pub const FLOW_ID: &str = "GOV_FIN";

pub const AREAS: [&str; 30] = [
    "AUT", "BEL", "BGR", "CYP", "CZE", "DEU", "DNK", "ESP", "EST", "FIN", "FRA", "GBR", "GRC",
    "HRV", "HUN", "IRL", "ITA", "LTU", "LUX", "LVA", "MLT", "NLD", "POL", "PRT", "ROU", "SVK",
    "SVN", "SWE", "CHE", "NOR",
];

pub const ITEMS: [&str; 4] = ["UBLGE", "UBLG", "UDGG", "UVGD"];

pub const REF_KEY: &str = "A.DEU.1.0.319.0.UBLGE";

/// Net lending 1991..=2015 for the reference series
pub const REF_VALUES: [f64; 25] = [
    -2.8574221, -2.4, -3.0, -2.5, -9.4, -3.3, -2.7, -2.2, -1.7, 0.9, -3.1, -3.9, -4.2, -3.7,
    -3.3, -1.7, -0.2, -0.1, -3.2, -4.4, -0.9, 0.0, -0.1, 0.3, -0.1420473,
];

pub fn flow() -> FlowRef {
    FlowRef::new(FLOW_ID)
}

pub fn structure() -> Arc<DataStructure> {
    Arc::new(
        DataStructure::new(
            "GOV_FIN_DSD",
            "Government finance statistics",
            vec![
                Dimension::new("FREQ", "Frequency", 1),
                Dimension::new("REF_AREA", "Reference area", 2),
                Dimension::new("ADJUSTMENT", "Adjustment indicator", 3),
                Dimension::new("ACCOUNTING_ENTRY", "Accounting entry", 4),
                Dimension::new("REF_SECTOR", "Reference sector", 5),
                Dimension::new("COUNTERPART_SECTOR", "Counterpart sector", 6),
                Dimension::new("ITEM", "Item", 7),
            ],
            "TIME_PERIOD",
            "OBS_VALUE",
        )
        .unwrap(),
    )
}

pub fn source(dialect: Dialect) -> MemorySource {
    MemorySource::new("fixture", flow(), document(dialect), structure())
}

fn is_reference(area: &str, item: &str) -> bool {
    area == "DEU" && item == "UBLGE"
}

fn observations(area_idx: usize, item_idx: usize, area: &str, item: &str) -> Vec<(i32, f64)> {
    if is_reference(area, item) {
        return REF_VALUES
            .iter()
            .enumerate()
            .map(|(i, v)| (1991 + i as i32, *v))
            .collect();
    }
    (0..3)
        .map(|y| {
            let value = -(area_idx as f64) * 0.5 - (item_idx as f64) * 0.25 - (y as f64) * 0.125;
            (1991 + y, value)
        })
        .collect()
}

/// The fixture dataset rendered in the given dialect
pub fn document(dialect: Dialect) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    match dialect {
        Dialect::Generic20 => out.push_str(
            "<GenericData xmlns=\"http://www.SDMX.org/resources/SDMXML/schemas/v2_0/message\">\n<DataSet>\n",
        ),
        Dialect::Generic21 => out.push_str(
            "<GenericData xmlns=\"http://www.sdmx.org/resources/sdmxml/schemas/v2_1/message\">\n<DataSet>\n",
        ),
        Dialect::Compact20 => out.push_str(
            "<CompactData xmlns=\"http://www.SDMX.org/resources/SDMXML/schemas/v2_0/message\">\n<DataSet>\n",
        ),
        Dialect::Compact21 => out.push_str(
            "<StructureSpecificData xmlns=\"http://www.sdmx.org/resources/sdmxml/schemas/v2_1/message\">\n<DataSet>\n",
        ),
    }
    for (area_idx, area) in AREAS.iter().enumerate() {
        for (item_idx, item) in ITEMS.iter().enumerate() {
            let obs = observations(area_idx, item_idx, area, item);
            match dialect {
                Dialect::Generic20 | Dialect::Generic21 => {
                    write_generic_series(&mut out, dialect, area, item, &obs);
                }
                Dialect::Compact20 | Dialect::Compact21 => {
                    write_compact_series(&mut out, dialect, area, item, &obs);
                }
            }
        }
    }
    match dialect {
        Dialect::Generic20 | Dialect::Generic21 => out.push_str("</DataSet>\n</GenericData>\n"),
        Dialect::Compact20 => out.push_str("</DataSet>\n</CompactData>\n"),
        Dialect::Compact21 => out.push_str("</DataSet>\n</StructureSpecificData>\n"),
    }
    out
}

fn key_values<'a>(area: &'a str, item: &'a str) -> [(&'static str, &'a str); 7] {
    [
        ("FREQ", "A"),
        ("REF_AREA", area),
        ("ADJUSTMENT", "1"),
        ("ACCOUNTING_ENTRY", "0"),
        ("REF_SECTOR", "319"),
        ("COUNTERPART_SECTOR", "0"),
        ("ITEM", item),
    ]
}

fn write_generic_series(
    out: &mut String,
    dialect: Dialect,
    area: &str,
    item: &str,
    obs: &[(i32, f64)],
) {
    let concept = if dialect.is_v21() { "id" } else { "concept" };
    out.push_str("<Series>\n<SeriesKey>\n");
    for (id, value) in key_values(area, item) {
        writeln!(out, "<Value {}=\"{}\" value=\"{}\"/>", concept, id, value).unwrap();
    }
    out.push_str("</SeriesKey>\n<Attributes>\n");
    if !dialect.is_v21() {
        writeln!(out, "<Value {}=\"TIME_FORMAT\" value=\"P1Y\"/>", concept).unwrap();
    }
    writeln!(out, "<Value {}=\"UNIT\" value=\"PC\"/>", concept).unwrap();
    out.push_str("</Attributes>\n");
    for (year, value) in obs {
        if dialect.is_v21() {
            writeln!(
                out,
                "<Obs><ObsDimension value=\"{}\"/><ObsValue value=\"{}\"/></Obs>",
                year, value
            )
            .unwrap();
        } else {
            writeln!(
                out,
                "<Obs><Time>{}</Time><ObsValue value=\"{}\"/></Obs>",
                year, value
            )
            .unwrap();
        }
    }
    out.push_str("</Series>\n");
}

fn write_compact_series(
    out: &mut String,
    dialect: Dialect,
    area: &str,
    item: &str,
    obs: &[(i32, f64)],
) {
    out.push_str("<Series");
    for (id, value) in key_values(area, item) {
        write!(out, " {}=\"{}\"", id, value).unwrap();
    }
    if !dialect.is_v21() {
        out.push_str(" TIME_FORMAT=\"P1Y\"");
    }
    out.push_str(" UNIT=\"PC\">\n");
    for (year, value) in obs {
        writeln!(
            out,
            "<Obs TIME_PERIOD=\"{}\" OBS_VALUE=\"{}\"/>",
            year, value
        )
        .unwrap();
    }
    out.push_str("</Series>\n");
}
