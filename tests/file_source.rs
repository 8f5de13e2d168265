//! File-backed source and TOML configuration, wired end to end

mod common;

use sdmx_cube::cache::{BulkCache, CacheConfig};
use sdmx_cube::cube::XmlFileSource;
use sdmx_cube::{CubeEngine, Dialect, Key, SourceConfig};
use std::fs;
use std::sync::Arc;

#[test]
fn test_query_over_file_source() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("gov_fin.xml");
    fs::write(&data_path, common::document(Dialect::Compact20)).unwrap();

    let source = XmlFileSource::new("file", common::flow(), &data_path, common::structure());
    let engine = CubeEngine::new();

    let key = Key::parse(common::REF_KEY, '.', 7).unwrap();
    let series = engine
        .series_with_data(&source, &common::flow(), &key)
        .unwrap();
    assert_eq!(series.obs.len(), common::REF_VALUES.len());
    assert_eq!(series.obs[0].value, Some(common::REF_VALUES[0]));
}

#[test]
fn test_file_source_reopens_per_query() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("gov_fin.xml");
    fs::write(&data_path, common::document(Dialect::Generic21)).unwrap();

    let source = XmlFileSource::new("file", common::flow(), &data_path, common::structure());
    let engine = CubeEngine::new();
    let flow = common::flow();

    // Two full traversals back to back: each query gets a fresh cursor
    for _ in 0..2 {
        let count = engine
            .all_series(&source, &flow, &Key::all(7))
            .unwrap()
            .count();
        assert_eq!(count, 120);
    }
}

#[test]
fn test_config_file_drives_the_stack() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("gov_fin.xml");
    fs::write(&data_path, common::document(Dialect::Compact21)).unwrap();

    let config_path = dir.path().join("source.toml");
    fs::write(
        &config_path,
        format!(
            r#"
flow = "{}"
dimensions = "FREQ, REF_AREA, ADJUSTMENT, ACCOUNTING_ENTRY, REF_SECTOR, COUNTERPART_SECTOR, ITEM"
cache_ttl_secs = 120
cache_depth = 1
file = "{}"
"#,
            common::FLOW_ID,
            data_path.display()
        ),
    )
    .unwrap();

    let config = SourceConfig::from_file(config_path.to_str().unwrap()).unwrap();
    config.validate().unwrap();

    let structure = Arc::new(config.data_structure().unwrap());
    let source = XmlFileSource::new(
        "file",
        config.flow_ref(),
        config.file.clone().unwrap(),
        structure,
    );
    let engine = CubeEngine::new();
    let cache = BulkCache::new(CacheConfig::from_source(&config));

    let key = Key::parse(common::REF_KEY, '.', 7).unwrap();
    let series = cache
        .series_with_data(&engine, &source, &config.flow_ref(), &key)
        .unwrap();
    assert_eq!(series.obs.len(), 25);
    assert_eq!(cache.config().depth, 1);
}
