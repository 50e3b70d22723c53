mod common;

use std::path::PathBuf;

use slidecube_core::error::SlidecubeError;
use slidecube_core::index::TileIndex;
use slidecube_core::inventory::build_inventory;
use slidecube_core::pipeline::export::{run_export, ExportConfig, ModalityFilter};
use slidecube_core::pipeline::{NoOpReporter, RunLayout};
use slidecube_core::tile::TileKey;

use common::SyntheticProvider;

fn exported_layout(dir: &std::path::Path) -> RunLayout {
    let provider = SyntheticProvider::two_layer_pyramid();
    let inventory = build_inventory(&provider).unwrap();
    let layout = RunLayout::at(dir.join("processed_slide"));
    run_export(
        &provider,
        &inventory,
        std::path::Path::new("slide.vsi"),
        &layout,
        &ExportConfig {
            level: 0,
            tile_size: 32,
            channels: 3,
            workers: 2,
            modalities: ModalityFilter::everything(),
        },
        &NoOpReporter,
    )
    .unwrap();
    layout
}

/// Indexing an export recovers exactly the written tile set, sorted.
#[test]
fn test_export_index_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let layout = exported_layout(dir.path());

    // A stray file below the tile root is silently skipped.
    std::fs::write(layout.tiles_root().join("scratch.tif"), b"not a tile").unwrap();

    let index = TileIndex::scan(&layout.tiles_root()).unwrap();
    assert_eq!(index.len(), 12);

    let mut expected = Vec::new();
    for series in [0usize, 2] {
        for x in 0..3 {
            for y in 0..2 {
                expected.push(TileKey { series, z: 0, x, y });
            }
        }
    }
    expected.sort();
    let keys: Vec<TileKey> = index.records().map(|r| r.key).collect();
    assert_eq!(keys, expected);
    // Canonical order is ascending on every key column.
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    // Actual sizes are read from the tiles, boundary tiles included.
    let edge = index
        .get(&TileKey {
            series: 0,
            z: 0,
            x: 2,
            y: 1,
        })
        .unwrap();
    assert_eq!((edge.width, edge.height), (6, 18));

    assert_eq!(index.tiles_across(0), 3);
    assert_eq!(index.x_values(0), vec![0, 1, 2]);
    assert_eq!(index.y_values(0), vec![0, 1]);
    assert_eq!(index.z_values(), vec![0]);
}

#[test]
fn test_csv_dump_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let layout = exported_layout(dir.path());

    let index = TileIndex::scan(&layout.tiles_root()).unwrap();
    index.write_csv(&layout.index_csv()).unwrap();

    let contents = std::fs::read_to_string(layout.index_csv()).unwrap();
    assert!(contents.starts_with("series,z,x,y,width,height,image_path"));

    let restored = TileIndex::read_csv(&layout.index_csv()).unwrap();
    assert_eq!(restored.len(), index.len());
    let original: Vec<TileKey> = index.records().map(|r| r.key).collect();
    let recovered: Vec<TileKey> = restored.records().map(|r| r.key).collect();
    assert_eq!(original, recovered);
}

#[test]
fn test_duplicate_key_is_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    let layout = exported_layout(dir.path());

    let tile = layout.tile_path(0, 0, 0, 0);
    let result = TileIndex::from_paths(&[tile.clone(), tile]);
    assert!(matches!(
        result,
        Err(SlidecubeError::DuplicateTile {
            series: 0,
            z: 0,
            x: 0,
            y: 0
        })
    ));
}

#[test]
fn test_non_matching_paths_skipped() {
    let paths = vec![
        PathBuf::from("/tmp/readme.txt"),
        PathBuf::from("/tmp/series_z0/tile_x000_y000.tif"),
        PathBuf::from("/tmp/seriesA_z0/tile_x000_y000.tif"),
    ];
    let index = TileIndex::from_paths(&paths).unwrap();
    assert!(index.is_empty());
}
