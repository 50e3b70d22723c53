mod common;

use slidecube_core::error::SlidecubeError;
use slidecube_core::inventory::build_inventory;
use slidecube_core::io::codec;
use slidecube_core::manifest::ExperimentManifest;
use slidecube_core::pipeline::export::{run_export, ExportConfig, ModalityFilter};
use slidecube_core::pipeline::{NoOpReporter, RunLayout};

use common::{sample_value, SyntheticProvider, SyntheticSeries};

fn config(level: usize) -> ExportConfig {
    ExportConfig {
        level,
        tile_size: 32,
        channels: 3,
        workers: 2,
        modalities: ModalityFilter::everything(),
    }
}

/// A pyramid level deeper than any group aborts before any file exists.
#[test]
fn test_deep_level_aborts_before_output() {
    let provider = SyntheticProvider::two_layer_pyramid();
    let inventory = build_inventory(&provider).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::at(dir.path().join("processed_slide"));

    let result = run_export(
        &provider,
        &inventory,
        std::path::Path::new("slide.vsi"),
        &layout,
        &config(2),
        &NoOpReporter,
    );
    assert!(matches!(
        result,
        Err(SlidecubeError::LevelUnavailable { requested: 2, .. })
    ));
    assert!(!layout.tiles_root().exists());
    assert!(!layout.manifest_json().exists());
}

#[test]
fn test_export_base_level() {
    let provider = SyntheticProvider::two_layer_pyramid();
    let inventory = build_inventory(&provider).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::at(dir.path().join("processed_slide"));

    let report = run_export(
        &provider,
        &inventory,
        std::path::Path::new("slide.vsi"),
        &layout,
        &config(0),
        &NoOpReporter,
    )
    .unwrap();

    // 70x50 at tile 32: 3x2 tiles per layer, two layers.
    assert_eq!(report.selected.len(), 2);
    assert_eq!(report.tiles_written, 12);
    assert!(report.failures.is_empty());

    let manifest = ExperimentManifest::load(&layout.manifest_json()).unwrap();
    assert_eq!(manifest.series_span, vec![0, 2]);
    assert_eq!(
        manifest.layer_names,
        vec!["slide.vsi #1 ppl 10x", "slide.vsi #2 xpl 10x"]
    );
    assert_eq!(manifest.pixel_size_sel, 0.5);

    // Boundary tile shrinks to the remainder.
    let (w, h) = codec::tile_dimensions(&layout.tile_path(0, 0, 2, 1)).unwrap();
    assert_eq!((w, h), (6, 18));

    // Interior tile pixels survive the 8-bit round trip exactly.
    let tile = codec::load_tile(&layout.tile_path(0, 0, 1, 0)).unwrap();
    assert_eq!(tile.data[[3, 4, 1]], sample_value(0, 0, 32 + 4, 3, 1));
}

#[test]
fn test_export_deeper_level_selects_sub_series() {
    let provider = SyntheticProvider::two_layer_pyramid();
    let inventory = build_inventory(&provider).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::at(dir.path().join("processed_slide"));

    run_export(
        &provider,
        &inventory,
        std::path::Path::new("slide.vsi"),
        &layout,
        &config(1),
        &NoOpReporter,
    )
    .unwrap();

    let manifest = ExperimentManifest::load(&layout.manifest_json()).unwrap();
    assert_eq!(manifest.series_span, vec![1, 3]);
    // Physical pixel size doubles per level.
    assert_eq!(manifest.pixel_size_sel, 1.0);
    // Layer names stay the group-base names.
    assert_eq!(
        manifest.layer_names,
        vec!["slide.vsi #1 ppl 10x", "slide.vsi #2 xpl 10x"]
    );
}

#[test]
fn test_modality_filter_subsets_layers() {
    let provider = SyntheticProvider::two_layer_pyramid();
    let inventory = build_inventory(&provider).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::at(dir.path().join("processed_slide"));

    let mut cfg = config(0);
    cfg.modalities = ModalityFilter {
        ppl: true,
        ..ModalityFilter::default()
    };
    let report = run_export(
        &provider,
        &inventory,
        std::path::Path::new("slide.vsi"),
        &layout,
        &cfg,
        &NoOpReporter,
    )
    .unwrap();
    assert_eq!(report.selected.len(), 1);
    assert_eq!(report.selected[0].series, 0);

    let manifest = ExperimentManifest::load(&layout.manifest_json()).unwrap();
    assert_eq!(manifest.series_span, vec![0]);
}

/// One failing series does not poison its siblings.
#[test]
fn test_failed_series_is_isolated() {
    let mut provider = SyntheticProvider::two_layer_pyramid();
    provider.series.push(SyntheticSeries {
        name: "slide.vsi #3 ppl broken".into(),
        width: 0,
        height: 0,
        planes: 1,
    });
    let inventory = build_inventory(&provider).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::at(dir.path().join("processed_slide"));

    let report = run_export(
        &provider,
        &inventory,
        std::path::Path::new("slide.vsi"),
        &layout,
        &config(0),
        &NoOpReporter,
    )
    .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 5);
    // The healthy layers exported in full.
    assert_eq!(report.tiles_written, 12);
    assert!(layout.tile_path(0, 0, 0, 0).exists());
    assert!(layout.tile_path(2, 0, 2, 1).exists());
}
