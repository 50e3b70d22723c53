mod common;

use std::fs::File;
use std::io::BufReader;

use ndarray::Array3;
use tiff::decoder::{Decoder, DecodingResult};

use slidecube_core::index::TileIndex;
use slidecube_core::inventory::build_inventory;
use slidecube_core::io::codec;
use slidecube_core::manifest::ExperimentManifest;
use slidecube_core::pipeline::composite::{run_composite, CompositeConfig};
use slidecube_core::pipeline::export::{run_export, ExportConfig, ModalityFilter};
use slidecube_core::pipeline::montage::{
    assemble_grid, montage_composites, montage_layers, GridTile, MontageOptions,
};
use slidecube_core::pipeline::{NoOpReporter, RunLayout};
use slidecube_core::stack::Statistic;

use common::{sample_value, SyntheticProvider};

/// Joining an N x M grid of solid-colour tiles reproduces each tile's colour
/// in its region, at exactly (N*tileW, M*tileH).
#[test]
fn test_solid_grid_idempotence() {
    let dir = tempfile::tempdir().unwrap();
    let (tile_w, tile_h) = (16usize, 16usize);
    let (n_x, n_y) = (2usize, 3usize);

    let mut tiles = Vec::new();
    for y in 0..n_y {
        for x in 0..n_x {
            let colour = [(x * 50) as f32, (y * 50) as f32, 100.0];
            let data = Array3::from_shape_fn((tile_h, tile_w, 3), |(_, _, c)| colour[c]);
            let path = dir.path().join(format!("solid_{x}_{y}.tif"));
            codec::save_tile_rgb8(&path, &data).unwrap();
            tiles.push(GridTile { x, y, path });
        }
    }

    let image = assemble_grid(&tiles, tile_w, tile_h).unwrap();
    assert_eq!(image.dim(), (n_y * tile_h, n_x * tile_w, 3));
    for y in 0..n_y {
        for x in 0..n_x {
            let (row, col) = (y * tile_h + tile_h / 2, x * tile_w + tile_w / 2);
            assert_eq!(image[[row, col, 0]], (x * 50) as f32);
            assert_eq!(image[[row, col, 1]], (y * 50) as f32);
            assert_eq!(image[[row, col, 2]], 100.0);
        }
    }
}

fn exported(dir: &std::path::Path) -> (RunLayout, ExperimentManifest, TileIndex) {
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
    let manifest = ExperimentManifest::load(&layout.manifest_json()).unwrap();
    let index = TileIndex::scan(&layout.tiles_root()).unwrap();
    (layout, manifest, index)
}

/// End to end: export, index, reassemble, then decode the pyramidal output.
#[test]
fn test_layer_montages_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (layout, manifest, index) = exported(dir.path());

    let outputs = montage_layers(
        &layout,
        &manifest,
        &index,
        &MontageOptions::default(),
        &NoOpReporter,
    )
    .unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0], layout.layer_montage_path("slide.vsi #1 ppl 10x", 0));

    let mut decoder = Decoder::new(BufReader::new(File::open(&outputs[0]).unwrap())).unwrap();
    // Full resolution, one page per channel.
    assert_eq!(decoder.dimensions().unwrap(), (70, 50));
    let mut pages = 1;
    while decoder.more_images() {
        decoder.next_image().unwrap();
        pages += 1;
    }
    assert_eq!(pages, 3);

    // The embedded metadata names the montage's own file.
    decoder.seek_to_image(0).unwrap();
    let description = decoder
        .get_tag_ascii_string(tiff::tags::Tag::ImageDescription)
        .unwrap();
    assert!(description.contains("slide.vsi #1 ppl 10x_z0.tif"));
    assert!(description.contains("DimensionOrder=\"XYCZT\""));
    assert!(description.contains("SizeX=\"70\""));

    // Channel 0 page reproduces the source layer exactly.
    match decoder.read_image().unwrap() {
        DecodingResult::U8(samples) => {
            assert_eq!(samples.len(), 70 * 50);
            for (row, col) in [(0usize, 0usize), (10, 33), (49, 69)] {
                assert_eq!(
                    samples[row * 70 + col],
                    sample_value(0, 0, col, row, 0) as u8
                );
            }
        }
        other => panic!("expected 8-bit pages, got {other:?}"),
    }
}

#[test]
fn test_composite_montages_rescale_indices() {
    let dir = tempfile::tempdir().unwrap();
    let (layout, manifest, index) = exported(dir.path());

    // A two-layer modality spanning both polarizations.
    let table = run_composite(
        &layout,
        &manifest,
        &index,
        &CompositeConfig {
            modalities: vec!["10x".into()],
            statistics: vec![Statistic::Max, Statistic::MaxIndex],
            workers: 2,
        },
        &NoOpReporter,
    )
    .unwrap();

    let outputs = montage_composites(
        &layout,
        &manifest,
        &table,
        &[],
        &MontageOptions::default(),
        &NoOpReporter,
    )
    .unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(layout
        .composite_montage_path("10x", Statistic::Max, 0)
        .exists());
    assert!(layout
        .composite_montage_path("10x", Statistic::MaxIndex, 0)
        .exists());

    let mut decoder = Decoder::new(BufReader::new(
        File::open(layout.composite_montage_path("10x", Statistic::MaxIndex, 0)).unwrap(),
    ))
    .unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (70, 50));
    // Index maps are rescaled into the full 8-bit range.
    match decoder.read_image().unwrap() {
        DecodingResult::U8(samples) => {
            assert!(samples.iter().any(|&v| v == 0));
            assert!(samples.iter().any(|&v| v == 255));
        }
        other => panic!("expected 8-bit pages, got {other:?}"),
    }
}
