use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use tracing::info;

use crate::error::{Result, SlidecubeError};
use crate::index::TileIndex;
use crate::io::codec;
use crate::io::ome::{ome_xml, OmeImageSpec};
use crate::io::pyramid::{write_pyramid, Compression, PageStack, PyramidOptions};
use crate::manifest::ExperimentManifest;
use crate::pipeline::composite::CompositeTable;
use crate::pipeline::progress::ProgressReporter;
use crate::pipeline::RunLayout;
use crate::rescale::{narrow_u8, rescale_percentile};
use crate::stack::Statistic;

#[derive(Clone, Debug)]
pub struct MontageOptions {
    pub compression: Compression,
    /// Percentile cut for statistics that need contrast rescaling (0-50).
    pub percent_out: f32,
}

impl Default for MontageOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            percent_out: 1.0,
        }
    }
}

/// One tile to place into a grid join.
#[derive(Clone, Debug)]
pub struct GridTile {
    pub x: usize,
    pub y: usize,
    pub path: PathBuf,
}

/// Join an ordered tile grid into one image.
///
/// Tiles are loaded in the caller's order and placed at
/// (x * tile_w, y * tile_h); the joined extent follows from the boundary
/// tiles' own sizes.
pub fn assemble_grid(
    tiles: &[GridTile],
    tile_width: usize,
    tile_height: usize,
) -> Result<Array3<f32>> {
    if tiles.is_empty() {
        return Err(SlidecubeError::EmptyStack);
    }

    let mut loaded = Vec::with_capacity(tiles.len());
    let mut extent_x = 0;
    let mut extent_y = 0;
    let mut channels = 0;
    for grid_tile in tiles {
        let tile = codec::load_tile(&grid_tile.path)?;
        if channels == 0 {
            channels = tile.channels();
        } else if tile.channels() != channels {
            return Err(SlidecubeError::ChannelCount(tile.channels()));
        }
        extent_x = extent_x.max(grid_tile.x * tile_width + tile.width());
        extent_y = extent_y.max(grid_tile.y * tile_height + tile.height());
        loaded.push((grid_tile.x, grid_tile.y, tile));
    }

    let mut image = Array3::zeros((extent_y, extent_x, channels));
    for (x, y, tile) in loaded {
        let x0 = x * tile_width;
        let y0 = y * tile_height;
        image
            .slice_mut(ndarray::s![
                y0..y0 + tile.height(),
                x0..x0 + tile.width(),
                ..
            ])
            .assign(&tile.data);
    }
    Ok(image)
}

/// Reassemble every exported raw layer into a pyramidal montage.
pub fn montage_layers(
    layout: &RunLayout,
    manifest: &ExperimentManifest,
    index: &TileIndex,
    options: &MontageOptions,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(layout.montages_original_dir())?;
    let z_values = index.z_values();
    let jobs = manifest.layer_names.len() * z_values.len();
    reporter.begin_stage("Assembling layer montages", Some(jobs));

    let mut outputs = Vec::new();
    for (layer_name, series) in manifest.layers() {
        for &z in &z_values {
            let tiles = grid_tiles_from_index(index, series, z);
            if tiles.is_empty() {
                reporter.advance();
                continue;
            }
            let image = assemble_grid(&tiles, manifest.tile_size_x, manifest.tile_size_y)?;
            // Raw layers are already 8-bit safe.
            let narrowed = narrow_u8(&image);
            let path = layout.layer_montage_path(layer_name, z);
            write_montage(&path, &narrowed, manifest, options.compression)?;
            info!(layer = layer_name, z, path = %path.display(), "montage written");
            outputs.push(path);
            reporter.advance();
        }
    }
    reporter.finish_stage();
    Ok(outputs)
}

/// Reassemble compositor outputs into pyramidal montages, rescaling the
/// statistics whose range is not uint8-safe.
pub fn montage_composites(
    layout: &RunLayout,
    manifest: &ExperimentManifest,
    table: &CompositeTable,
    statistics: &[Statistic],
    options: &MontageOptions,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(layout.montages_composite_dir())?;
    let statistics: Vec<Statistic> = if statistics.is_empty() {
        table.statistics()
    } else {
        statistics.to_vec()
    };
    let modalities = table.modalities();
    let z_values = table.z_values();
    let jobs = modalities.len() * statistics.len() * z_values.len();
    reporter.begin_stage("Assembling composite montages", Some(jobs));

    let mut outputs = Vec::new();
    for modality in &modalities {
        for &statistic in &statistics {
            for &z in &z_values {
                let mut records = table.select(modality, statistic, z);
                records.sort_by_key(|r| (r.y, r.x));
                let tiles: Vec<GridTile> = records
                    .iter()
                    .map(|r| GridTile {
                        x: r.x,
                        y: r.y,
                        path: r.path.clone(),
                    })
                    .collect();
                if tiles.is_empty() {
                    reporter.advance();
                    continue;
                }
                let image =
                    assemble_grid(&tiles, manifest.tile_size_x, manifest.tile_size_y)?;
                let narrowed = if statistic.needs_rescale() {
                    rescale_percentile(&image, options.percent_out)
                } else {
                    narrow_u8(&image)
                };
                let path = layout.composite_montage_path(modality, statistic, z);
                write_montage(&path, &narrowed, manifest, options.compression)?;
                info!(modality = %modality, %statistic, z, path = %path.display(),
                      "montage written");
                outputs.push(path);
                reporter.advance();
            }
        }
    }
    reporter.finish_stage();
    Ok(outputs)
}

/// (y outer, x inner) row-major load order for one (series, z) slice.
fn grid_tiles_from_index(index: &TileIndex, series: usize, z: usize) -> Vec<GridTile> {
    let mut tiles: Vec<GridTile> = index
        .slice(series, z)
        .map(|r| GridTile {
            x: r.key.x,
            y: r.key.y,
            path: r.path.clone(),
        })
        .collect();
    tiles.sort_by_key(|t| (t.y, t.x));
    tiles
}

/// Emit one montage as a pyramidal tiled BigTIFF with embedded metadata.
fn write_montage(
    path: &Path,
    image: &Array3<u8>,
    manifest: &ExperimentManifest,
    compression: Compression,
) -> Result<()> {
    let (size_y, size_x, size_c) = image.dim();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stack = PageStack::from_channels(image)?;
    let description = ome_xml(&OmeImageSpec {
        name: &name,
        file_name: &file_name,
        size_x,
        size_y,
        size_c,
        size_z: 1,
        size_t: 1,
        dimension_order: &manifest.dimension_order,
        physical_pixel_size: manifest.pixel_size_sel,
    });
    write_pyramid(
        path,
        &stack,
        &PyramidOptions {
            tile_width: manifest.tile_size_x,
            tile_height: manifest.tile_size_y,
            compression,
            description: Some(description),
        },
    )
}
