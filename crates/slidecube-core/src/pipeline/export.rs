use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{error, info};

use crate::consts::MODALITY_PREFIXES;
use crate::error::{Result, SlidecubeError};
use crate::geometry::{effective_size, tile_grid, tile_origin};
use crate::inventory::SeriesInfo;
use crate::io::codec;
use crate::manifest::ExperimentManifest;
use crate::pipeline::progress::ProgressReporter;
use crate::pipeline::RunLayout;
use crate::source::SourceProvider;

/// Named subset of microscopy modalities to export.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModalityFilter {
    pub all: bool,
    pub ppl: bool,
    pub xpl: bool,
    pub reflected: bool,
}

impl ModalityFilter {
    pub fn everything() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    fn prefixes(&self) -> Vec<&'static str> {
        if self.all {
            return MODALITY_PREFIXES.to_vec();
        }
        let mut chosen = Vec::new();
        if self.ppl {
            chosen.push(MODALITY_PREFIXES[0]);
        }
        if self.xpl {
            chosen.push(MODALITY_PREFIXES[1]);
        }
        if self.reflected {
            chosen.push(MODALITY_PREFIXES[2]);
        }
        chosen
    }

    pub fn matches(&self, layer_name: &str) -> bool {
        self.prefixes()
            .iter()
            .any(|prefix| layer_name.contains(prefix))
    }
}

#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Pyramid level: offset added to each acquisition group's first series.
    pub level: usize,
    pub tile_size: usize,
    /// Expected channel count of every exported series.
    pub channels: usize,
    pub workers: usize,
    pub modalities: ModalityFilter,
}

/// One series chosen for export.
#[derive(Clone, Debug)]
pub struct SelectedSeries {
    pub group: u32,
    pub series: usize,
    pub layer_name: String,
}

#[derive(Debug)]
pub struct ExportReport {
    pub selected: Vec<SelectedSeries>,
    pub tiles_written: usize,
    /// (series, error message) per failed task; siblings are unaffected.
    pub failures: Vec<(usize, String)>,
}

/// Pick one series per acquisition group (id >= 1) at the requested level.
///
/// Fails fast when any group is shallower than `level + 1`; callers must
/// not have produced any output yet.
pub fn select_level(inventory: &[SeriesInfo], level: usize) -> Result<Vec<SelectedSeries>> {
    let mut groups: BTreeMap<u32, Vec<&SeriesInfo>> = BTreeMap::new();
    for row in inventory {
        if row.acquisition >= 1 {
            groups.entry(row.acquisition).or_default().push(row);
        }
    }
    if groups.is_empty() {
        return Err(SlidecubeError::Pipeline(
            "no acquisition groups found in the inventory".into(),
        ));
    }

    let mut selected = Vec::with_capacity(groups.len());
    for (group, members) in &groups {
        if members.len() < level + 1 {
            return Err(SlidecubeError::LevelUnavailable {
                group: *group,
                requested: level,
                available: members.len(),
            });
        }
        let first = members[0];
        selected.push(SelectedSeries {
            group: *group,
            series: first.series + level,
            layer_name: first.name.clone(),
        });
    }
    Ok(selected)
}

/// Extract every tile of every plane of the selected series.
///
/// Order is load-bearing: the level precondition is checked before any
/// directory or file is created; the manifest is persisted before the worker
/// pool starts. Each task opens its own private reader handle.
pub fn run_export(
    provider: &dyn SourceProvider,
    inventory: &[SeriesInfo],
    image_path: &Path,
    layout: &RunLayout,
    config: &ExportConfig,
    reporter: &dyn ProgressReporter,
) -> Result<ExportReport> {
    if config.tile_size == 0 {
        return Err(SlidecubeError::InvalidDimensions {
            width: config.tile_size,
            height: config.tile_size,
        });
    }
    let candidates = select_level(inventory, config.level)?;

    let selected: Vec<SelectedSeries> = candidates
        .into_iter()
        .filter(|s| config.modalities.matches(&s.layer_name))
        .collect();
    if selected.is_empty() {
        return Err(SlidecubeError::Pipeline(
            "no series match the modality filter".into(),
        ));
    }

    // Geometry shared by every selected layer: same grid, same level.
    let base = inventory
        .iter()
        .find(|row| row.acquisition == selected[0].group)
        .expect("selected group exists");
    let pixel_size_sel = base.pixel_size * f64::powi(2.0, config.level as i32);

    fs::create_dir_all(layout.tiles_root())?;
    let manifest = ExperimentManifest {
        image_path: image_path.to_string_lossy().into_owned(),
        tile_size_x: config.tile_size,
        tile_size_y: config.tile_size,
        dimension_order: base.dimension_order.clone(),
        sel_level: config.level,
        pixel_size_sel,
        layer_names: selected.iter().map(|s| s.layer_name.clone()).collect(),
        series_span: selected.iter().map(|s| s.series).collect(),
    };
    manifest.save(&layout.manifest_json())?;
    info!(
        layers = selected.len(),
        level = config.level,
        "export manifest written"
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .map_err(|e| SlidecubeError::Pipeline(e.to_string()))?;

    reporter.begin_stage("Exporting tiles", Some(selected.len()));
    let results: Vec<(usize, std::result::Result<usize, String>)> = pool.install(|| {
        selected
            .par_iter()
            .map(|sel| {
                let outcome = export_series(provider, layout, config, sel.series)
                    .map_err(|e| e.to_string());
                reporter.advance();
                (sel.series, outcome)
            })
            .collect()
    });
    reporter.finish_stage();

    let mut tiles_written = 0;
    let mut failures = Vec::new();
    for (series, outcome) in results {
        match outcome {
            Ok(count) => tiles_written += count,
            Err(message) => {
                error!(series, %message, "series export failed");
                failures.push((series, message));
            }
        }
    }

    info!(tiles_written, failed = failures.len(), "export complete");
    Ok(ExportReport {
        selected,
        tiles_written,
        failures,
    })
}

/// One export task: a private reader handle, one windowed read per tile.
fn export_series(
    provider: &dyn SourceProvider,
    layout: &RunLayout,
    config: &ExportConfig,
    series: usize,
) -> Result<usize> {
    let mut reader = provider.open()?;
    reader.select_series(series)?;
    let dims = reader.dimensions()?;

    let (n_x, n_y) = tile_grid(dims.size_x, dims.size_y, config.tile_size, config.tile_size)?;
    let mut written = 0;

    for z in 0..dims.size_z {
        fs::create_dir_all(layout.series_dir(series, z))?;
        for y in 0..n_y {
            for x in 0..n_x {
                let eff_w = effective_size(x, config.tile_size, dims.size_x);
                let eff_h = effective_size(y, config.tile_size, dims.size_y);
                let tile = reader.read_region(
                    z,
                    tile_origin(x, config.tile_size),
                    tile_origin(y, config.tile_size),
                    eff_w,
                    eff_h,
                )?;
                if tile.channels() != config.channels {
                    return Err(SlidecubeError::ChannelCount(tile.channels()));
                }
                codec::save_tile_rgb8(&layout.tile_path(series, z, x, y), &tile.data)?;
                written += 1;
            }
        }
    }
    Ok(written)
}
