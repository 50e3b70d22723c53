use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{error, info};

use crate::error::{Result, SlidecubeError};
use crate::index::TileIndex;
use crate::io::codec;
use crate::manifest::ExperimentManifest;
use crate::pipeline::progress::ProgressReporter;
use crate::pipeline::RunLayout;
use crate::stack::{reduce, LayerStack, Statistic};
use crate::tile::TileKey;

#[derive(Clone, Debug)]
pub struct CompositeConfig {
    /// Layer-group names, matched as substrings of exported layer names.
    pub modalities: Vec<String>,
    pub statistics: Vec<Statistic>,
    pub workers: usize,
}

/// One modality resolved to its concrete layer series, validated before any
/// parallel work starts.
#[derive(Clone, Debug)]
pub struct ResolvedModality {
    pub name: String,
    /// (layer name, exported series) in manifest order.
    pub layers: Vec<(String, usize)>,
}

/// Resolve every requested modality against the manifest.
///
/// A modality with no matching exported layer is a hard precondition
/// failure naming the missing groups; nothing is computed in that case.
pub fn resolve_modalities(
    manifest: &ExperimentManifest,
    names: &[String],
) -> Result<Vec<ResolvedModality>> {
    let mut resolved = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        let layers: Vec<(String, usize)> = manifest
            .layers()
            .filter(|(layer, _)| layer.contains(name.as_str()))
            .map(|(layer, series)| (layer.to_string(), series))
            .collect();
        if layers.is_empty() {
            missing.push(name.clone());
        } else {
            resolved.push(ResolvedModality {
                name: name.clone(),
                layers,
            });
        }
    }
    if !missing.is_empty() {
        return Err(SlidecubeError::MissingLayers(missing.join(", ")));
    }
    Ok(resolved)
}

/// One compositor output row (`files2.csv`).
#[derive(Clone, Debug)]
pub struct CompositeRecord {
    pub z: usize,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub path: PathBuf,
    pub statistic: Statistic,
    pub modality: String,
}

/// The compositor results table, persisted once per run.
#[derive(Debug, Default)]
pub struct CompositeTable {
    records: Vec<CompositeRecord>,
}

impl CompositeTable {
    pub fn new(records: Vec<CompositeRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CompositeRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Modalities in order of first appearance.
    pub fn modalities(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for record in &self.records {
            if !out.contains(&record.modality) {
                out.push(record.modality.clone());
            }
        }
        out
    }

    /// Statistics in order of first appearance.
    pub fn statistics(&self) -> Vec<Statistic> {
        let mut out = Vec::new();
        for record in &self.records {
            if !out.contains(&record.statistic) {
                out.push(record.statistic);
            }
        }
        out
    }

    pub fn z_values(&self) -> Vec<usize> {
        let mut values: Vec<usize> = self.records.iter().map(|r| r.z).collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    pub fn select(
        &self,
        modality: &str,
        statistic: Statistic,
        z: usize,
    ) -> Vec<&CompositeRecord> {
        self.records
            .iter()
            .filter(|r| r.modality == modality && r.statistic == statistic && r.z == z)
            .collect()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "z,x,y,width,height,image_path,statistic,modality")?;
        for r in &self.records {
            writeln!(
                out,
                "{},{},{},{},{},{},{},{}",
                r.z,
                r.x,
                r.y,
                r.width,
                r.height,
                r.path.display(),
                r.statistic,
                r.modality,
            )?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line_no == 0 || line.trim().is_empty() {
                continue;
            }
            records.push(parse_composite_line(&line).ok_or_else(|| {
                SlidecubeError::Pipeline(format!(
                    "malformed composite row {} in {}",
                    line_no + 1,
                    path.display()
                ))
            })?);
        }
        Ok(Self { records })
    }
}

// image_path is the only cell that may contain commas: 5 cells precede it
// and 2 follow, so split from both ends.
fn parse_composite_line(line: &str) -> Option<CompositeRecord> {
    let cells: Vec<&str> = line.split(',').collect();
    if cells.len() < 8 {
        return None;
    }
    let tail = cells.len() - 2;
    Some(CompositeRecord {
        z: cells[0].parse().ok()?,
        x: cells[1].parse().ok()?,
        y: cells[2].parse().ok()?,
        width: cells[3].parse().ok()?,
        height: cells[4].parse().ok()?,
        path: PathBuf::from(cells[5..tail].join(",")),
        statistic: cells[tail].parse().ok()?,
        modality: cells[tail + 1].to_string(),
    })
}

/// Composite every (modality, statistic, z, grid position) tuple and persist
/// the results table.
pub fn run_composite(
    layout: &RunLayout,
    manifest: &ExperimentManifest,
    index: &TileIndex,
    config: &CompositeConfig,
    reporter: &dyn ProgressReporter,
) -> Result<CompositeTable> {
    if config.statistics.is_empty() {
        return Err(SlidecubeError::Pipeline("no statistics requested".into()));
    }
    let resolved = resolve_modalities(manifest, &config.modalities)?;

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .map_err(|e| SlidecubeError::Pipeline(e.to_string()))?;

    let z_values = index.z_values();
    let mut records = Vec::new();

    for modality in &resolved {
        info!(modality = %modality.name, layers = modality.layers.len(), "compositing");
        fs::create_dir_all(layout.composite_dir(&modality.name))?;

        // The grid is read off the first layer; selections cover one level.
        let lead_series = modality.layers[0].1;
        let x_values = index.x_values(lead_series);
        let y_values = index.y_values(lead_series);

        for &statistic in &config.statistics {
            for &z in &z_values {
                let positions: Vec<(usize, usize)> = y_values
                    .iter()
                    .flat_map(|&y| x_values.iter().map(move |&x| (x, y)))
                    .collect();
                reporter.begin_stage("Compositing tiles", Some(positions.len()));

                let batch: Vec<std::result::Result<CompositeRecord, String>> =
                    pool.install(|| {
                        positions
                            .par_iter()
                            .map(|&(x, y)| {
                                let outcome = composite_tile(
                                    layout, index, modality, statistic, z, x, y,
                                )
                                .map_err(|e| e.to_string());
                                reporter.advance();
                                outcome
                            })
                            .collect()
                    });
                reporter.finish_stage();

                for outcome in batch {
                    match outcome {
                        Ok(record) => records.push(record),
                        Err(message) => {
                            error!(modality = %modality.name, %statistic, z, %message,
                                   "composite tile failed");
                        }
                    }
                }
            }
        }
    }

    let table = CompositeTable::new(records);
    table.write_csv(&layout.composite_csv())?;
    info!(tiles = table.records().len(), "compositing complete");
    Ok(table)
}

/// Gather one grid position from every layer, reduce, write one tile.
fn composite_tile(
    layout: &RunLayout,
    index: &TileIndex,
    modality: &ResolvedModality,
    statistic: Statistic,
    z: usize,
    x: usize,
    y: usize,
) -> Result<CompositeRecord> {
    let layers = modality.layers.len();
    let mut stack: Option<LayerStack> = None;
    let mut width = 0;
    let mut height = 0;

    for (layer, (_, series)) in modality.layers.iter().enumerate() {
        let key = TileKey {
            series: *series,
            z,
            x,
            y,
        };
        let record = index.get(&key).ok_or(SlidecubeError::MissingTile {
            series: *series,
            z,
            x,
            y,
        })?;
        let tile = codec::load_tile(&record.path)?;
        let stack = stack.get_or_insert_with(|| {
            width = tile.width();
            height = tile.height();
            LayerStack::zeros(tile.height(), tile.width(), tile.channels(), layers)
        });
        stack.set_layer(layer, &tile)?;
    }

    let stack = stack.ok_or(SlidecubeError::EmptyStack)?;
    let result = reduce(&stack, statistic)?;
    let path = layout.composite_tile_path(&modality.name, statistic, z, x, y);
    codec::save_tile_f32(&path, &result.data)?;

    Ok(CompositeRecord {
        z,
        x,
        y,
        width,
        height,
        path,
        statistic,
        modality: modality.name.clone(),
    })
}
