use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use glob::glob;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SlidecubeError};
use crate::io::codec;
use crate::tile::{TileKey, TileRecord};

/// Path shape of every exported tile: `series<N>_z<P>/tile_x<X>_y<Y>.tif`.
const TILE_PATTERN: &str = r"series(\d+)_z(\d+)[/\\]tile_x(\d+)_y(\d+)\.tif$";

/// The queryable table of extracted tiles, keyed (series, z, x, y).
///
/// The `BTreeMap` key order is the canonical iteration order for every
/// downstream consumer; the CSV dump is a debugging artifact, not the source
/// of truth.
#[derive(Debug, Default)]
pub struct TileIndex {
    records: BTreeMap<TileKey, TileRecord>,
}

impl TileIndex {
    /// Index every tile below `root` (recursive).
    pub fn scan(root: &Path) -> Result<Self> {
        let pattern = root.join("**/*.tif");
        let pattern = pattern.to_string_lossy();
        let paths: Vec<PathBuf> = glob(&pattern)
            .map_err(|e| SlidecubeError::Pipeline(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .collect();
        Self::from_paths(&paths)
    }

    /// Index an explicit candidate list. Paths not matching the tile naming
    /// pattern are silently skipped; matching tiles are opened to read their
    /// actual pixel size (tiles are not assumed uniform).
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let pattern = Regex::new(TILE_PATTERN).expect("tile pattern is valid");
        let mut index = Self::default();

        for path in paths {
            let text = path.to_string_lossy();
            let Some(captures) = pattern.captures(&text) else {
                debug!(path = %path.display(), "skipping non-tile path");
                continue;
            };
            let key = TileKey {
                series: captures[1].parse().expect("digits"),
                z: captures[2].parse().expect("digits"),
                x: captures[3].parse().expect("digits"),
                y: captures[4].parse().expect("digits"),
            };
            let (width, height) = codec::tile_dimensions(path)?;
            index.insert(TileRecord {
                key,
                width,
                height,
                path: path.clone(),
            })?;
        }

        info!(tiles = index.len(), "tile index built");
        Ok(index)
    }

    /// Colliding keys are a hard error: two files claiming the same grid
    /// position means the export run is corrupt.
    pub fn insert(&mut self, record: TileRecord) -> Result<()> {
        let key = record.key;
        if self.records.insert(key, record).is_some() {
            return Err(SlidecubeError::DuplicateTile {
                series: key.series,
                z: key.z,
                x: key.x,
                y: key.y,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &TileKey) -> Option<&TileRecord> {
        self.records.get(key)
    }

    /// All records in canonical (series, z, x, y) ascending order.
    pub fn records(&self) -> impl Iterator<Item = &TileRecord> {
        self.records.values()
    }

    /// Records of one (series, z) slice, canonical order.
    pub fn slice(&self, series: usize, z: usize) -> impl Iterator<Item = &TileRecord> {
        self.records
            .values()
            .filter(move |r| r.key.series == series && r.key.z == z)
    }

    pub fn z_values(&self) -> Vec<usize> {
        let mut values: Vec<usize> = self.records.keys().map(|k| k.z).collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    pub fn x_values(&self, series: usize) -> Vec<usize> {
        let mut values: Vec<usize> = self
            .records
            .keys()
            .filter(|k| k.series == series)
            .map(|k| k.x)
            .collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    pub fn y_values(&self, series: usize) -> Vec<usize> {
        let mut values: Vec<usize> = self
            .records
            .keys()
            .filter(|k| k.series == series)
            .map(|k| k.y)
            .collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    /// Columns in the grid (max grid-x + 1).
    pub fn tiles_across(&self, series: usize) -> usize {
        self.records
            .keys()
            .filter(|k| k.series == series)
            .map(|k| k.x + 1)
            .max()
            .unwrap_or(0)
    }

    /// Dump `files1.csv` for inspection.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "series,z,x,y,width,height,image_path")?;
        for record in self.records.values() {
            writeln!(
                out,
                "{},{},{},{},{},{},{}",
                record.key.series,
                record.key.z,
                record.key.x,
                record.key.y,
                record.width,
                record.height,
                record.path.display(),
            )?;
        }
        out.flush()?;
        Ok(())
    }

    /// Rebuild an index from a previous CSV dump (sizes trusted, tiles not
    /// reopened).
    pub fn read_csv(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut index = Self::default();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line_no == 0 || line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.splitn(7, ',').collect();
            if cells.len() != 7 {
                return Err(SlidecubeError::Pipeline(format!(
                    "malformed index row {} in {}",
                    line_no + 1,
                    path.display()
                )));
            }
            let parse = |s: &str| {
                s.parse::<usize>().map_err(|_| {
                    SlidecubeError::Pipeline(format!("malformed index value: {s}"))
                })
            };
            index.insert(TileRecord {
                key: TileKey {
                    series: parse(cells[0])?,
                    z: parse(cells[1])?,
                    x: parse(cells[2])?,
                    y: parse(cells[3])?,
                },
                width: parse(cells[4])?,
                height: parse(cells[5])?,
                path: PathBuf::from(cells[6]),
            })?;
        }
        Ok(index)
    }
}
