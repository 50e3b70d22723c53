use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::consts::{AUX_MARKERS, SCAN_MARKER};
use crate::error::{Result, SlidecubeError};
use crate::source::SourceProvider;
use crate::tile::PixelType;

/// One row of the pyramid inventory. Immutable once read from the source.
#[derive(Clone, Debug)]
pub struct SeriesInfo {
    pub series: usize,
    pub id: String,
    pub name: String,
    pub dimension_order: String,
    pub acquisition_date: String,
    pub pixel_size: f64,
    pub size_x: usize,
    pub size_y: usize,
    pub size_c: usize,
    pub size_z: usize,
    pub size_t: usize,
    pub pixel_type: PixelType,
    pub acquisition: u32,
}

const CSV_HEADER: &str = "series,ID,Name,dimension_order,acquisition_date,\
pixel_calibration_sel,sizeX,sizeY,sizeC,sizeZ,sizeT,type,Acquisition";

/// Assign acquisition group ids from series display names.
///
/// A name carrying the scan marker and no auxiliary marker opens a new
/// acquisition; auxiliary images (label/overview/macro) get group 0; every
/// other series (pyramid sub-levels) inherits the current group. Group ids
/// are monotonically non-decreasing across series order.
pub fn assign_acquisition_groups<S: AsRef<str>>(names: &[S]) -> Vec<u32> {
    let mut counter = 0u32;
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            if AUX_MARKERS.iter().any(|marker| name.contains(marker)) {
                0
            } else if name.contains(SCAN_MARKER) {
                counter += 1;
                counter
            } else {
                counter
            }
        })
        .collect()
}

/// Enumerate every series of the container behind `provider`.
///
/// Opens a single reader handle; any open failure is fatal and yields no
/// partial inventory. The handle closes when this returns.
pub fn build_inventory(provider: &dyn SourceProvider) -> Result<Vec<SeriesInfo>> {
    let mut reader = provider.open()?;
    let count = reader.series_count()?;

    let mut rows = Vec::with_capacity(count);
    for series in 0..count {
        reader.select_series(series)?;
        let dims = reader.dimensions()?;
        let meta = reader.metadata()?;
        rows.push(SeriesInfo {
            series,
            id: meta.id,
            name: meta.name,
            dimension_order: meta.dimension_order,
            acquisition_date: meta.acquisition_date,
            pixel_size: meta.physical_pixel_size,
            size_x: dims.size_x,
            size_y: dims.size_y,
            size_c: dims.size_c,
            size_z: dims.size_z,
            size_t: dims.size_t,
            pixel_type: dims.pixel_type,
            acquisition: 0,
        });
    }

    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let groups = assign_acquisition_groups(&names);
    for (row, group) in rows.iter_mut().zip(groups) {
        row.acquisition = group;
    }

    info!(series = rows.len(), "inventory complete");
    Ok(rows)
}

pub fn write_inventory_csv(path: &Path, rows: &[SeriesInfo]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{CSV_HEADER}")?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            row.series,
            row.id,
            row.name,
            row.dimension_order,
            row.acquisition_date,
            row.pixel_size,
            row.size_x,
            row.size_y,
            row.size_c,
            row.size_z,
            row.size_t,
            row.pixel_type,
            row.acquisition,
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_inventory_csv(path: &Path) -> Result<Vec<SeriesInfo>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line_no == 0 || line.trim().is_empty() {
            continue;
        }
        rows.push(parse_inventory_line(&line).ok_or_else(|| {
            SlidecubeError::Pipeline(format!(
                "malformed inventory row {} in {}",
                line_no + 1,
                path.display()
            ))
        })?);
    }
    Ok(rows)
}

// Name is the only free-text cell that may contain commas; everything before
// it is 2 cells and everything after it is 10, so split from both ends.
fn parse_inventory_line(line: &str) -> Option<SeriesInfo> {
    let cells: Vec<&str> = line.split(',').collect();
    if cells.len() < 13 {
        return None;
    }
    let tail = cells.len() - 10;
    let name = cells[2..tail].join(",");
    let t = &cells[tail..];
    Some(SeriesInfo {
        series: cells[0].parse().ok()?,
        id: cells[1].to_string(),
        name,
        dimension_order: t[0].to_string(),
        acquisition_date: t[1].to_string(),
        pixel_size: t[2].parse().ok()?,
        size_x: t[3].parse().ok()?,
        size_y: t[4].parse().ok()?,
        size_c: t[5].parse().ok()?,
        size_z: t[6].parse().ok()?,
        size_t: t[7].parse().ok()?,
        pixel_type: t[8].parse().ok()?,
        acquisition: t[9].parse().ok()?,
    })
}
