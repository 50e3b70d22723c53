pub mod tiff;

use crate::error::Result;
use crate::tile::{PixelType, Tile};

/// Pixel-space geometry of one series.
#[derive(Clone, Copy, Debug)]
pub struct SeriesDimensions {
    pub size_x: usize,
    pub size_y: usize,
    pub size_c: usize,
    pub size_z: usize,
    pub size_t: usize,
    pub pixel_type: PixelType,
}

/// Descriptive metadata of one series. Acquisition date and physical pixel
/// size are best-effort: empty string / 0 when the source does not carry them.
#[derive(Clone, Debug)]
pub struct SeriesMetadata {
    pub id: String,
    pub name: String,
    pub dimension_order: String,
    pub acquisition_date: String,
    pub physical_pixel_size: f64,
}

/// One open handle onto a multi-series pyramidal container.
///
/// A handle is stateful (`select_series` sets the series every other call
/// operates on) and is NOT safe to share across workers: every worker must
/// open its own handle through a [`SourceProvider`]. The handle is closed on
/// drop.
pub trait SourceReader {
    fn series_count(&mut self) -> Result<usize>;

    fn select_series(&mut self, series: usize) -> Result<()>;

    fn dimensions(&mut self) -> Result<SeriesDimensions>;

    fn metadata(&mut self) -> Result<SeriesMetadata>;

    /// One windowed read from the selected series: `plane` indexes the
    /// z-plane, the window is (x, y, width, height) in level pixels.
    fn read_region(
        &mut self,
        plane: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<Tile>;
}

/// Opens fresh, private [`SourceReader`] handles.
///
/// Providers are shared across the worker pool; the handles they produce are
/// not. Handles never cross workers.
pub trait SourceProvider: Send + Sync {
    fn open(&self) -> Result<Box<dyn SourceReader>>;
}
