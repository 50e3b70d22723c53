use ndarray::Array3;

use slidecube_core::error::{Result, SlidecubeError};
use slidecube_core::source::{
    SeriesDimensions, SeriesMetadata, SourceProvider, SourceReader,
};
use slidecube_core::tile::{PixelType, Tile};

/// Deterministic pixel generator shared by the synthetic source and the
/// expectations in the integration tests. Values stay below 97 so they
/// survive an 8-bit round trip exactly, and the modulus wraps within one
/// tile so per-pixel layer winners vary spatially.
pub fn sample_value(series: usize, z: usize, x: usize, y: usize, c: usize) -> f32 {
    ((series * 31 + z * 17 + c * 7 + x + 2 * y) % 97) as f32
}

#[derive(Clone, Debug)]
pub struct SyntheticSeries {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub planes: usize,
}

/// In-memory stand-in for the Source Reader capability. Every `open` hands
/// out a fresh private reader, like a real provider must.
#[derive(Clone, Debug, Default)]
pub struct SyntheticProvider {
    pub series: Vec<SyntheticSeries>,
}

impl SyntheticProvider {
    /// Two acquisitions (ppl + xpl) with two pyramid levels each, plus an
    /// auxiliary label image.
    pub fn two_layer_pyramid() -> Self {
        Self {
            series: vec![
                SyntheticSeries {
                    name: "slide.vsi #1 ppl 10x".into(),
                    width: 70,
                    height: 50,
                    planes: 1,
                },
                SyntheticSeries {
                    name: "resolution 1".into(),
                    width: 35,
                    height: 25,
                    planes: 1,
                },
                SyntheticSeries {
                    name: "slide.vsi #2 xpl 10x".into(),
                    width: 70,
                    height: 50,
                    planes: 1,
                },
                SyntheticSeries {
                    name: "resolution 1".into(),
                    width: 35,
                    height: 25,
                    planes: 1,
                },
                SyntheticSeries {
                    name: "slide label".into(),
                    width: 16,
                    height: 16,
                    planes: 1,
                },
            ],
        }
    }

    /// Three single-level polarizer acquisitions forming one "ppl" modality.
    pub fn polarizer_set() -> Self {
        Self {
            series: vec![
                SyntheticSeries {
                    name: "slide.vsi #1 ppl 0deg".into(),
                    width: 48,
                    height: 32,
                    planes: 1,
                },
                SyntheticSeries {
                    name: "slide.vsi #2 ppl 45deg".into(),
                    width: 48,
                    height: 32,
                    planes: 1,
                },
                SyntheticSeries {
                    name: "slide.vsi #3 ppl 90deg".into(),
                    width: 48,
                    height: 32,
                    planes: 1,
                },
            ],
        }
    }
}

impl SourceProvider for SyntheticProvider {
    fn open(&self) -> Result<Box<dyn SourceReader>> {
        Ok(Box::new(SyntheticReader {
            series: self.series.clone(),
            current: 0,
        }))
    }
}

struct SyntheticReader {
    series: Vec<SyntheticSeries>,
    current: usize,
}

impl SyntheticReader {
    fn selected(&self) -> &SyntheticSeries {
        &self.series[self.current]
    }
}

impl SourceReader for SyntheticReader {
    fn series_count(&mut self) -> Result<usize> {
        Ok(self.series.len())
    }

    fn select_series(&mut self, series: usize) -> Result<()> {
        if series >= self.series.len() {
            return Err(SlidecubeError::Source(format!(
                "series {series} out of range"
            )));
        }
        self.current = series;
        Ok(())
    }

    fn dimensions(&mut self) -> Result<SeriesDimensions> {
        let s = self.selected();
        Ok(SeriesDimensions {
            size_x: s.width,
            size_y: s.height,
            size_c: 3,
            size_z: s.planes,
            size_t: 1,
            pixel_type: PixelType::UInt8,
        })
    }

    fn metadata(&mut self) -> Result<SeriesMetadata> {
        let s = self.selected();
        Ok(SeriesMetadata {
            id: format!("Image:{}", self.current),
            name: s.name.clone(),
            dimension_order: "XYCZT".into(),
            acquisition_date: String::new(),
            physical_pixel_size: 0.5,
        })
    }

    fn read_region(
        &mut self,
        plane: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<Tile> {
        let s = self.selected();
        if plane >= s.planes || x + width > s.width || y + height > s.height {
            return Err(SlidecubeError::Source(format!(
                "window {width}x{height}+{x}+{y} plane {plane} out of range"
            )));
        }
        let series = self.current;
        let data = Array3::from_shape_fn((height, width, 3), |(row, col, chan)| {
            sample_value(series, plane, x + col, y + row, chan)
        });
        Ok(Tile::new(data))
    }
}
