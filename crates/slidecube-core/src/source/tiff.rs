use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::{s, Array3};
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::consts::OUTPUT_DIMENSION_ORDER;
use crate::error::{Result, SlidecubeError};
use crate::io::codec::{channel_count, decoded_to_f32};
use crate::source::{SeriesDimensions, SeriesMetadata, SourceProvider, SourceReader};
use crate::tile::{PixelType, Tile};

/// Opens private [`TiffSlideSource`] handles, one per worker.
#[derive(Clone, Debug)]
pub struct TiffSlideProvider {
    path: PathBuf,
    memory_budget: usize,
}

impl TiffSlideProvider {
    /// `memory_budget` caps the decode buffers of every handle this provider
    /// opens (the caller divides its total budget by the worker count).
    pub fn new(path: impl Into<PathBuf>, memory_budget: usize) -> Self {
        Self {
            path: path.into(),
            memory_budget,
        }
    }
}

impl SourceProvider for TiffSlideProvider {
    fn open(&self) -> Result<Box<dyn SourceReader>> {
        Ok(Box::new(TiffSlideSource::open(
            &self.path,
            self.memory_budget,
        )?))
    }
}

/// Generic adapter treating each directory of a multi-page TIFF as one
/// series. A demo/test vehicle, not a microscopy reader: single z/t plane
/// per series, dimension order fixed to XYCZT, metadata best-effort.
pub struct TiffSlideSource {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    series: usize,
    series_count: usize,
    plane_cache: Option<PlaneCache>,
}

struct PlaneCache {
    series: usize,
    data: Array3<f32>,
}

impl TiffSlideSource {
    pub fn open(path: &Path, memory_budget: usize) -> Result<Self> {
        let file = File::open(path)?;
        let mut limits = Limits::default();
        limits.decoding_buffer_size = memory_budget;
        limits.intermediate_buffer_size = memory_budget;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(limits);

        let mut series_count = 1;
        while decoder.more_images() {
            decoder.next_image()?;
            series_count += 1;
        }
        decoder.seek_to_image(0)?;
        debug!(path = %path.display(), series = series_count, "opened TIFF source");

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            series: 0,
            series_count,
            plane_cache: None,
        })
    }

    fn pixel_type(&mut self) -> Result<PixelType> {
        Ok(match self.decoder.colortype()? {
            ColorType::Gray(16) | ColorType::RGB(16) | ColorType::RGBA(16) => PixelType::UInt16,
            ColorType::Gray(32) | ColorType::RGB(32) | ColorType::RGBA(32) => PixelType::Float,
            _ => PixelType::UInt8,
        })
    }

    fn channel_count(&mut self) -> Result<usize> {
        channel_count(self.decoder.colortype()?)
    }

    /// Decode the selected series once and keep it until the selection moves.
    fn cached_plane(&mut self) -> Result<&Array3<f32>> {
        let stale = match &self.plane_cache {
            Some(cache) => cache.series != self.series,
            None => true,
        };
        if stale {
            let (width, height) = self.decoder.dimensions()?;
            let channels = self.channel_count()?;
            let decoded = self.decoder.read_image()?;
            let samples = decoded_to_f32(decoded)?;
            let expected = height as usize * width as usize * channels;
            if samples.len() != expected {
                return Err(SlidecubeError::Source(format!(
                    "decoded sample count {} does not match {}x{}x{}",
                    samples.len(),
                    width,
                    height,
                    channels
                )));
            }
            let data =
                Array3::from_shape_vec((height as usize, width as usize, channels), samples)
                    .map_err(|e| SlidecubeError::Source(e.to_string()))?;
            self.plane_cache = Some(PlaneCache {
                series: self.series,
                data,
            });
        }
        Ok(&self.plane_cache.as_ref().unwrap().data)
    }
}

impl SourceReader for TiffSlideSource {
    fn series_count(&mut self) -> Result<usize> {
        Ok(self.series_count)
    }

    fn select_series(&mut self, series: usize) -> Result<()> {
        if series >= self.series_count {
            return Err(SlidecubeError::Source(format!(
                "series {series} out of range (count: {})",
                self.series_count
            )));
        }
        self.decoder.seek_to_image(series)?;
        self.series = series;
        Ok(())
    }

    fn dimensions(&mut self) -> Result<SeriesDimensions> {
        let (width, height) = self.decoder.dimensions()?;
        Ok(SeriesDimensions {
            size_x: width as usize,
            size_y: height as usize,
            size_c: self.channel_count()?,
            size_z: 1,
            size_t: 1,
            pixel_type: self.pixel_type()?,
        })
    }

    fn metadata(&mut self) -> Result<SeriesMetadata> {
        let name = match self.decoder.find_tag(Tag::ImageDescription) {
            Ok(Some(Value::Ascii(s))) if !s.is_empty() => s,
            _ => {
                let base = self
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".into());
                format!("{} #{}", base, self.series + 1)
            }
        };
        // TIFF tag 306 (DateTime), not part of the decoder's named tag set.
        let acquisition_date = match self.decoder.find_tag(Tag::Unknown(306)) {
            Ok(Some(Value::Ascii(s))) => s,
            _ => String::new(),
        };
        let physical_pixel_size = match self.decoder.find_tag(Tag::XResolution) {
            Ok(Some(Value::Rational(num, den))) if num > 0 => den as f64 / num as f64,
            _ => 0.0,
        };
        Ok(SeriesMetadata {
            id: format!("Image:{}", self.series),
            name,
            dimension_order: OUTPUT_DIMENSION_ORDER.to_string(),
            acquisition_date,
            physical_pixel_size,
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
        if plane != 0 {
            return Err(SlidecubeError::Source(format!(
                "plane {plane} out of range (single-plane series)"
            )));
        }
        let data = self.cached_plane()?;
        let (size_y, size_x, _) = data.dim();
        if x + width > size_x || y + height > size_y {
            return Err(SlidecubeError::Source(format!(
                "window {width}x{height}+{x}+{y} exceeds series extent {size_x}x{size_y}"
            )));
        }
        let window = data.slice(s![y..y + height, x..x + width, ..]).to_owned();
        Ok(Tile::new(window))
    }
}
