//! Tile load/save. TIFF tiles go through the `tiff` crate decoder so the
//! float32 statistic tiles and the 8-bit export tiles share one read path;
//! anything else falls back to the `image` crate.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::RgbImage;
use ndarray::Array3;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

use crate::error::{Result, SlidecubeError};
use crate::io::tiff::write_f32_tiff;
use crate::tile::Tile;

fn is_tiff(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tif" | "tiff")
    )
}

/// Load a tile as an f32 volume in the file's native units.
pub fn load_tile(path: &Path) -> Result<Tile> {
    if is_tiff(path) {
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
        let (width, height) = decoder.dimensions()?;
        let channels = channel_count(decoder.colortype()?)?;
        let samples = decoded_to_f32(decoder.read_image()?)?;
        let data = Array3::from_shape_vec(
            (height as usize, width as usize, channels),
            samples,
        )
        .map_err(|e| SlidecubeError::Pipeline(e.to_string()))?;
        Ok(Tile::new(data))
    } else {
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let samples = rgb.into_raw().into_iter().map(|v| v as f32).collect();
        let data = Array3::from_shape_vec((height as usize, width as usize, 3), samples)
            .map_err(|e| SlidecubeError::Pipeline(e.to_string()))?;
        Ok(Tile::new(data))
    }
}

/// Read (width, height) from the file header without decoding pixels.
pub fn tile_dimensions(path: &Path) -> Result<(usize, usize)> {
    if is_tiff(path) {
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
        let (width, height) = decoder.dimensions()?;
        Ok((width as usize, height as usize))
    } else {
        let (width, height) = image::image_dimensions(path)?;
        Ok((width as usize, height as usize))
    }
}

/// Save an (h, w, 3) volume as 8-bit RGB, clamping to [0, 255].
pub fn save_tile_rgb8(path: &Path, data: &Array3<f32>) -> Result<()> {
    let (height, width, channels) = data.dim();
    if channels != 3 {
        return Err(SlidecubeError::ChannelCount(channels));
    }
    let pixels: Vec<u8> = data.iter().map(|v| v.clamp(0.0, 255.0) as u8).collect();
    let img = RgbImage::from_raw(width as u32, height as u32, pixels)
        .expect("buffer size matches dimensions");
    img.save(path)?;
    Ok(())
}

/// Save an interleaved float32 volume (statistic tiles keep full precision).
pub fn save_tile_f32(path: &Path, data: &Array3<f32>) -> Result<()> {
    write_f32_tiff(path, data)
}

pub(crate) fn channel_count(colortype: ColorType) -> Result<usize> {
    Ok(match colortype {
        ColorType::Gray(_) => 1,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(SlidecubeError::Pipeline(format!(
                "unsupported tile color type: {other:?}"
            )))
        }
    })
}

pub(crate) fn decoded_to_f32(decoded: DecodingResult) -> Result<Vec<f32>> {
    Ok(match decoded {
        DecodingResult::U8(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|s| s as f32).collect(),
        other => {
            return Err(SlidecubeError::Pipeline(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    })
}
