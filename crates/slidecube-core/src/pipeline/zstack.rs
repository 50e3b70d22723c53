use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::DynamicImage;
use ndarray::{Array2, Array3};
use tiff::decoder::Decoder;
use tracing::{debug, info};

use crate::consts::OUTPUT_DIMENSION_ORDER;
use crate::error::{Result, SlidecubeError};
use crate::io::codec;
use crate::io::ome::{ome_xml, OmeImageSpec};
use crate::io::pyramid::{write_pyramid, Compression, PageStack, PyramidOptions};

#[derive(Clone, Debug)]
pub struct ZStackOptions {
    pub pixel_size: f64,
    pub tile_size: usize,
    pub compression: Compression,
}

/// Stack arbitrary images as the z-planes of one pyramidal output.
///
/// Planes keep the input order; every plane is normalised to an RGB triple
/// first (see [`load_plane_rgb`]).
pub fn assemble_zstack(
    inputs: &[&Path],
    output: &Path,
    options: &ZStackOptions,
) -> Result<()> {
    if inputs.is_empty() {
        return Err(SlidecubeError::EmptyStack);
    }

    let mut pages: Vec<Array2<u8>> = Vec::with_capacity(inputs.len() * 3);
    let mut plane_dims = None;
    for path in inputs {
        let plane = load_plane_rgb(path)?;
        let (height, width, _) = plane.dim();
        match plane_dims {
            None => plane_dims = Some((height, width)),
            Some(dims) if dims == (height, width) => {}
            Some(_) => {
                return Err(SlidecubeError::Pipeline(format!(
                    "plane {} is {}x{}, expected every plane to match the first",
                    path.display(),
                    width,
                    height
                )))
            }
        }
        for chan in 0..3 {
            pages.push(plane.slice(ndarray::s![.., .., chan]).to_owned());
        }
    }

    let (size_y, size_x) = plane_dims.expect("at least one plane");
    let stack = PageStack::from_pages(&pages)?;
    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = output
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let description = ome_xml(&OmeImageSpec {
        name: &name,
        file_name: &file_name,
        size_x,
        size_y,
        size_c: 3,
        size_z: inputs.len(),
        size_t: 1,
        dimension_order: OUTPUT_DIMENSION_ORDER,
        physical_pixel_size: options.pixel_size,
    });
    write_pyramid(
        output,
        &stack,
        &PyramidOptions {
            tile_width: options.tile_size,
            tile_height: options.tile_size,
            compression: options.compression,
            description: Some(description),
        },
    )?;
    info!(planes = inputs.len(), path = %output.display(), "z-stack written");
    Ok(())
}

/// Normalise one input image to an (h, w, 3) RGB volume.
///
/// Alpha is flattened against black; 3-channel images pass through;
/// single-channel images try to complete an RGB triple from two further
/// pages of the same file, replicating the channel when no pages exist.
/// Anything wider than 3 channels is rejected.
pub fn load_plane_rgb(path: &Path) -> Result<Array3<u8>> {
    let img = image::open(path)?;
    let img = if img.color().has_alpha() {
        flatten_alpha(&img)
    } else {
        img
    };

    match img.color().channel_count() {
        3 => {
            let rgb = img.to_rgb8();
            let (width, height) = rgb.dimensions();
            Ok(Array3::from_shape_vec(
                (height as usize, width as usize, 3),
                rgb.into_raw(),
            )
            .expect("buffer size matches dimensions"))
        }
        1 => match grey_pages_to_rgb(path) {
            Ok(rgb) => Ok(rgb),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "replicating single channel");
                let grey = img.to_luma8();
                let (width, height) = grey.dimensions();
                let mut out = Array3::zeros((height as usize, width as usize, 3));
                for (col, row, pixel) in grey.enumerate_pixels() {
                    for chan in 0..3 {
                        out[[row as usize, col as usize, chan]] = pixel.0[0];
                    }
                }
                Ok(out)
            }
        },
        n => Err(SlidecubeError::ChannelCount(n as usize)),
    }
}

/// Flatten an alpha channel against a black background.
fn flatten_alpha(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = image::RgbImage::new(width, height);
    for (col, row, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel.0[3] as u16;
        let flat = [
            ((pixel.0[0] as u16 * alpha) / 255) as u8,
            ((pixel.0[1] as u16 * alpha) / 255) as u8,
            ((pixel.0[2] as u16 * alpha) / 255) as u8,
        ];
        rgb.put_pixel(col, row, image::Rgb(flat));
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Build an RGB triple from the first three single-band pages of a TIFF.
fn grey_pages_to_rgb(path: &Path) -> Result<Array3<u8>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (width, height) = decoder.dimensions()?;
    let mut out = Array3::zeros((height as usize, width as usize, 3));
    for chan in 0..3 {
        decoder.seek_to_image(chan)?;
        if decoder.dimensions()? != (width, height) {
            return Err(SlidecubeError::Pipeline(format!(
                "page {chan} of {} differs in size",
                path.display()
            )));
        }
        let samples = codec::decoded_to_f32(decoder.read_image()?)?;
        if samples.len() != height as usize * width as usize {
            return Err(SlidecubeError::ChannelCount(
                samples.len() / (height as usize * width as usize).max(1),
            ));
        }
        for (i, value) in samples.into_iter().enumerate() {
            let row = i / width as usize;
            let col = i % width as usize;
            out[[row, col, chan]] = value.clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}
