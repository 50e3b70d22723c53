//! Pyramidal, tiled, big-addressed container output.
//!
//! The container is BigTIFF: one top-level IFD per page of the
//! [`PageStack`], each carrying its reduced-resolution levels as SubIFDs.
//! Big addressing is unconditional; montages routinely exceed 4 GiB.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use ndarray::{s, Array2, Array3, ArrayView2};
use tracing::debug;

use crate::error::{Result, SlidecubeError};
use crate::geometry::{effective_size, tile_grid, tile_origin};
use crate::io::tiff::{field, tag};
use crate::io::tiff::{
    COMPRESSION_DEFLATE, COMPRESSION_NONE, PHOTOMETRIC_MINISBLACK, SAMPLE_FORMAT_UINT,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Deflate,
}

impl Compression {
    fn code(self) -> u16 {
        match self {
            Self::None => COMPRESSION_NONE,
            Self::Deflate => COMPRESSION_DEFLATE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PyramidOptions {
    pub tile_width: usize,
    pub tile_height: usize,
    pub compression: Compression,
    /// Metadata blob stored in the first IFD's description field.
    pub description: Option<String>,
}

/// A multi-page image reshaped into one tall single-band column.
///
/// Multi-channel and multi-plane images are serialized as stacked
/// single-band pages of the true image height: a 3-channel RGB montage
/// becomes 3 pages, a z-stack of k RGB planes becomes 3k pages (channel
/// fastest). The page height is carried alongside the tall data so the
/// writer knows where the joins are; consuming viewers rely on this exact
/// encoding.
#[derive(Clone, Debug)]
pub struct PageStack {
    data: Array2<u8>,
    page_height: usize,
}

impl PageStack {
    pub fn new(data: Array2<u8>, page_height: usize) -> Result<Self> {
        let (total_height, _) = data.dim();
        if page_height == 0 || total_height % page_height != 0 {
            return Err(SlidecubeError::Pipeline(format!(
                "page stack height {total_height} is not a multiple of page height {page_height}"
            )));
        }
        Ok(Self { data, page_height })
    }

    /// Stack single-band pages vertically. All pages must share dimensions.
    pub fn from_pages(pages: &[Array2<u8>]) -> Result<Self> {
        let first = pages.first().ok_or(SlidecubeError::EmptyStack)?;
        let (page_height, width) = first.dim();
        let mut data = Array2::zeros((page_height * pages.len(), width));
        for (i, page) in pages.iter().enumerate() {
            if page.dim() != (page_height, width) {
                return Err(SlidecubeError::InvalidDimensions {
                    width: page.dim().1,
                    height: page.dim().0,
                });
            }
            data.slice_mut(s![i * page_height..(i + 1) * page_height, ..])
                .assign(page);
        }
        Self::new(data, page_height)
    }

    /// Split an interleaved (h, w, c) image into its bands and stack them.
    pub fn from_channels(image: &Array3<u8>) -> Result<Self> {
        let (_, _, channels) = image.dim();
        let pages: Vec<Array2<u8>> = (0..channels)
            .map(|c| image.slice(s![.., .., c]).to_owned())
            .collect();
        Self::from_pages(&pages)
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn page_height(&self) -> usize {
        self.page_height
    }

    pub fn page_count(&self) -> usize {
        self.data.dim().0 / self.page_height
    }

    pub fn page(&self, index: usize) -> ArrayView2<'_, u8> {
        let start = index * self.page_height;
        self.data.slice(s![start..start + self.page_height, ..])
    }
}

/// Write the page stack as a pyramidal tiled BigTIFF.
///
/// Subresolutions are generated internally: each level halves the previous
/// one until a level fits within a single tile.
pub fn write_pyramid(path: &Path, stack: &PageStack, options: &PyramidOptions) -> Result<()> {
    if options.tile_width == 0 || options.tile_height == 0 {
        return Err(SlidecubeError::InvalidDimensions {
            width: options.tile_width,
            height: options.tile_height,
        });
    }

    let mut out = BufWriter::new(File::create(path)?);
    // BigTIFF header: byte order, version 43, 8-byte offsets, first IFD patched in later.
    out.write_all(b"II")?;
    out.write_all(&43u16.to_le_bytes())?;
    out.write_all(&8u16.to_le_bytes())?;
    out.write_all(&0u16.to_le_bytes())?;
    out.write_all(&0u64.to_le_bytes())?;
    let mut position: u64 = 16;

    // Tile data for every page and level, front of file.
    let mut pages: Vec<Vec<LevelData>> = Vec::with_capacity(stack.page_count());
    for page_index in 0..stack.page_count() {
        let mut levels = Vec::new();
        let mut image = stack.page(page_index).to_owned();
        loop {
            let fits_one_tile = image.dim().1 <= options.tile_width
                && image.dim().0 <= options.tile_height;
            levels.push(write_level_tiles(&mut out, &mut position, &image, options)?);
            if fits_one_tile {
                break;
            }
            image = downsample_half(&image);
        }
        pages.push(levels);
    }

    // IFDs, children before their parent, parents chained in reverse so each
    // knows its successor's offset.
    let mut next_parent: u64 = 0;
    let mut first_parent: u64 = 0;
    for page_index in (0..stack.page_count()).rev() {
        let levels = &pages[page_index];
        let mut sub_ifds = Vec::new();
        for level in levels.iter().skip(1) {
            sub_ifds.push(write_level_ifd(
                &mut out,
                &mut position,
                level,
                options,
                IfdRole::Reduced,
            )?);
        }
        let description = if page_index == 0 {
            options.description.as_deref()
        } else {
            None
        };
        first_parent = write_level_ifd(
            &mut out,
            &mut position,
            &levels[0],
            options,
            IfdRole::Full {
                sub_ifds,
                description,
                next: next_parent,
            },
        )?;
        next_parent = first_parent;
    }

    out.seek(SeekFrom::Start(8))?;
    out.write_all(&first_parent.to_le_bytes())?;
    out.flush()?;
    debug!(path = %path.display(), pages = stack.page_count(), "pyramid written");
    Ok(())
}

struct LevelData {
    width: usize,
    height: usize,
    tile_offsets: Vec<u64>,
    tile_byte_counts: Vec<u64>,
}

enum IfdRole<'a> {
    Full {
        sub_ifds: Vec<u64>,
        description: Option<&'a str>,
        next: u64,
    },
    Reduced,
}

fn write_level_tiles(
    out: &mut impl Write,
    position: &mut u64,
    image: &Array2<u8>,
    options: &PyramidOptions,
) -> Result<LevelData> {
    let (height, width) = image.dim();
    let (n_x, n_y) = tile_grid(width, height, options.tile_width, options.tile_height)?;

    let mut tile_offsets = Vec::with_capacity(n_x * n_y);
    let mut tile_byte_counts = Vec::with_capacity(n_x * n_y);
    for ty in 0..n_y {
        for tx in 0..n_x {
            let raw = extract_padded_tile(image, tx, ty, options.tile_width, options.tile_height);
            let encoded = match options.compression {
                Compression::None => raw,
                Compression::Deflate => {
                    let mut encoder =
                        ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                    encoder.write_all(&raw)?;
                    encoder.finish()?
                }
            };
            tile_offsets.push(*position);
            tile_byte_counts.push(encoded.len() as u64);
            out.write_all(&encoded)?;
            *position += encoded.len() as u64;
            if *position % 2 == 1 {
                out.write_all(&[0])?;
                *position += 1;
            }
        }
    }

    Ok(LevelData {
        width,
        height,
        tile_offsets,
        tile_byte_counts,
    })
}

/// Tiles are always full nominal size; edge tiles are zero-padded.
fn extract_padded_tile(
    image: &Array2<u8>,
    tx: usize,
    ty: usize,
    tile_width: usize,
    tile_height: usize,
) -> Vec<u8> {
    let (height, width) = image.dim();
    let x0 = tile_origin(tx, tile_width);
    let y0 = tile_origin(ty, tile_height);
    let eff_w = effective_size(tx, tile_width, width);
    let eff_h = effective_size(ty, tile_height, height);

    let mut raw = vec![0u8; tile_width * tile_height];
    for row in 0..eff_h {
        for col in 0..eff_w {
            raw[row * tile_width + col] = image[[y0 + row, x0 + col]];
        }
    }
    raw
}

/// 2x box reduction with edge clamping for odd extents.
fn downsample_half(image: &Array2<u8>) -> Array2<u8> {
    let (height, width) = image.dim();
    let out_h = height.div_ceil(2);
    let out_w = width.div_ceil(2);
    let mut out = Array2::zeros((out_h, out_w));
    for row in 0..out_h {
        for col in 0..out_w {
            let mut sum = 0u32;
            let mut count = 0u32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let y = 2 * row + dy;
                    let x = 2 * col + dx;
                    if y < height && x < width {
                        sum += image[[y, x]] as u32;
                        count += 1;
                    }
                }
            }
            out[[row, col]] = (sum / count) as u8;
        }
    }
    out
}

struct BigEntry {
    tag: u16,
    field_type: u16,
    count: u64,
    payload: Vec<u8>,
}

fn big_long(tag: u16, value: u32) -> BigEntry {
    BigEntry {
        tag,
        field_type: field::LONG,
        count: 1,
        payload: value.to_le_bytes().to_vec(),
    }
}

fn big_short(tag: u16, value: u16) -> BigEntry {
    BigEntry {
        tag,
        field_type: field::SHORT,
        count: 1,
        payload: value.to_le_bytes().to_vec(),
    }
}

fn big_long8s(tag: u16, field_type: u16, values: &[u64]) -> BigEntry {
    BigEntry {
        tag,
        field_type,
        count: values.len() as u64,
        payload: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn write_level_ifd(
    out: &mut (impl Write + Seek),
    position: &mut u64,
    level: &LevelData,
    options: &PyramidOptions,
    role: IfdRole<'_>,
) -> Result<u64> {
    let ifd_offset = *position;

    let mut entries = Vec::new();
    let subfile_type = match role {
        IfdRole::Full { .. } => 0,
        IfdRole::Reduced => 1,
    };
    entries.push(big_long(tag::NEW_SUBFILE_TYPE, subfile_type));
    entries.push(big_long(tag::IMAGE_WIDTH, level.width as u32));
    entries.push(big_long(tag::IMAGE_LENGTH, level.height as u32));
    entries.push(big_short(tag::BITS_PER_SAMPLE, 8));
    entries.push(big_short(tag::COMPRESSION, options.compression.code()));
    entries.push(big_short(tag::PHOTOMETRIC, PHOTOMETRIC_MINISBLACK));
    if let IfdRole::Full {
        description: Some(text),
        ..
    } = &role
    {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        entries.push(BigEntry {
            tag: tag::IMAGE_DESCRIPTION,
            field_type: field::ASCII,
            count: payload.len() as u64,
            payload,
        });
    }
    entries.push(big_short(tag::SAMPLES_PER_PIXEL, 1));
    entries.push(big_long(tag::TILE_WIDTH, options.tile_width as u32));
    entries.push(big_long(tag::TILE_LENGTH, options.tile_height as u32));
    entries.push(big_long8s(tag::TILE_OFFSETS, field::LONG8, &level.tile_offsets));
    entries.push(big_long8s(
        tag::TILE_BYTE_COUNTS,
        field::LONG8,
        &level.tile_byte_counts,
    ));
    if let IfdRole::Full { sub_ifds, .. } = &role {
        if !sub_ifds.is_empty() {
            entries.push(big_long8s(tag::SUB_IFDS, field::IFD8, sub_ifds));
        }
    }
    entries.push(big_short(tag::SAMPLE_FORMAT, SAMPLE_FORMAT_UINT));

    let next = match &role {
        IfdRole::Full { next, .. } => *next,
        IfdRole::Reduced => 0,
    };

    // [count][20-byte entries][next][oversize payloads]
    let table_len = 8 + 20 * entries.len() as u64 + 8;
    let mut external_offset = ifd_offset + table_len;
    let mut externals: Vec<&[u8]> = Vec::new();

    out.write_all(&(entries.len() as u64).to_le_bytes())?;
    for entry in &entries {
        out.write_all(&entry.tag.to_le_bytes())?;
        out.write_all(&entry.field_type.to_le_bytes())?;
        out.write_all(&entry.count.to_le_bytes())?;
        if entry.payload.len() <= 8 {
            let mut value = [0u8; 8];
            value[..entry.payload.len()].copy_from_slice(&entry.payload);
            out.write_all(&value)?;
        } else {
            out.write_all(&external_offset.to_le_bytes())?;
            external_offset += entry.payload.len() as u64;
            externals.push(&entry.payload);
        }
    }
    out.write_all(&next.to_le_bytes())?;
    for payload in externals {
        out.write_all(payload)?;
    }
    if external_offset % 2 == 1 {
        out.write_all(&[0])?;
        external_offset += 1;
    }
    *position = external_offset;
    Ok(ifd_offset)
}
