//! Byte-level TIFF emission.
//!
//! The float32 statistic tiles are written as plain little-endian TIFF here;
//! the pyramidal BigTIFF writer in [`crate::io::pyramid`] shares the tag and
//! field-type vocabulary. Reading goes through the `tiff` crate decoder.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::Array3;

use crate::error::Result;

pub(crate) mod tag {
    pub const NEW_SUBFILE_TYPE: u16 = 254;
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const PHOTOMETRIC: u16 = 262;
    pub const IMAGE_DESCRIPTION: u16 = 270;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SUB_IFDS: u16 = 330;
    pub const SAMPLE_FORMAT: u16 = 339;
}

pub(crate) mod field {
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const LONG8: u16 = 16;
    pub const IFD8: u16 = 18;
}

pub(crate) const COMPRESSION_NONE: u16 = 1;
pub(crate) const COMPRESSION_DEFLATE: u16 = 8;

pub(crate) const PHOTOMETRIC_MINISBLACK: u16 = 1;
pub(crate) const PHOTOMETRIC_RGB: u16 = 2;

pub(crate) const SAMPLE_FORMAT_UINT: u16 = 1;
pub(crate) const SAMPLE_FORMAT_FLOAT: u16 = 3;

/// One classic (non-Big) IFD entry; `payload` holds the raw value bytes,
/// inlined into the 4-byte value field when they fit.
struct ClassicEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Vec<u8>,
}

#[derive(Default)]
struct ClassicIfd {
    entries: Vec<ClassicEntry>,
}

impl ClassicIfd {
    fn push_shorts(&mut self, tag: u16, values: &[u16]) {
        let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push(ClassicEntry {
            tag,
            field_type: field::SHORT,
            count: values.len() as u32,
            payload,
        });
    }

    fn push_long(&mut self, tag: u16, value: u32) {
        self.entries.push(ClassicEntry {
            tag,
            field_type: field::LONG,
            count: 1,
            payload: value.to_le_bytes().to_vec(),
        });
    }

    /// Serialize the table at `ifd_offset`, appending oversize payloads
    /// directly after it. Entries must already be in ascending tag order.
    fn write(&self, w: &mut impl Write, ifd_offset: u32) -> Result<()> {
        let table_len = 2 + 12 * self.entries.len() as u32 + 4;
        let mut external_offset = ifd_offset + table_len;
        let mut externals: Vec<&[u8]> = Vec::new();

        w.write_all(&(self.entries.len() as u16).to_le_bytes())?;
        for entry in &self.entries {
            w.write_all(&entry.tag.to_le_bytes())?;
            w.write_all(&entry.field_type.to_le_bytes())?;
            w.write_all(&entry.count.to_le_bytes())?;
            if entry.payload.len() <= 4 {
                let mut value = [0u8; 4];
                value[..entry.payload.len()].copy_from_slice(&entry.payload);
                w.write_all(&value)?;
            } else {
                w.write_all(&external_offset.to_le_bytes())?;
                external_offset += entry.payload.len() as u32;
                externals.push(&entry.payload);
            }
        }
        w.write_all(&0u32.to_le_bytes())?; // no next IFD
        for payload in externals {
            w.write_all(payload)?;
        }
        Ok(())
    }
}

/// Write an interleaved float32 image as a single-strip classic TIFF.
/// Used for the statistic tiles, whose values exceed the 8-bit range.
pub fn write_f32_tiff(path: &Path, data: &Array3<f32>) -> Result<()> {
    let (height, width, channels) = data.dim();
    let data_len = (height * width * channels * 4) as u32;
    let ifd_offset = 8 + data_len;

    let mut ifd = ClassicIfd::default();
    ifd.push_long(tag::IMAGE_WIDTH, width as u32);
    ifd.push_long(tag::IMAGE_LENGTH, height as u32);
    ifd.push_shorts(tag::BITS_PER_SAMPLE, &vec![32u16; channels]);
    ifd.push_shorts(tag::COMPRESSION, &[COMPRESSION_NONE]);
    let photometric = if channels >= 3 {
        PHOTOMETRIC_RGB
    } else {
        PHOTOMETRIC_MINISBLACK
    };
    ifd.push_shorts(tag::PHOTOMETRIC, &[photometric]);
    ifd.push_long(tag::STRIP_OFFSETS, 8);
    ifd.push_shorts(tag::SAMPLES_PER_PIXEL, &[channels as u16]);
    ifd.push_long(tag::ROWS_PER_STRIP, height as u32);
    ifd.push_long(tag::STRIP_BYTE_COUNTS, data_len);
    ifd.push_shorts(tag::PLANAR_CONFIG, &[1]);
    ifd.push_shorts(tag::SAMPLE_FORMAT, &vec![SAMPLE_FORMAT_FLOAT; channels]);

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(b"II")?;
    out.write_all(&42u16.to_le_bytes())?;
    out.write_all(&ifd_offset.to_le_bytes())?;
    for value in data.iter() {
        out.write_all(&value.to_le_bytes())?;
    }
    ifd.write(&mut out, ifd_offset)?;
    out.flush()?;
    Ok(())
}
