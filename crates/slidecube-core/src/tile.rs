use std::path::PathBuf;

use ndarray::Array3;

use crate::error::{Result, SlidecubeError};

/// A single image tile.
/// Pixel data is f32 in the source's native units, shape = (height, width, channel).
#[derive(Clone, Debug)]
pub struct Tile {
    pub data: Array3<f32>,
}

impl Tile {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(height: usize, width: usize, channels: usize) -> Self {
        Self {
            data: Array3::zeros((height, width, channels)),
        }
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }
}

/// Spatial/temporal coordinate of one extracted tile.
///
/// The `Ord` derive gives the canonical (series, z, x, y) ascending order
/// used by every downstream consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    pub series: usize,
    pub z: usize,
    pub x: usize,
    pub y: usize,
}

/// One extracted tile on disk. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileRecord {
    pub key: TileKey,
    pub width: usize,
    pub height: usize,
    pub path: PathBuf,
}

/// Pixel storage type of a source series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float,
    Double,
}

impl PixelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PixelType {
    type Err = SlidecubeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uint8" => Ok(Self::UInt8),
            "int8" => Ok(Self::Int8),
            "uint16" => Ok(Self::UInt16),
            "int16" => Ok(Self::Int16),
            "uint32" => Ok(Self::UInt32),
            "int32" => Ok(Self::Int32),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            other => Err(SlidecubeError::Source(format!(
                "unknown pixel type: {other}"
            ))),
        }
    }
}
