use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlidecubeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source reader error: {0}")]
    Source(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error(
        "acquisition group {group} has {available} pyramid level(s), \
         level {requested} was requested: select a lower pyramid level"
    )]
    LevelUnavailable {
        group: u32,
        requested: usize,
        available: usize,
    },

    #[error("unknown statistic: {0}")]
    UnknownStatistic(String),

    #[error("modality layers missing from the initial export: {0}")]
    MissingLayers(String),

    #[error("duplicate tile key: series {series}, z {z}, x {x}, y {y}")]
    DuplicateTile {
        series: usize,
        z: usize,
        x: usize,
        y: usize,
    },

    #[error("tile x{x} y{y} absent for series {series}, z {z}")]
    MissingTile {
        series: usize,
        z: usize,
        x: usize,
        y: usize,
    },

    #[error("unsupported channel count: {0}")]
    ChannelCount(usize),

    #[error("empty layer stack")]
    EmptyStack,

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, SlidecubeError>;
