pub mod composite;
pub mod export;
pub mod info;
pub mod montage;
pub mod run;
pub mod zstack;

use clap::ValueEnum;
use slidecube_core::io::pyramid::Compression;

#[derive(Clone, Copy, ValueEnum)]
pub enum CompressionArg {
    Deflate,
    None,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Deflate => Compression::Deflate,
            CompressionArg::None => Compression::None,
        }
    }
}

/// Default worker count: half the available cores.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(1))
        .unwrap_or(1)
}
