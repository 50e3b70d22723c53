use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use slidecube_core::consts::DEFAULT_TILE_SIZE;
use slidecube_core::pipeline::zstack::{assemble_zstack, ZStackOptions};

use super::CompressionArg;

#[derive(Args)]
pub struct ZstackArgs {
    /// Input images, stacked in argument order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Physical pixel size of the planes
    #[arg(long, default_value = "1.0")]
    pub pixel_size: f64,

    /// Nominal tile edge in pixels
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_size: usize,

    /// Output path
    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value = "deflate")]
    pub compression: CompressionArg,
}

pub fn run(args: &ZstackArgs) -> Result<()> {
    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let inputs: Vec<&std::path::Path> = args.inputs.iter().map(|p| p.as_path()).collect();
    assemble_zstack(
        &inputs,
        &args.output,
        &ZStackOptions {
            pixel_size: args.pixel_size,
            tile_size: args.tile_size,
            compression: args.compression.into(),
        },
    )?;
    println!("Wrote {}", args.output.display());
    Ok(())
}
