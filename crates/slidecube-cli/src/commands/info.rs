use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use slidecube_core::consts::DEFAULT_WORKER_MEMORY_BYTES;
use slidecube_core::inventory::{build_inventory, write_inventory_csv};
use slidecube_core::pipeline::RunLayout;
use slidecube_core::source::tiff::TiffSlideProvider;

#[derive(Args)]
pub struct InfoArgs {
    /// Source container
    pub source: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let provider = TiffSlideProvider::new(&args.source, DEFAULT_WORKER_MEMORY_BYTES);
    let inventory = build_inventory(&provider)?;

    let layout = RunLayout::for_source(&args.source);
    std::fs::create_dir_all(layout.root())?;
    write_inventory_csv(&layout.inventory_csv(), &inventory)?;

    println!(
        "{:<7} {:<32} {:>10} {:>10} {:>5} {:>5} {:>5} {:>8} {:>12}",
        "series", "name", "sizeX", "sizeY", "C", "Z", "T", "type", "acquisition"
    );
    for row in &inventory {
        println!(
            "{:<7} {:<32} {:>10} {:>10} {:>5} {:>5} {:>5} {:>8} {:>12}",
            row.series,
            row.name,
            row.size_x,
            row.size_y,
            row.size_c,
            row.size_z,
            row.size_t,
            row.pixel_type.as_str(),
            row.acquisition,
        );
    }
    println!("Inventory saved to {}", layout.inventory_csv().display());
    Ok(())
}
