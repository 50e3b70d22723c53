use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use slidecube_core::consts::{COLOR_CHANNEL_COUNT, DEFAULT_TILE_SIZE};
use slidecube_core::inventory::{build_inventory, read_inventory_csv, write_inventory_csv};
use slidecube_core::pipeline::export::{run_export, ExportConfig, ModalityFilter};
use slidecube_core::pipeline::RunLayout;
use slidecube_core::source::tiff::TiffSlideProvider;

use crate::progress::BarReporter;

use super::default_workers;

#[derive(Clone, Copy, ValueEnum)]
pub enum ModalityArg {
    All,
    Ppl,
    Xpl,
    Reflected,
}

pub fn modality_filter(choices: &[ModalityArg]) -> ModalityFilter {
    let mut filter = ModalityFilter::default();
    for choice in choices {
        match choice {
            ModalityArg::All => filter.all = true,
            ModalityArg::Ppl => filter.ppl = true,
            ModalityArg::Xpl => filter.xpl = true,
            ModalityArg::Reflected => filter.reflected = true,
        }
    }
    filter
}

#[derive(Args)]
pub struct ExportArgs {
    /// Source container
    pub source: PathBuf,

    /// Pyramid level (offset within each acquisition group)
    #[arg(long, default_value = "0")]
    pub level: usize,

    /// Nominal tile edge in pixels
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_size: usize,

    /// Worker count (default: half the available cores)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Total decode memory budget in MiB, divided across workers
    #[arg(long, default_value = "4096")]
    pub memory_mb: usize,

    /// Modalities to export
    #[arg(long, value_enum, value_delimiter = ',', default_value = "all")]
    pub modalities: Vec<ModalityArg>,
}

pub fn run(args: &ExportArgs) -> Result<()> {
    let layout = RunLayout::for_source(&args.source);
    std::fs::create_dir_all(layout.root())?;

    let inventory_csv = layout.inventory_csv();
    let provider_probe =
        TiffSlideProvider::new(&args.source, args.memory_mb * 1024 * 1024);
    let inventory = if inventory_csv.exists() {
        read_inventory_csv(&inventory_csv)
            .with_context(|| format!("reading {}", inventory_csv.display()))?
    } else {
        let inventory = build_inventory(&provider_probe)?;
        write_inventory_csv(&inventory_csv, &inventory)?;
        inventory
    };

    let workers = args.workers.unwrap_or_else(default_workers);
    let per_worker = (args.memory_mb * 1024 * 1024) / workers.max(1);
    let provider = TiffSlideProvider::new(&args.source, per_worker);

    let config = ExportConfig {
        level: args.level,
        tile_size: args.tile_size,
        channels: COLOR_CHANNEL_COUNT,
        workers,
        modalities: modality_filter(&args.modalities),
    };

    let reporter = BarReporter::new();
    let report = run_export(
        &provider,
        &inventory,
        &args.source,
        &layout,
        &config,
        &reporter,
    )?;

    println!(
        "Exported {} tiles across {} layer(s)",
        report.tiles_written,
        report.selected.len()
    );
    for (series, message) in &report.failures {
        eprintln!("series {series} failed: {message}");
    }
    Ok(())
}
