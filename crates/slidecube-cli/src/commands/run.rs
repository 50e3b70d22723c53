use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use slidecube_core::consts::{COLOR_CHANNEL_COUNT, DEFAULT_TILE_SIZE};
use slidecube_core::index::TileIndex;
use slidecube_core::inventory::{build_inventory, write_inventory_csv};
use slidecube_core::pipeline::composite::{run_composite, CompositeConfig};
use slidecube_core::pipeline::export::{run_export, ExportConfig};
use slidecube_core::pipeline::montage::{
    montage_composites, montage_layers, MontageOptions,
};
use slidecube_core::pipeline::RunLayout;
use slidecube_core::source::tiff::TiffSlideProvider;

use crate::progress::BarReporter;
use crate::summary::print_run_summary;

use super::composite::parse_statistics;
use super::export::{modality_filter, ModalityArg};
use super::default_workers;

#[derive(Args)]
pub struct RunArgs {
    /// Source container
    pub source: PathBuf,

    /// Run config file (TOML); overrides the other options
    #[arg(long)]
    pub config: Option<PathBuf>,

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

    /// Composite aligned layers after the export
    #[arg(long)]
    pub ray_tracing: bool,

    /// Layer groups to composite
    #[arg(long, value_delimiter = ',', default_values = ["ppl", "xpl"])]
    pub trace_modalities: Vec<String>,

    /// Statistics to compute
    #[arg(long, value_delimiter = ',', default_values = ["max", "maxIndex"])]
    pub statistics: Vec<String>,

    /// Percentile cut for contrast rescaling (0-50)
    #[arg(long, default_value = "1.0")]
    pub percent: f32,
}

/// TOML shape of `--config`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub level: usize,
    pub tile_size: usize,
    pub workers: Option<usize>,
    pub memory_mb: usize,
    #[serde(default)]
    pub modalities: Vec<String>,
    #[serde(default)]
    pub ray_tracing: bool,
    #[serde(default)]
    pub trace_modalities: Vec<String>,
    #[serde(default)]
    pub statistics: Vec<String>,
    #[serde(default = "default_percent")]
    pub percent: f32,
}

fn default_percent() -> f32 {
    1.0
}

fn config_from_args(args: &RunArgs) -> RunConfig {
    RunConfig {
        level: args.level,
        tile_size: args.tile_size,
        workers: args.workers,
        memory_mb: args.memory_mb,
        modalities: args
            .modalities
            .iter()
            .map(|m| {
                match m {
                    ModalityArg::All => "all",
                    ModalityArg::Ppl => "ppl",
                    ModalityArg::Xpl => "xpl",
                    ModalityArg::Reflected => "reflected",
                }
                .to_string()
            })
            .collect(),
        ray_tracing: args.ray_tracing,
        trace_modalities: args.trace_modalities.clone(),
        statistics: args.statistics.clone(),
        percent: args.percent,
    }
}

fn parse_modalities(names: &[String]) -> Result<Vec<ModalityArg>> {
    names
        .iter()
        .map(|name| match name.as_str() {
            "all" => Ok(ModalityArg::All),
            "ppl" => Ok(ModalityArg::Ppl),
            "xpl" => Ok(ModalityArg::Xpl),
            "reflected" => Ok(ModalityArg::Reflected),
            other => Err(anyhow::anyhow!("unknown modality: {other}")),
        })
        .collect()
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading config {}", config_path.display()))?;
        toml::from_str(&contents).context("invalid run config")?
    } else {
        config_from_args(args)
    };
    let statistics = parse_statistics(&config.statistics)?;
    let export_filter = modality_filter(&parse_modalities(&config.modalities)?);
    let workers = config.workers.unwrap_or_else(default_workers);

    print_run_summary(&args.source, &config, workers);

    let layout = RunLayout::for_source(&args.source);
    std::fs::create_dir_all(layout.root())?;
    let reporter = BarReporter::new();

    // Metadata pass: one reader handle, the whole inventory or nothing.
    let probe = TiffSlideProvider::new(&args.source, config.memory_mb * 1024 * 1024);
    let inventory = build_inventory(&probe)?;
    write_inventory_csv(&layout.inventory_csv(), &inventory)?;

    let per_worker = (config.memory_mb * 1024 * 1024) / workers.max(1);
    let provider = TiffSlideProvider::new(&args.source, per_worker);
    let export_config = ExportConfig {
        level: config.level,
        tile_size: config.tile_size,
        channels: COLOR_CHANNEL_COUNT,
        workers,
        modalities: export_filter,
    };
    let report = run_export(
        &provider,
        &inventory,
        &args.source,
        &layout,
        &export_config,
        &reporter,
    )?;
    for (series, message) in &report.failures {
        eprintln!("series {series} failed: {message}");
    }

    let manifest = slidecube_core::manifest::ExperimentManifest::load(&layout.manifest_json())?;
    let index = TileIndex::scan(&layout.tiles_root())?;
    index.write_csv(&layout.index_csv())?;

    let options = MontageOptions {
        compression: slidecube_core::io::pyramid::Compression::Deflate,
        percent_out: config.percent,
    };
    let layer_montages = montage_layers(&layout, &manifest, &index, &options, &reporter)?;
    println!("Assembled {} layer montage(s)", layer_montages.len());

    if config.ray_tracing {
        let composite_config = CompositeConfig {
            modalities: config.trace_modalities.clone(),
            statistics,
            workers,
        };
        let table = run_composite(&layout, &manifest, &index, &composite_config, &reporter)?;
        let composite_montages =
            montage_composites(&layout, &manifest, &table, &[], &options, &reporter)?;
        println!("Assembled {} composite montage(s)", composite_montages.len());
    }

    println!("Run complete: {}", layout.root().display());
    Ok(())
}
