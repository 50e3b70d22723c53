use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use slidecube_core::index::TileIndex;
use slidecube_core::manifest::ExperimentManifest;
use slidecube_core::pipeline::composite::{run_composite, CompositeConfig};
use slidecube_core::pipeline::RunLayout;
use slidecube_core::stack::Statistic;

use crate::progress::BarReporter;

use super::default_workers;

#[derive(Args)]
pub struct CompositeArgs {
    /// Working directory of a previous export (processed_<name>)
    pub dir: PathBuf,

    /// Layer groups to composite, matched against exported layer names
    #[arg(long, value_delimiter = ',', default_values = ["ppl", "xpl"])]
    pub modalities: Vec<String>,

    /// Statistics to compute
    #[arg(long, value_delimiter = ',', default_values = ["max", "maxIndex"])]
    pub statistics: Vec<String>,

    /// Worker count (default: half the available cores)
    #[arg(long)]
    pub workers: Option<usize>,
}

pub fn parse_statistics(names: &[String]) -> Result<Vec<Statistic>> {
    names
        .iter()
        .map(|name| name.parse::<Statistic>().map_err(Into::into))
        .collect()
}

pub fn run(args: &CompositeArgs) -> Result<()> {
    let statistics = parse_statistics(&args.statistics)?;

    let layout = RunLayout::at(&args.dir);
    let manifest = ExperimentManifest::load(&layout.manifest_json())
        .with_context(|| format!("loading {}", layout.manifest_json().display()))?;

    let index = TileIndex::scan(&layout.tiles_root())?;
    index.write_csv(&layout.index_csv())?;

    let config = CompositeConfig {
        modalities: args.modalities.clone(),
        statistics,
        workers: args.workers.unwrap_or_else(default_workers),
    };

    let reporter = BarReporter::new();
    let table = run_composite(&layout, &manifest, &index, &config, &reporter)?;
    println!(
        "Composited {} tiles; results in {}",
        table.records().len(),
        layout.composite_csv().display()
    );
    Ok(())
}
