use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use slidecube_core::index::TileIndex;
use slidecube_core::manifest::ExperimentManifest;
use slidecube_core::pipeline::composite::CompositeTable;
use slidecube_core::pipeline::montage::{montage_composites, montage_layers, MontageOptions};
use slidecube_core::pipeline::RunLayout;

use crate::progress::BarReporter;

use super::composite::parse_statistics;
use super::CompressionArg;

#[derive(Clone, Copy, ValueEnum)]
pub enum MontageKind {
    /// Reassemble the raw exported layers
    Original,
    /// Reassemble compositor outputs
    Composite,
}

#[derive(Args)]
pub struct MontageArgs {
    /// Working directory of a previous export (processed_<name>)
    pub dir: PathBuf,

    #[arg(long, value_enum, default_value = "original")]
    pub kind: MontageKind,

    /// Statistics to assemble (composite kind; empty = everything computed)
    #[arg(long, value_delimiter = ',')]
    pub statistics: Vec<String>,

    /// Percentile cut for contrast rescaling (0-50)
    #[arg(long, default_value = "1.0")]
    pub percent: f32,

    #[arg(long, value_enum, default_value = "deflate")]
    pub compression: CompressionArg,
}

pub fn run(args: &MontageArgs) -> Result<()> {
    let layout = RunLayout::at(&args.dir);
    let manifest = ExperimentManifest::load(&layout.manifest_json())
        .with_context(|| format!("loading {}", layout.manifest_json().display()))?;

    let options = MontageOptions {
        compression: args.compression.into(),
        percent_out: args.percent,
    };
    let reporter = BarReporter::new();

    let outputs = match args.kind {
        MontageKind::Original => {
            let index = TileIndex::scan(&layout.tiles_root())?;
            index.write_csv(&layout.index_csv())?;
            montage_layers(&layout, &manifest, &index, &options, &reporter)?
        }
        MontageKind::Composite => {
            let statistics = parse_statistics(&args.statistics)?;
            let table = CompositeTable::read_csv(&layout.composite_csv())
                .with_context(|| format!("loading {}", layout.composite_csv().display()))?;
            montage_composites(&layout, &manifest, &table, &statistics, &options, &reporter)?
        }
    };

    for path in &outputs {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
