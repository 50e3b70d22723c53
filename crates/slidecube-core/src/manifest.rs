use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlidecubeError};

/// The experiment manifest: single source of truth linking export,
/// compositing and assembly. Written once by the exporter.
///
/// Field names are part of the on-disk contract (`experimental_metadata.json`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentManifest {
    pub image_path: String,
    #[serde(rename = "tileSizeX")]
    pub tile_size_x: usize,
    #[serde(rename = "tileSizeY")]
    pub tile_size_y: usize,
    pub dimension_order: String,
    pub sel_level: usize,
    pub pixel_size_sel: f64,
    pub layer_names: Vec<String>,
    pub series_span: Vec<usize>,
}

impl ExperimentManifest {
    /// `layer_names` and `series_span` are parallel ordered sequences.
    pub fn validate(&self) -> Result<()> {
        if self.layer_names.len() != self.series_span.len() {
            return Err(SlidecubeError::Manifest(format!(
                "layer_names ({}) and series_span ({}) differ in length",
                self.layer_names.len(),
                self.series_span.len()
            )));
        }
        Ok(())
    }

    /// (layer name, exported series) pairs in manifest order.
    pub fn layers(&self) -> impl Iterator<Item = (&str, usize)> {
        self.layer_names
            .iter()
            .map(|n| n.as_str())
            .zip(self.series_span.iter().copied())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let manifest: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        manifest.validate()?;
        Ok(manifest)
    }
}
