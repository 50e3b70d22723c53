use std::path::{Path, PathBuf};

use crate::stack::Statistic;

/// Path conventions of one processing run. Every on-disk name used by the
/// pipeline is built here and nowhere else.
///
/// For a source `<dir>/<name>.<ext>` the run root is
/// `<dir>/processed_<name>/`.
#[derive(Clone, Debug)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn for_source(image_path: &Path) -> Self {
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());
        let dir = image_path.parent().unwrap_or_else(|| Path::new("."));
        Self {
            root: dir.join(format!("processed_{stem}")),
        }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inventory_csv(&self) -> PathBuf {
        self.root.join("pyramid_sizes.csv")
    }

    pub fn manifest_json(&self) -> PathBuf {
        self.root.join("experimental_metadata.json")
    }

    pub fn index_csv(&self) -> PathBuf {
        self.root.join("files1.csv")
    }

    pub fn composite_csv(&self) -> PathBuf {
        self.root.join("files2.csv")
    }

    pub fn tiles_root(&self) -> PathBuf {
        self.root.join("bf_tiles")
    }

    pub fn series_dir(&self, series: usize, z: usize) -> PathBuf {
        self.tiles_root().join(format!("series{series}_z{z}"))
    }

    pub fn tile_path(&self, series: usize, z: usize, x: usize, y: usize) -> PathBuf {
        self.series_dir(series, z)
            .join(format!("tile_x{x:03}_y{y:03}.tif"))
    }

    pub fn composite_dir(&self, modality: &str) -> PathBuf {
        self.root.join(format!("rt_{modality}"))
    }

    pub fn composite_tile_path(
        &self,
        modality: &str,
        statistic: Statistic,
        z: usize,
        x: usize,
        y: usize,
    ) -> PathBuf {
        self.composite_dir(modality)
            .join(format!("tile_x{x:03}_y{y:03}_z{z:03}_{statistic}.tif"))
    }

    pub fn montages_original_dir(&self) -> PathBuf {
        self.root.join("montages_original")
    }

    pub fn montages_composite_dir(&self) -> PathBuf {
        self.root.join("montages_rt")
    }

    pub fn layer_montage_path(&self, layer_name: &str, z: usize) -> PathBuf {
        self.montages_original_dir()
            .join(format!("{layer_name}_z{z}.tif"))
    }

    pub fn composite_montage_path(
        &self,
        modality: &str,
        statistic: Statistic,
        z: usize,
    ) -> PathBuf {
        self.montages_composite_dir()
            .join(format!("{modality}_{statistic}_z{z}.tif"))
    }
}
