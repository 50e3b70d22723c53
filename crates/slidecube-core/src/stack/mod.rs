pub mod extrema;
pub mod median;
pub mod moments;

use ndarray::Array4;

use crate::error::{Result, SlidecubeError};
use crate::tile::Tile;

use extrema::{index_layers, select_layers, Extreme};
use median::median_layers;
use moments::{mean_layers, std_layers};

/// Per-pixel reduction applied across the layer axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Statistic {
    Mean,
    Median,
    Std,
    Max,
    Min,
    MaxIndex,
    MinIndex,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Self::Mean,
        Self::Median,
        Self::Std,
        Self::Max,
        Self::Min,
        Self::MaxIndex,
        Self::MinIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Std => "std",
            Self::Max => "max",
            Self::Min => "min",
            Self::MaxIndex => "maxIndex",
            Self::MinIndex => "minIndex",
        }
    }

    /// Whether montages of this statistic need percentile contrast rescaling
    /// (value range not safe to narrow to uint8 directly).
    pub fn needs_rescale(&self) -> bool {
        matches!(self, Self::Std | Self::MaxIndex | Self::MinIndex)
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Statistic {
    type Err = SlidecubeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "std" => Ok(Self::Std),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "maxIndex" => Ok(Self::MaxIndex),
            "minIndex" => Ok(Self::MinIndex),
            other => Err(SlidecubeError::UnknownStatistic(other.to_string())),
        }
    }
}

/// Aligned tiles from several layers, gathered for one grid position.
///
/// Shape = (height, width, channel, layer). Built by one worker, reduced,
/// dropped; never shared.
#[derive(Clone, Debug)]
pub struct LayerStack {
    pub data: Array4<f32>,
}

impl LayerStack {
    pub fn zeros(height: usize, width: usize, channels: usize, layers: usize) -> Self {
        Self {
            data: Array4::zeros((height, width, channels, layers)),
        }
    }

    pub fn layers(&self) -> usize {
        self.data.dim().3
    }

    /// Copy one aligned tile into layer `layer`.
    pub fn set_layer(&mut self, layer: usize, tile: &Tile) -> Result<()> {
        let (height, width, channels, _) = self.data.dim();
        if tile.data.dim() != (height, width, channels) {
            return Err(SlidecubeError::Pipeline(format!(
                "layer {layer} tile shape {:?} does not match stack {:?}",
                tile.data.dim(),
                (height, width, channels)
            )));
        }
        for ((row, col, chan), value) in tile.data.indexed_iter() {
            self.data[[row, col, chan, layer]] = *value;
        }
        Ok(())
    }
}

/// Reduce the stack across its layer axis.
///
/// mean/median/std keep the channel count and return float values; max/min
/// return the original colour pixel of the winning layer; maxIndex/minIndex
/// return the winning layer index replicated across channels.
pub fn reduce(stack: &LayerStack, statistic: Statistic) -> Result<Tile> {
    if stack.layers() == 0 {
        return Err(SlidecubeError::EmptyStack);
    }
    let data = match statistic {
        Statistic::Mean => mean_layers(&stack.data),
        Statistic::Median => median_layers(&stack.data),
        Statistic::Std => std_layers(&stack.data),
        Statistic::Max => select_layers(&stack.data, Extreme::Max),
        Statistic::Min => select_layers(&stack.data, Extreme::Min),
        Statistic::MaxIndex => index_layers(&stack.data, Extreme::Max),
        Statistic::MinIndex => index_layers(&stack.data, Extreme::Min),
    };
    Ok(Tile::new(data))
}
