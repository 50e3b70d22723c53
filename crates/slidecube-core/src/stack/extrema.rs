use ndarray::{Array2, Array3, Array4};

#[derive(Clone, Copy, Debug)]
pub enum Extreme {
    Max,
    Min,
}

/// Winning layer per pixel: each layer is collapsed to a channel-mean
/// greyscale value, then arg-max/arg-min is taken across layers. Ties go to
/// the first layer.
fn winning_layer(stack: &Array4<f32>, extreme: Extreme) -> Array2<usize> {
    let (height, width, channels, layers) = stack.dim();
    let mut winners = Array2::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            let mut best_layer = 0usize;
            let mut best_value = f32::NAN;
            for layer in 0..layers {
                let mut sum = 0.0f32;
                for chan in 0..channels {
                    sum += stack[[row, col, chan, layer]];
                }
                let grey = sum / channels as f32;
                let better = match extreme {
                    Extreme::Max => grey > best_value,
                    Extreme::Min => grey < best_value,
                };
                if layer == 0 || better {
                    best_layer = layer;
                    best_value = grey;
                }
            }
            winners[[row, col]] = best_layer;
        }
    }
    winners
}

/// max/min: gather the original colour pixel of the winning layer.
pub fn select_layers(stack: &Array4<f32>, extreme: Extreme) -> Array3<f32> {
    let (height, width, channels, _) = stack.dim();
    let winners = winning_layer(stack, extreme);
    let mut out = Array3::zeros((height, width, channels));
    for row in 0..height {
        for col in 0..width {
            let layer = winners[[row, col]];
            for chan in 0..channels {
                out[[row, col, chan]] = stack[[row, col, chan, layer]];
            }
        }
    }
    out
}

/// maxIndex/minIndex: the winning layer index replicated across channels,
/// a false-colour index map.
pub fn index_layers(stack: &Array4<f32>, extreme: Extreme) -> Array3<f32> {
    let (height, width, channels, _) = stack.dim();
    let winners = winning_layer(stack, extreme);
    let mut out = Array3::zeros((height, width, channels));
    for row in 0..height {
        for col in 0..width {
            let index = winners[[row, col]] as f32;
            for chan in 0..channels {
                out[[row, col, chan]] = index;
            }
        }
    }
    out
}
