use ndarray::{Array3, Array4};

/// Per-pixel mean across the layer axis.
pub fn mean_layers(stack: &Array4<f32>) -> Array3<f32> {
    let (height, width, channels, layers) = stack.dim();
    let n = layers as f32;
    let mut out = Array3::zeros((height, width, channels));
    for row in 0..height {
        for col in 0..width {
            for chan in 0..channels {
                let mut sum = 0.0f32;
                for layer in 0..layers {
                    sum += stack[[row, col, chan, layer]];
                }
                out[[row, col, chan]] = sum / n;
            }
        }
    }
    out
}

/// Per-pixel population standard deviation across the layer axis.
pub fn std_layers(stack: &Array4<f32>) -> Array3<f32> {
    let (height, width, channels, layers) = stack.dim();
    let n = layers as f32;
    let mut out = Array3::zeros((height, width, channels));
    for row in 0..height {
        for col in 0..width {
            for chan in 0..channels {
                let mut sum = 0.0f32;
                for layer in 0..layers {
                    sum += stack[[row, col, chan, layer]];
                }
                let mean = sum / n;
                let mut var_sum = 0.0f32;
                for layer in 0..layers {
                    let d = stack[[row, col, chan, layer]] - mean;
                    var_sum += d * d;
                }
                out[[row, col, chan]] = (var_sum / n).sqrt();
            }
        }
    }
    out
}
