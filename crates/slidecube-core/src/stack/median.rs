use ndarray::{Array3, Array4};

/// Per-pixel median across the layer axis.
///
/// Uses `select_nth_unstable` for O(n) selection without a full sort.
pub fn median_layers(stack: &Array4<f32>) -> Array3<f32> {
    let (height, width, channels, layers) = stack.dim();
    let mut out = Array3::zeros((height, width, channels));
    let mut values = vec![0.0f32; layers];
    for row in 0..height {
        for col in 0..width {
            for chan in 0..channels {
                for layer in 0..layers {
                    values[layer] = stack[[row, col, chan, layer]];
                }
                out[[row, col, chan]] = compute_median(&mut values, layers);
            }
        }
    }
    out
}

fn compute_median(values: &mut [f32], n: usize) -> f32 {
    if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values
            .select_nth_unstable_by(mid, |a, b| a.total_cmp(b))
            .1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}
