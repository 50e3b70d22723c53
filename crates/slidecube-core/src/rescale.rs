//! Percentile contrast rescaling for statistics whose value range is not
//! uint8-safe (std, minIndex, maxIndex).

use ndarray::{Array2, Array3, ArrayView2};

use crate::consts::{RESCALE_BIT_PRECISION, RESCALE_TARGET_WIDTH};

/// Clamp-and-cast narrowing for channels already in the 8-bit range.
pub fn narrow_u8(image: &Array3<f32>) -> Array3<u8> {
    image.mapv(|v| v.clamp(0.0, 255.0) as u8)
}

/// Rescale every channel independently so its percentile thresholds span
/// [0, 255].
///
/// Thresholds are estimated on a nearest-neighbour thumbnail (~5000 px wide)
/// quantised into the 16-bit domain, then applied to the full-resolution
/// channel. `percent_out` is the cut in percent from each end (0-50).
pub fn rescale_percentile(image: &Array3<f32>, percent_out: f32) -> Array3<u8> {
    let percent_out = percent_out.clamp(0.0, 50.0);
    let (height, width, channels) = image.dim();
    let mut out = Array3::zeros((height, width, channels));

    for chan in 0..channels {
        let channel = image.slice(ndarray::s![.., .., chan]);
        let thumbnail = thumbnail_nearest(&channel, RESCALE_TARGET_WIDTH);

        // Shift by the thumbnail minimum so quantisation starts at zero.
        let thumb_min = thumbnail.iter().copied().fold(f32::INFINITY, f32::min);
        let shifted = thumbnail.mapv(|v| v - thumb_min);
        let (low, high) =
            percentile_thresholds(&shifted, percent_out, RESCALE_BIT_PRECISION);

        let span = high - low;
        for row in 0..height {
            for col in 0..width {
                let positive = channel[[row, col]] - thumb_min;
                let scaled = if span > 0.0 {
                    (positive - low) * (255.0 / span)
                } else {
                    positive - low
                };
                out[[row, col, chan]] = scaled.clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Nearest-neighbour reduction to `target_width` columns (no-op when the
/// channel is already narrower).
fn thumbnail_nearest(channel: &ArrayView2<'_, f32>, target_width: usize) -> Array2<f32> {
    let (height, width) = channel.dim();
    if width <= target_width {
        return channel.to_owned();
    }
    let ratio = target_width as f64 / width as f64;
    let out_h = ((height as f64 * ratio).round() as usize).max(1);
    let out_w = target_width;
    let mut out = Array2::zeros((out_h, out_w));
    for row in 0..out_h {
        for col in 0..out_w {
            let src_row = ((row as f64 / ratio) as usize).min(height - 1);
            let src_col = ((col as f64 / ratio) as usize).min(width - 1);
            out[[row, col]] = channel[[src_row, src_col]];
        }
    }
    out
}

/// Percentile thresholds of one channel, in the channel's own units.
///
/// The channel is quantised into `bit_precision` levels between its min and
/// max, a histogram percentile is taken at `percent` and `100 - percent`,
/// and the quantised thresholds are mapped back.
pub fn percentile_thresholds(
    channel: &Array2<f32>,
    percent: f32,
    bit_precision: u32,
) -> (f32, f32) {
    let depth = (1u64 << bit_precision) - 1;
    let min_val = channel.iter().copied().fold(f32::INFINITY, f32::min);
    let max_val = channel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let ratio = (max_val - min_val) / depth as f32;
    if !(ratio > 0.0) {
        return (min_val, max_val);
    }

    let mut histogram = vec![0u64; depth as usize + 1];
    for &value in channel.iter() {
        let bin = (((value - min_val) / ratio) as usize).min(depth as usize);
        histogram[bin] += 1;
    }

    let total = channel.len() as u64;
    let low_bin = histogram_percentile(&histogram, total, percent);
    let high_bin = histogram_percentile(&histogram, total, 100.0 - percent);

    (
        low_bin as f32 * ratio + min_val,
        high_bin as f32 * ratio + min_val,
    )
}

/// Smallest bin whose cumulative count reaches `percent` of `total`.
fn histogram_percentile(histogram: &[u64], total: u64, percent: f32) -> usize {
    let target = (total as f64 * percent as f64 / 100.0).ceil() as u64;
    let mut cumulative = 0u64;
    for (bin, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return bin;
        }
    }
    histogram.len() - 1
}
