use approx::assert_relative_eq;
use ndarray::Array4;

use slidecube_core::stack::{reduce, LayerStack, Statistic};

/// 2x2x3x3 stack (height, width, channel, layer) with hand-picked values:
/// per pixel the grey (channel-mean) winners are known, including a tie.
fn known_stack() -> LayerStack {
    let mut data = Array4::zeros((2, 2, 3, 3));
    let set = |data: &mut Array4<f32>, row, col, layer, rgb: [f32; 3]| {
        for (chan, value) in rgb.into_iter().enumerate() {
            data[[row, col, chan, layer]] = value;
        }
    };
    // (0,0): greys 20, 50, 0 -> max layer 1, min layer 2
    set(&mut data, 0, 0, 0, [10.0, 20.0, 30.0]);
    set(&mut data, 0, 0, 1, [40.0, 50.0, 60.0]);
    set(&mut data, 0, 0, 2, [0.0, 0.0, 0.0]);
    // (0,1): greys 90, 10, 50 -> max layer 0, min layer 1
    set(&mut data, 0, 1, 0, [90.0, 90.0, 90.0]);
    set(&mut data, 0, 1, 1, [10.0, 10.0, 10.0]);
    set(&mut data, 0, 1, 2, [50.0, 50.0, 50.0]);
    // (1,0): greys 30, 30, 20 -> max ties to layer 0, min layer 2
    set(&mut data, 1, 0, 0, [30.0, 30.0, 30.0]);
    set(&mut data, 1, 0, 1, [30.0, 30.0, 30.0]);
    set(&mut data, 1, 0, 2, [10.0, 20.0, 30.0]);
    // (1,1): greys 10, 30, 70 -> max layer 2, min layer 0
    set(&mut data, 1, 1, 0, [0.0, 10.0, 20.0]);
    set(&mut data, 1, 1, 1, [20.0, 30.0, 40.0]);
    set(&mut data, 1, 1, 2, [60.0, 70.0, 80.0]);
    LayerStack { data }
}

#[test]
fn test_mean_closed_form() {
    let result = reduce(&known_stack(), Statistic::Mean).unwrap();
    // (0,0) channel 0: (10 + 40 + 0) / 3
    assert_relative_eq!(result.data[[0, 0, 0]], 50.0 / 3.0, epsilon = 1e-4);
    // (1,1) channel 2: (20 + 40 + 80) / 3
    assert_relative_eq!(result.data[[1, 1, 2]], 140.0 / 3.0, epsilon = 1e-4);
}

#[test]
fn test_median_closed_form() {
    let result = reduce(&known_stack(), Statistic::Median).unwrap();
    // (0,0) channel 0: median of {10, 40, 0}
    assert_relative_eq!(result.data[[0, 0, 0]], 10.0, epsilon = 1e-6);
    // (0,1) channel 1: median of {90, 10, 50}
    assert_relative_eq!(result.data[[0, 1, 1]], 50.0, epsilon = 1e-6);
}

#[test]
fn test_std_closed_form() {
    let result = reduce(&known_stack(), Statistic::Std).unwrap();
    // (0,0) channel 0: population std of {10, 40, 0}
    let mean = 50.0 / 3.0;
    let var = ((10.0 - mean) * (10.0 - mean)
        + (40.0 - mean) * (40.0 - mean)
        + (0.0 - mean) * (0.0 - mean))
        / 3.0;
    assert_relative_eq!(result.data[[0, 0, 0]], f32::sqrt(var), epsilon = 1e-4);
}

/// max/min return the original colour pixel of the winning layer, not a
/// per-channel extremum.
#[test]
fn test_max_returns_winning_colour() {
    let result = reduce(&known_stack(), Statistic::Max).unwrap();
    assert_eq!(
        [
            result.data[[0, 0, 0]],
            result.data[[0, 0, 1]],
            result.data[[0, 0, 2]]
        ],
        [40.0, 50.0, 60.0]
    );
    // Not the per-channel max (which would be 90 everywhere on (0,1)).
    assert_eq!(
        [
            result.data[[1, 1, 0]],
            result.data[[1, 1, 1]],
            result.data[[1, 1, 2]]
        ],
        [60.0, 70.0, 80.0]
    );
}

#[test]
fn test_min_returns_winning_colour() {
    let result = reduce(&known_stack(), Statistic::Min).unwrap();
    assert_eq!(
        [
            result.data[[1, 0, 0]],
            result.data[[1, 0, 1]],
            result.data[[1, 0, 2]]
        ],
        [10.0, 20.0, 30.0]
    );
}

#[test]
fn test_index_maps_replicate_winner() {
    let max_index = reduce(&known_stack(), Statistic::MaxIndex).unwrap();
    for chan in 0..3 {
        assert_eq!(max_index.data[[0, 0, chan]], 1.0);
        assert_eq!(max_index.data[[0, 1, chan]], 0.0);
        // Tie goes to the first layer.
        assert_eq!(max_index.data[[1, 0, chan]], 0.0);
        assert_eq!(max_index.data[[1, 1, chan]], 2.0);
    }
    let min_index = reduce(&known_stack(), Statistic::MinIndex).unwrap();
    for chan in 0..3 {
        assert_eq!(min_index.data[[0, 0, chan]], 2.0);
        assert_eq!(min_index.data[[0, 1, chan]], 1.0);
        assert_eq!(min_index.data[[1, 0, chan]], 2.0);
        assert_eq!(min_index.data[[1, 1, chan]], 0.0);
    }
}

#[test]
fn test_empty_stack_is_error() {
    let stack = LayerStack::zeros(2, 2, 3, 0);
    assert!(reduce(&stack, Statistic::Mean).is_err());
}

#[test]
fn test_unknown_statistic_name_is_error() {
    assert!("variance".parse::<Statistic>().is_err());
    assert_eq!("maxIndex".parse::<Statistic>().unwrap(), Statistic::MaxIndex);
}
