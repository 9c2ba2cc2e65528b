// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Conversion between continuous durations and hardware sample counts.
//!
//! A sample count is valid on a device when it is a multiple of the device
//! granularity. Durations that fall between valid counts are rounded to the
//! nearest one; sub-sample precision has no physical meaning on the output.

use crate::duration::{Duration, Seconds, seconds};

pub type Samples = i64;

pub fn floor_to_grid(value: Samples, grid: Samples) -> Samples {
    value - value.rem_euclid(grid)
}

pub fn ceil_to_grid(value: Samples, grid: Samples) -> Samples {
    value + (grid - value.rem_euclid(grid)) % grid
}

/// Round to the nearest multiple of `grid`, halfway values away from zero.
pub fn round_to_grid(value: Samples, grid: Samples) -> Samples {
    let lower = floor_to_grid(value, grid);
    let remainder = value - lower;
    let round_up = if value >= 0 {
        2 * remainder >= grid
    } else {
        2 * remainder > grid
    };
    if round_up { lower + grid } else { lower }
}

pub fn length_to_samples(t: f64, sampling_rate: f64) -> Samples {
    (t * sampling_rate).round() as Samples
}

pub fn samples_to_length(samples: Samples, sampling_rate: f64) -> Duration<Seconds> {
    seconds(samples as f64 / sampling_rate)
}

/// Round `duration` to the nearest duration whose sample count is a multiple
/// of `granularity`.
///
/// A granularity of zero is treated as one.
pub fn quantize(
    duration: Duration<Seconds>,
    granularity: u32,
    sampling_rate: f64,
) -> Duration<Seconds> {
    let grid = f64::from(granularity.max(1));
    let units = (duration.value() * sampling_rate / grid).round();
    seconds(units * grid / sampling_rate)
}

/// Sample count of `duration` on the grid, see [`quantize`].
pub fn quantized_samples(duration: Duration<Seconds>, granularity: u32, sampling_rate: f64) -> Samples {
    length_to_samples(quantize(duration, granularity, sampling_rate).value(), sampling_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seconds_to_samples() {
        assert_eq!(length_to_samples(0.0, 2e9), 0);
        assert_eq!(length_to_samples(100e-7, 2e9), 20000);
        assert_eq!(length_to_samples(12e-9, 2.4e9), 29);
        assert_eq!(length_to_samples(500e-9, 12e9), 6000);
    }

    #[test]
    fn test_grid_rounding() {
        assert_eq!(floor_to_grid(17, 8), 16);
        assert_eq!(ceil_to_grid(17, 8), 24);
        assert_eq!(ceil_to_grid(16, 8), 16);
        assert_eq!(round_to_grid(19, 8), 16);
        assert_eq!(round_to_grid(20, 8), 24);
        assert_eq!(round_to_grid(-20, 8), -24);
        assert_eq!(round_to_grid(-19, 8), -16);
    }

    #[test]
    fn test_quantize() {
        // 1.25 GSa/s, granularity 4: valid lengths are multiples of 3.2 ns
        let q = quantize(seconds(10e-9), 4, 1.25e9);
        assert_eq!(length_to_samples(q.value(), 1.25e9), 12);
        assert_eq!(quantized_samples(seconds(11e-9), 4, 1.25e9), 12);
        assert_eq!(quantized_samples(seconds(13e-9), 4, 1.25e9), 16);
        assert_eq!(quantized_samples(seconds(0.0), 8, 12e9), 0);
        // representable durations are left alone
        assert_eq!(quantize(seconds(500e-9), 4, 12e9), seconds(500e-9));
        assert_eq!(quantize(seconds(5e-9), 0, 1e9), seconds(5e-9));
    }

    proptest! {
        #[test]
        fn quantize_is_idempotent(
            t in 0.0f64..1e-3,
            granularity in 1u32..128,
            rate in prop::sample::select(vec![1e9, 1.25e9, 2.4e9, 12e9, 25e9]),
        ) {
            let once = quantize(seconds(t), granularity, rate);
            let twice = quantize(once, granularity, rate);
            prop_assert_eq!(
                length_to_samples(once.value(), rate),
                length_to_samples(twice.value(), rate)
            );
            prop_assert_eq!(length_to_samples(once.value(), rate) % i64::from(granularity), 0);
        }
    }
}
