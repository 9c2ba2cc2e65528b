// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use pulsed_compiler::Program;
use pulsed_compiler::ir::{Block, Ensemble};
use pulsed_compiler::metadata::MeasurementInfo;
use pulsed_units::seconds;
use serde::Deserialize;

use super::{Protocol, ProtocolKind};
use crate::context::GeneratorContext;
use crate::{Error, Result};

/// Integrated solid effect: repeated linear frequency chirps across the
/// resonance, followed by one readout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChirpedSweep {
    pub name: String,
    /// Requested sweep time, rounded up to a whole number of chirps.
    pub t_ise: f64,
    /// Chirp bandwidth in Hz.
    pub sweep_width: f64,
    /// Chirp rate in Hz/s.
    pub sweep_speed: f64,
    pub amplitude: f64,
    /// Chirp center, the microwave frequency if unset.
    pub center_frequency: Option<f64>,
    /// Follow every chirp with the reverse chirp.
    pub both_polarities: bool,
}

impl Default for ChirpedSweep {
    fn default() -> Self {
        ChirpedSweep {
            name: "chirped_sweep".to_string(),
            t_ise: 1e-6,
            sweep_width: 10e6,
            sweep_speed: 3e12,
            amplitude: 0.25,
            center_frequency: None,
            both_polarities: false,
        }
    }
}

impl ChirpedSweep {
    /// Number of chirps and the duration of one chirp.
    fn ramps(&self) -> Result<(u32, f64)> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.sweep_width) || !positive(self.sweep_speed) {
            return Err(Error::new(format!(
                "Chirp width and speed must be positive, got {} Hz at {} Hz/s",
                self.sweep_width, self.sweep_speed
            )));
        }
        if !positive(self.t_ise) {
            return Err(Error::new(format!(
                "Sweep time must be positive, got {} s",
                self.t_ise
            )));
        }
        let t_ramp = self.sweep_width / self.sweep_speed;
        let ratio = self.t_ise / t_ramp;
        // tolerate float noise of t_ise being an exact multiple
        let n_ramps = (ratio - 1e-9).ceil().max(1.0);
        if n_ramps > f64::from(u32::MAX) {
            return Err(Error::new(format!("Sweep time {} s needs too many chirps", self.t_ise)));
        }
        let n_ramps = n_ramps as u32;
        if (ratio - f64::from(n_ramps)).abs() > 1e-9 {
            pulsed_log::info!(
                "Adjusting t_ise to {:.3} us to fit in {} chirps of {:.3} us",
                f64::from(n_ramps) * t_ramp * 1e6,
                n_ramps,
                t_ramp * 1e6
            );
        }
        Ok((n_ramps, t_ramp))
    }

    pub(crate) fn segment(&self, ctx: &GeneratorContext<'_>) -> Result<(Block, Ensemble)> {
        let (n_ramps, t_ramp) = self.ramps()?;
        let center = self
            .center_frequency
            .unwrap_or(ctx.settings.microwave_frequency);
        let start = center - self.sweep_width / 2.0;
        let stop = center + self.sweep_width / 2.0;
        let up = ctx
            .factory
            .make_chirp_element(seconds(t_ramp), self.amplitude, start, stop, 0.0)?;
        let down = ctx
            .factory
            .make_chirp_element(seconds(t_ramp), self.amplitude, stop, start, 0.0)?;

        let mut block = Block::new(&self.name);
        for _ in 0..n_ramps {
            block.push(up.clone());
            if self.both_polarities {
                block.push(down.clone());
            }
        }
        block.extend(&ctx.readout_elements()?);
        let measurement = MeasurementInfo::points(vec![0.0], false)
            .with_units("a.u.", "")
            .with_labels("data point", "Signal");
        let ensemble = ctx.single_ensemble(&block, false, measurement)?;
        Ok((block, ensemble))
    }
}

impl Protocol for ChirpedSweep {
    const KIND: ProtocolKind = ProtocolKind::ChirpedSweep;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let (block, ensemble) = self.segment(ctx)?;
        Ok(Program::single(block, ensemble))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_sweep_time_is_rounded_up() {
        let sweep = ChirpedSweep {
            t_ise: 1e-6,
            sweep_width: 10e6,
            sweep_speed: 25e12,
            ..Default::default()
        };
        // one chirp takes 400 ns
        let (n, t_ramp) = sweep.ramps().unwrap();
        assert_eq!(n, 3);
        assert!((t_ramp - 400e-9).abs() < 1e-18);

        let exact = ChirpedSweep {
            t_ise: 2e-6,
            sweep_width: 10e6,
            sweep_speed: 10e12,
            ..Default::default()
        };
        assert_eq!(exact.ramps().unwrap().0, 2);
    }

    #[test]
    fn test_invalid_sweep() {
        let sweep = ChirpedSweep {
            sweep_speed: 0.0,
            ..Default::default()
        };
        assert!(sweep.ramps().is_err());
        let sweep = ChirpedSweep {
            t_ise: 0.0,
            ..Default::default()
        };
        assert!(sweep.ramps().is_err());
    }

    proptest! {
        #[test]
        fn chirps_cover_the_sweep_time(
            t_ise in 1e-7f64..1e-4,
            sweep_width in 1e6f64..1e8,
            sweep_speed in 1e11f64..1e14,
        ) {
            let sweep = ChirpedSweep { t_ise, sweep_width, sweep_speed, ..Default::default() };
            let (n, t_ramp) = sweep.ramps().unwrap();
            let covered = f64::from(n) * t_ramp;
            prop_assert!(covered >= t_ise * (1.0 - 1e-6));
            prop_assert!(n == 1 || covered < t_ise + t_ramp);
        }
    }
}
