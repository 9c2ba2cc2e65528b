// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Single tau protocols: Ramsey, Hahn echo and XY8.
//!
//! Each builds one padded block with a single fast counter readout. The Rabi
//! period is snapped to 8 samples and the free evolution to 4 samples, so the
//! pi/2 and pi pulses as well as half taus land on whole samples.

use pulsed_compiler::ir::{Block, Element, Ensemble, Envelope};
use pulsed_compiler::metadata::MeasurementInfo;
use pulsed_compiler::{Error, Program};
use pulsed_units::{Duration, Seconds, seconds};
use serde::Deserialize;

use super::{Protocol, ProtocolKind};
use crate::Result;
use crate::context::GeneratorContext;
use crate::pulses::{PHASE_X, PHASE_Y, ReadoutTiming};

struct DrivePulses {
    pi_half: Element,
    pi_half_read: Element,
    pi_x: Element,
    pi_y: Element,
}

impl GeneratorContext<'_> {
    fn quantized_rabi_period(&self) -> Duration<Seconds> {
        self.clock.quantize(self.settings.rabi_period(), 8)
    }

    fn drive_pulses(&self, readout_phase: f64) -> Result<DrivePulses> {
        let rabi_period = self.quantized_rabi_period();
        let rect = Envelope::default();
        Ok(DrivePulses {
            pi_half: self.drive(rabi_period / 4.0, PHASE_X, rect)?,
            pi_half_read: self.drive(rabi_period / 4.0, readout_phase, rect)?,
            pi_x: self.drive(rabi_period / 2.0, PHASE_X, rect)?,
            pi_y: self.drive(rabi_period / 2.0, PHASE_Y, rect)?,
        })
    }

    /// Close `block` with the readout and wrap it as a one laser ensemble.
    fn single_shot(
        &self,
        mut block: Block,
        measurement: MeasurementInfo,
        readout: ReadoutTiming,
    ) -> Result<(Block, Ensemble)> {
        for element in self.fast_counter_readout(readout)? {
            block.push(element);
        }
        let block = self.padded(block)?;
        let ensemble = self.single_ensemble(&block, true, measurement)?;
        Ok((block, ensemble))
    }
}

fn check_tau(context: &str, tau: f64) -> Result<Duration<Seconds>> {
    if tau < 0.0 || tau.is_nan() {
        return Err(Error::infeasible(context, seconds(tau), Duration::zero()).into());
    }
    Ok(seconds(tau))
}

pub(crate) fn ramsey_segment(
    ctx: &GeneratorContext<'_>,
    name: &str,
    tau: f64,
    readout_phase: f64,
    readout: ReadoutTiming,
) -> Result<(Block, Ensemble)> {
    let free_evolution = ctx.clock.quantize(check_tau("Ramsey tau", tau)?, 4);
    let pulses = ctx.drive_pulses(readout_phase)?;

    let mut block = Block::new(name);
    block.push(pulses.pi_half);
    block.push(ctx.idle(free_evolution)?);
    block.push(pulses.pi_half_read);
    ctx.single_shot(block, MeasurementInfo::points(vec![tau], false), readout)
}

/// XY8 train with `order` repetitions. `tau` is the pulse center spacing.
pub(crate) fn xy8_segment(
    ctx: &GeneratorContext<'_>,
    name: &str,
    tau: f64,
    order: u32,
    readout_phase: f64,
    readout: ReadoutTiming,
) -> Result<(Block, Ensemble)> {
    if order == 0 {
        return Err(crate::Error::new("XY8 order must be at least 1"));
    }
    // pulse spacing of zero once the pi pulses touch
    let spacing = (check_tau("XY8 tau", tau)? - ctx.settings.rabi_period() / 2.0).max(Duration::zero());
    let spacing = ctx.clock.quantize(spacing, 4);
    let pulses = ctx.drive_pulses(readout_phase)?;
    let tau_half = ctx.idle(spacing / 2.0)?;
    let tau_element = ctx.idle(spacing)?;

    let mut block = Block::new(name);
    block.push(pulses.pi_half);
    block.push(tau_half.clone());
    let xy8 = [
        &pulses.pi_x,
        &pulses.pi_y,
        &pulses.pi_x,
        &pulses.pi_y,
        &pulses.pi_y,
        &pulses.pi_x,
        &pulses.pi_y,
        &pulses.pi_x,
    ];
    for n in 0..order {
        for (i, pulse) in xy8.iter().enumerate() {
            if i > 0 || n > 0 {
                block.push(tau_element.clone());
            }
            block.push((*pulse).clone());
        }
    }
    block.push(tau_half);
    block.push(pulses.pi_half_read);
    ctx.single_shot(block, MeasurementInfo::points(vec![tau], false), readout)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ramsey {
    pub name: String,
    pub tau: f64,
    /// Phase of the second pi/2 pulse in degrees.
    pub readout_phase: f64,
    /// Readout laser length, the rig setting if unset.
    pub laser_length: Option<f64>,
    /// Wait after the readout, the rig setting if unset.
    pub wait_length: Option<f64>,
}

impl Default for Ramsey {
    fn default() -> Self {
        Ramsey {
            name: "ramsey".to_string(),
            tau: 500e-9,
            readout_phase: 0.0,
            laser_length: None,
            wait_length: None,
        }
    }
}

impl Protocol for Ramsey {
    const KIND: ProtocolKind = ProtocolKind::Ramsey;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let readout = ctx.readout_timing(self.laser_length, self.wait_length);
        let (block, ensemble) =
            ramsey_segment(ctx, &self.name, self.tau, self.readout_phase, readout)?;
        Ok(Program::single(block, ensemble))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Xy8 {
    pub name: String,
    pub tau: f64,
    pub order: u32,
    /// Phase of the final pi/2 pulse in degrees.
    pub readout_phase: f64,
    pub laser_length: Option<f64>,
    pub wait_length: Option<f64>,
}

impl Default for Xy8 {
    fn default() -> Self {
        Xy8 {
            name: "xy8".to_string(),
            tau: 500e-9,
            order: 1,
            readout_phase: 0.0,
            laser_length: None,
            wait_length: None,
        }
    }
}

impl Protocol for Xy8 {
    const KIND: ProtocolKind = ProtocolKind::Xy8;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let readout = ctx.readout_timing(self.laser_length, self.wait_length);
        let (block, ensemble) = xy8_segment(
            ctx,
            &self.name,
            self.tau,
            self.order,
            self.readout_phase,
            readout,
        )?;
        Ok(Program::single(block, ensemble))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Hahn {
    pub name: String,
    pub tau: f64,
    pub laser_length: Option<f64>,
    pub wait_length: Option<f64>,
}

impl Default for Hahn {
    fn default() -> Self {
        Hahn {
            name: "hahn".to_string(),
            tau: 500e-9,
            laser_length: None,
            wait_length: None,
        }
    }
}

impl Protocol for Hahn {
    const KIND: ProtocolKind = ProtocolKind::Hahn;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let free_evolution = ctx.clock.quantize(check_tau("Hahn tau", self.tau)?, 4);
        let pulses = ctx.drive_pulses(PHASE_X)?;
        let tau_element = ctx.idle(free_evolution)?;

        let mut block = Block::new(&self.name);
        block.push(pulses.pi_half.clone());
        block.push(tau_element.clone());
        block.push(pulses.pi_x);
        block.push(tau_element);
        block.push(pulses.pi_half);
        let readout = ctx.readout_timing(self.laser_length, self.wait_length);
        let (block, ensemble) =
            ctx.single_shot(block, MeasurementInfo::points(vec![self.tau], false), readout)?;
        Ok(Program::single(block, ensemble))
    }
}

#[cfg(test)]
mod tests {
    use pulsed_compiler::device_traits::DeviceKind;
    use pulsed_compiler::ir::AnalogWaveform;
    use pulsed_compiler::{DefaultElementFactory, GeneratorSettings, SequenceTableBuilder};

    use super::*;

    fn build<P: Protocol>(protocol: &P, settings: &GeneratorSettings) -> Result<Program> {
        let traits = settings.device.traits();
        let factory = DefaultElementFactory::for_device(traits);
        let mut table = SequenceTableBuilder::new(traits.jump_addressing);
        let mut ctx = GeneratorContext::new(settings, &factory, &mut table);
        protocol.generate(&mut ctx)
    }

    fn phases(block: &Block) -> Vec<f64> {
        block
            .elements()
            .iter()
            .filter_map(|e| match e.analog {
                Some(AnalogWaveform::Sine { phase, .. }) => Some(phase),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ramsey_layout() {
        let settings = GeneratorSettings::default();
        let ramsey = Ramsey {
            readout_phase: 90.0,
            ..Default::default()
        };
        let program = build(&ramsey, &settings).unwrap();
        let block = &program.blocks[0];
        assert_eq!(phases(block), vec![0.0, 90.0]);
        // pi/2, tau, pi/2 then laser, delay and wait
        assert_eq!(block.len(), 6);
        assert!(program.sequences.is_empty());
        let info = &program.ensembles[0].measurement;
        assert_eq!(info.number_of_lasers, 1);
        assert!(program.ensembles[0].rotating_frame);
        assert_eq!(
            info.counting_length,
            block.duration().unwrap()
        );
    }

    #[test]
    fn test_xy8_pulse_train() {
        let settings = GeneratorSettings {
            device: DeviceKind::AWG70K,
            ..Default::default()
        };
        let xy8 = Xy8 {
            order: 2,
            ..Default::default()
        };
        let program = build(&xy8, &settings).unwrap();
        let block = &program.blocks[0];
        let phases = phases(block);
        assert_eq!(phases.len(), 2 + 16);
        assert_eq!(&phases[1..9], &[0.0, 90.0, 0.0, 90.0, 90.0, 0.0, 90.0, 0.0]);
        // pi/2, tau/2, 16 pulses with 15 gaps, tau/2, pi/2 and the readout
        assert_eq!(block.len(), 1 + 1 + 16 + 15 + 1 + 1 + 3);
    }

    #[test]
    fn test_xy8_clamps_short_tau() {
        let settings = GeneratorSettings::default();
        let xy8 = Xy8 {
            tau: 10e-9,
            ..Default::default()
        };
        let program = build(&xy8, &settings).unwrap();
        assert!(program.blocks[0].elements()[1].duration == Duration::zero());
        assert_eq!(program.ensembles[0].measurement.controlled_variable, vec![10e-9]);
    }

    #[test]
    fn test_negative_tau_is_infeasible() {
        let settings = GeneratorSettings::default();
        let hahn = Hahn {
            tau: -1e-9,
            ..Default::default()
        };
        assert!(matches!(
            build(&hahn, &settings),
            Err(crate::Error::Compiler(Error::InfeasibleTiming { .. }))
        ));
    }

    #[test]
    fn test_readout_length_override() {
        let settings = GeneratorSettings::default();
        let laser_samples = |program: &Program| {
            let clock = pulsed_compiler::SampleClock::for_device(settings.device.traits());
            let block = &program.blocks[0];
            // laser, delay and wait close the block
            clock.samples(block.elements()[block.len() - 3].duration)
        };
        let rig = build(&Hahn::default(), &settings).unwrap();
        let short = Hahn {
            laser_length: Some(1.5e-6),
            wait_length: Some(500e-9),
            ..Default::default()
        };
        let short = build(&short, &settings).unwrap();
        // 3 us and 1.5 us minus the 480 ns head
        assert_eq!(laser_samples(&rig), 30240);
        assert_eq!(laser_samples(&short), 12240);
        assert!(
            short.ensembles[0].measurement.counting_length
                < rig.ensembles[0].measurement.counting_length
        );

        let ramsey = Ramsey {
            laser_length: Some(1.5e-6),
            ..Default::default()
        };
        assert_eq!(laser_samples(&build(&ramsey, &settings).unwrap()), 12240);
        let xy8 = Xy8 {
            laser_length: Some(1.5e-6),
            ..Default::default()
        };
        assert_eq!(laser_samples(&build(&xy8, &settings).unwrap()), 12240);
    }
}
