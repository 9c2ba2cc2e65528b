// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Dynamical decoupling with a weak, phase modulated drive in the pulse gaps.
//!
//! With the weak drive on resonance and 90° phase modulation this is the
//! RNOVEL polarisation transfer; with a detuned drive it resolves the Mollow
//! triplet of the dressed states.

use pulsed_compiler::ir::{Block, Ensemble, Envelope};
use pulsed_compiler::metadata::MeasurementInfo;
use pulsed_compiler::{Error, Program};
use pulsed_units::{Duration, Seconds, seconds};
use serde::Deserialize;

use super::{Protocol, ProtocolKind};
use crate::Result;
use crate::context::GeneratorContext;
use crate::pulses::{PHASE_MINUS_X, PHASE_X};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DdType {
    Se,
    Se90,
    #[default]
    Cpmg,
    Xy4,
    Xy8,
    Xy16,
}

impl DdType {
    /// Phases of the pi pulses within one order, in degrees.
    pub const fn phases(&self) -> &'static [f64] {
        match self {
            DdType::Se => &[0.0],
            DdType::Se90 => &[90.0],
            DdType::Cpmg => &[90.0, 90.0],
            DdType::Xy4 => &[0.0, 90.0, 0.0, 90.0],
            DdType::Xy8 => &[0.0, 90.0, 0.0, 90.0, 90.0, 0.0, 90.0, 0.0],
            DdType::Xy16 => &[
                0.0, 90.0, 0.0, 90.0, 90.0, 0.0, 90.0, 0.0, 180.0, 270.0, 180.0, 270.0, 270.0,
                180.0, 270.0, 180.0,
            ],
        }
    }

    pub const fn suborder(&self) -> usize {
        self.phases().len()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DdMollow {
    pub name: String,
    /// Pulse center spacing.
    pub tau: f64,
    pub dd_type: DdType,
    pub dd_order: u32,
    pub weak_amplitude: f64,
    /// Detuning of the weak drive from the microwave frequency.
    pub weak_detuning: f64,
    /// Weak drive phase per gap, cycled over the pulses of one order.
    pub phase_modulation: Vec<f64>,
    pub envelope: Envelope,
    pub shaped_weak_drive: bool,
    pub alternating: bool,
}

impl Default for DdMollow {
    fn default() -> Self {
        DdMollow {
            name: "dd_mollow".to_string(),
            tau: 500e-9,
            dd_type: DdType::Cpmg,
            dd_order: 1,
            weak_amplitude: 0.1,
            weak_detuning: 1e6,
            phase_modulation: vec![],
            envelope: Envelope::default(),
            shaped_weak_drive: true,
            alternating: true,
        }
    }
}

impl DdMollow {
    /// Phase of the weak drive in the gap before pulse `pulse_idx`.
    fn weak_phase(&self, pulse_idx: usize) -> f64 {
        match self.phase_modulation.len() {
            0 => 0.0,
            n => self.phase_modulation[pulse_idx % n],
        }
    }

    /// Build the decoupling block with an explicit Rabi period.
    pub(crate) fn segment(
        &self,
        ctx: &GeneratorContext<'_>,
        rabi_period: Duration<Seconds>,
    ) -> Result<(Block, Ensemble)> {
        if self.dd_order == 0 {
            return Err(crate::Error::new("Decoupling order must be at least 1"));
        }
        let pulse_spacing = seconds(self.tau) - rabi_period / 2.0;
        if pulse_spacing.is_negative() {
            return Err(
                Error::infeasible("DD Mollow tau", seconds(self.tau), rabi_period / 2.0).into(),
            );
        }
        let weak_envelope = if self.shaped_weak_drive {
            self.envelope
        } else {
            Envelope::default()
        };
        let weak_drive = |pulse_idx: usize| {
            ctx.factory.make_drive_element(
                pulse_spacing / 2.0,
                self.weak_amplitude,
                ctx.settings.microwave_frequency + self.weak_detuning,
                self.weak_phase(pulse_idx),
                weak_envelope,
            )
        };
        let pi_half = ctx.drive(rabi_period / 4.0, PHASE_X, self.envelope)?;
        // on IQ channels a -x pi/2 pulse replaces the 3pi/2 pulse
        let pi_three_half = if ctx.settings.is_analog_microwave() {
            ctx.drive(rabi_period / 4.0, PHASE_MINUS_X, self.envelope)?
        } else {
            ctx.drive(rabi_period * 0.75, PHASE_X, self.envelope)?
        };
        let mut train = vec![];
        for _ in 0..self.dd_order {
            for (pulse_idx, &phase) in self.dd_type.phases().iter().enumerate() {
                train.push(weak_drive(pulse_idx)?);
                train.push(ctx.drive(rabi_period / 2.0, phase, self.envelope)?);
                train.push(weak_drive(pulse_idx + 1)?);
            }
        }
        pulsed_log::diagnostic!(
            "Weak drive phases of '{}': {:?}",
            self.name,
            (0..=self.dd_type.suborder())
                .map(|i| self.weak_phase(i))
                .collect::<Vec<_>>()
        );
        let readout = ctx.readout_elements()?;

        let mut block = Block::new(&self.name);
        block.push(pi_half.clone());
        block.extend(&train);
        block.push(pi_half.clone());
        block.extend(&readout);
        if self.alternating {
            block.push(pi_half);
            block.extend(&train);
            block.push(pi_three_half);
            block.extend(&readout);
        }
        let measurement = MeasurementInfo::points(vec![self.tau], self.alternating);
        let ensemble = ctx.single_ensemble(&block, true, measurement)?;
        Ok((block, ensemble))
    }
}

impl Protocol for DdMollow {
    const KIND: ProtocolKind = ProtocolKind::DdMollow;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let (block, ensemble) = self.segment(ctx, ctx.settings.rabi_period())?;
        Ok(Program::single(block, ensemble))
    }
}

#[cfg(test)]
mod tests {
    use pulsed_compiler::ir::AnalogWaveform;
    use pulsed_compiler::{DefaultElementFactory, GeneratorSettings, SequenceTableBuilder};

    use super::*;

    fn build(protocol: &DdMollow, settings: &GeneratorSettings) -> Result<Program> {
        let traits = settings.device.traits();
        let factory = DefaultElementFactory::for_device(traits);
        let mut table = SequenceTableBuilder::new(traits.jump_addressing);
        let mut ctx = GeneratorContext::new(settings, &factory, &mut table);
        protocol.generate(&mut ctx)
    }

    #[test]
    fn test_dd_phases() {
        assert_eq!(DdType::Xy16.suborder(), 16);
        assert_eq!(DdType::Cpmg.phases(), &[90.0, 90.0]);
    }

    #[test]
    fn test_alternating_mollow() {
        let settings = GeneratorSettings::default();
        let dd = DdMollow {
            dd_order: 2,
            phase_modulation: vec![90.0, 0.0],
            ..Default::default()
        };
        let program = build(&dd, &settings).unwrap();
        let block = &program.blocks[0];
        // per half: pi/2, 2 orders x 2 pulses x 3 elements, pi/2 and 3 readout elements
        assert_eq!(block.len(), 2 * (1 + 12 + 1 + 3));
        let info = &program.ensembles[0].measurement;
        assert_eq!(info.number_of_lasers, 2);
        assert_eq!(info.controlled_variable, vec![500e-9]);
        assert_eq!(info.labels.0, "Tau");

        let weak_phases: Vec<f64> = block.elements()[1..4]
            .iter()
            .filter_map(|e| match e.analog {
                Some(AnalogWaveform::Sine { phase, amplitude, .. }) if amplitude == 0.1 => {
                    Some(phase)
                }
                _ => None,
            })
            .collect();
        assert_eq!(weak_phases, vec![90.0, 0.0]);

        match &block.elements()[1 + 12 + 1 + 3 + 13].analog {
            Some(AnalogWaveform::Sine { phase, .. }) => assert_eq!(*phase, 180.0),
            other => panic!("expected the closing pi/2 pulse, got {other:?}"),
        }
    }

    #[test]
    fn test_short_tau_is_infeasible() {
        let settings = GeneratorSettings::default();
        let dd = DdMollow {
            tau: 50e-9,
            ..Default::default()
        };
        assert!(build(&dd, &settings).is_err());
    }
}
