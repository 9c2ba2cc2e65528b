// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! PulsePol and the composite polarisation readout ("propi") sequences.
//!
//! A propi sequence reads the nuclear polarisation out step by step with a
//! PulsePol readout, then re-polarises with one of several initialisation
//! segments and finally emits a sync trigger for the counter:
//!
//! | row | ensemble | repetitions |
//! |-----|----------|-------------|
//! | 0   | `ppol_read` | `m_read_step - 1` |
//! | 1   | initialisation | `n_pol - 1` |
//! | 2   | `sync_trig` | 0 |
//!
//! The readout row has to come first: the counter assigns laser pulses in the
//! order they are played.

use pulsed_compiler::Program;
use pulsed_compiler::ir::{Block, Element, Ensemble, Envelope, FlowControl};
use pulsed_compiler::metadata::MeasurementInfo;
use pulsed_units::{Duration, Seconds, seconds};
use serde::Deserialize;

use super::decoupling::{DdMollow, DdType};
use super::{ChirpedSweep, Protocol, ProtocolKind};
use crate::context::GeneratorContext;
use crate::pulses::{PHASE_MINUS_X, PHASE_MINUS_Y, PHASE_X, PHASE_Y};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolarizationDirection {
    #[default]
    Up,
    Down,
}

/// PulsePol (Pol 2.0) polarisation transfer with optional alternating readout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ppol {
    pub name: String,
    pub tau: f64,
    pub order: u32,
    pub direction: PolarizationDirection,
    pub envelope: Envelope,
    /// Keep the counter gate open during the readout laser.
    pub gate_readout: bool,
    pub alternating: bool,
}

impl Default for Ppol {
    fn default() -> Self {
        Ppol {
            name: "ppol".to_string(),
            tau: 500e-9,
            order: 1,
            direction: PolarizationDirection::Up,
            envelope: Envelope::default(),
            gate_readout: true,
            alternating: true,
        }
    }
}

impl Ppol {
    fn cycle(
        &self,
        ctx: &GeneratorContext<'_>,
        spacing: Duration<Seconds>,
    ) -> Result<(Vec<Element>, Element)> {
        let rabi_period = ctx.settings.rabi_period();
        let pulse = |length: Duration<Seconds>, phase: f64| ctx.drive(length, phase, self.envelope);
        let pi_half_x = pulse(rabi_period / 4.0, PHASE_X)?;
        let pi_half_minus_x = pulse(rabi_period / 4.0, PHASE_MINUS_X)?;
        let pi_half_y = pulse(rabi_period / 4.0, PHASE_Y)?;
        let pi_half_minus_y = pulse(rabi_period / 4.0, PHASE_MINUS_Y)?;
        let pi_x = pulse(rabi_period / 2.0, PHASE_X)?;
        let pi_y = pulse(rabi_period / 2.0, PHASE_Y)?;
        let gap = ctx.idle(spacing)?;

        let first_half = [
            pi_half_minus_x.clone(),
            gap.clone(),
            pi_y,
            gap.clone(),
            pi_half_minus_x,
        ];
        let second_half = [
            pi_half_y.clone(),
            gap.clone(),
            pi_x,
            gap,
            pi_half_y,
        ];
        // the alternating readout flips the final pi/2 pulse
        Ok(match self.direction {
            PolarizationDirection::Up => (
                first_half.into_iter().chain(second_half).collect(),
                pi_half_minus_y,
            ),
            PolarizationDirection::Down => (
                second_half.into_iter().chain(first_half).collect(),
                pi_half_x,
            ),
        })
    }

    pub(crate) fn segment(&self, ctx: &GeneratorContext<'_>) -> Result<(Block, Ensemble)> {
        if self.order == 0 {
            return Err(Error::new("PulsePol order must be at least 1"));
        }
        let rabi_period = ctx.settings.rabi_period();
        let spacing = seconds(self.tau) / 4.0 - rabi_period / 2.0;
        if spacing.is_negative() {
            return Err(pulsed_compiler::Error::infeasible(
                format!("PulsePol tau with a Rabi period of {rabi_period}"),
                seconds(self.tau),
                rabi_period * 2.0,
            )
            .into());
        }
        let (cycle, flipped_last) = self.cycle(ctx, spacing)?;
        let mut readout = ctx.readout_elements()?;
        if !self.gate_readout {
            if let Some(gate) = ctx.settings.gate_channel.as_deref() {
                if let Some(idx) = ctx.device.channel_index(gate) {
                    readout[0].set_digital(idx, false);
                }
            }
        }

        let mut block = Block::new(&self.name);
        for _ in 0..2 * self.order {
            block.extend(&cycle);
        }
        block.extend(&readout);
        if self.alternating {
            for _ in 0..2 * self.order {
                block.extend(&cycle);
            }
            block.replace_last(flipped_last);
            block.extend(&readout);
        }
        let measurement = MeasurementInfo::points(vec![self.tau], self.alternating)
            .with_units("s", "")
            .with_labels("tau", "Signal");
        let ensemble = ctx.single_ensemble(&block, true, measurement)?;
        Ok((block, ensemble))
    }
}

impl Protocol for Ppol {
    const KIND: ProtocolKind = ProtocolKind::Ppol;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let (block, ensemble) = self.segment(ctx)?;
        Ok(Program::single(block, ensemble))
    }
}

/// PulsePol readout shared by all propi sequences.
struct PropiReadout {
    n_pol: u32,
    m_read_step: u32,
    tau: f64,
    order: u32,
    direction: PolarizationDirection,
    envelope: Envelope,
    alternating: bool,
}

/// Append readout, polarisation and sync rows and drain the table.
fn polarization_readout(
    ctx: &mut GeneratorContext<'_>,
    name: &str,
    polarization: (Block, Ensemble),
    readout: PropiReadout,
) -> Result<Program> {
    if readout.n_pol == 0 || readout.m_read_step == 0 {
        return Err(Error::new(format!(
            "Propi needs at least one polarisation and one readout step, got {} and {}",
            readout.n_pol, readout.m_read_step
        )));
    }
    let read_name = "ppol_read";
    let (read_block, read_ensemble) = Ppol {
        name: read_name.to_string(),
        tau: readout.tau,
        order: readout.order,
        direction: readout.direction,
        envelope: readout.envelope,
        gate_readout: true,
        alternating: readout.alternating,
    }
    .segment(ctx)?;
    let read_length = read_ensemble.measurement.counting_length;
    let (pol_block, pol_ensemble) = polarization;
    let pol_name = pol_ensemble.name().to_string();
    let pol_lasers = pol_ensemble.measurement.number_of_lasers;
    let (sync_block, sync_ensemble) = ctx.sync_segment("sync_trig")?;

    ctx.table.append(
        read_name,
        [read_block],
        [read_ensemble],
        FlowControl::repeated(readout.m_read_step - 1),
    );
    ctx.table.append(
        &pol_name,
        [pol_block],
        [pol_ensemble],
        FlowControl::repeated(readout.n_pol - 1),
    );
    ctx.table.append(
        "sync_trig",
        [sync_block],
        [sync_ensemble],
        FlowControl::default(),
    );
    let mut table = ctx.table.finalize(name, false)?;

    let counting_length = read_length * f64::from(readout.m_read_step);
    pulsed_log::diagnostic!(
        "Counting length {counting_length} for {} readout steps of '{read_name}'",
        readout.m_read_step
    );
    let steps = (1..=readout.m_read_step).map(f64::from).collect();
    table.sequence.measurement = MeasurementInfo::points(steps, readout.alternating)
        .with_units("", "")
        .with_labels("Depol. step", "Signal")
        .with_ignored_lasers(readout.n_pol as usize * pol_lasers)
        .with_counting_length(counting_length);
    Ok(Program::from_table(table))
}

/// PulsePol initialisation followed by a PulsePol readout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpolPropi {
    pub name: String,
    pub n_pol: u32,
    pub m_read_step: u32,
    pub tau_ppol: f64,
    pub order_ppol: u32,
    pub envelope: Envelope,
    pub alternating: bool,
}

impl Default for PpolPropi {
    fn default() -> Self {
        PpolPropi {
            name: "ppol_2x_propi".to_string(),
            n_pol: 100,
            m_read_step: 20,
            tau_ppol: 500e-9,
            order_ppol: 1,
            envelope: Envelope::default(),
            alternating: true,
        }
    }
}

impl Protocol for PpolPropi {
    const KIND: ProtocolKind = ProtocolKind::PpolPropi;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        ctx.table.reset();
        let polarization = Ppol {
            name: "ppol_init_up".to_string(),
            tau: self.tau_ppol,
            order: self.order_ppol,
            direction: PolarizationDirection::Up,
            envelope: self.envelope,
            gate_readout: false,
            alternating: false,
        }
        .segment(ctx)?;
        let readout = PropiReadout {
            n_pol: self.n_pol,
            m_read_step: self.m_read_step,
            tau: self.tau_ppol,
            order: self.order_ppol,
            direction: PolarizationDirection::Down,
            envelope: self.envelope,
            alternating: self.alternating,
        };
        polarization_readout(ctx, &self.name, polarization, readout)
    }
}

/// RNOVEL initialisation (resonant decoupling with a 90° dressing drive)
/// followed by a PulsePol readout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RnovelPpolPropi {
    pub name: String,
    pub dd_mol_tau: f64,
    pub dd_mol_order: u32,
    pub dd_mol_ampl: f64,
    pub dd_mol_type: DdType,
    /// Rabi period of rectangular decoupling pulses; 0 uses the shaped
    /// pulses of the common Rabi period.
    pub dd_t_rabi_rect: f64,
    pub n_pol: u32,
    pub m_read_step: u32,
    pub tau_ppol: f64,
    pub order_ppol: u32,
    pub envelope: Envelope,
    pub alternating: bool,
}

impl Default for RnovelPpolPropi {
    fn default() -> Self {
        RnovelPpolPropi {
            name: "rnovel_ppol_propi".to_string(),
            dd_mol_tau: 500e-9,
            dd_mol_order: 10,
            dd_mol_ampl: 0.1,
            dd_mol_type: DdType::Cpmg,
            dd_t_rabi_rect: 0.0,
            n_pol: 100,
            m_read_step: 20,
            tau_ppol: 500e-9,
            order_ppol: 1,
            envelope: Envelope::default(),
            alternating: true,
        }
    }
}

impl Protocol for RnovelPpolPropi {
    const KIND: ProtocolKind = ProtocolKind::RnovelPpolPropi;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        ctx.table.reset();
        let rectangular = self.dd_t_rabi_rect > 0.0;
        let (rabi_period, envelope) = if rectangular {
            pulsed_log::info!(
                "Generating RNOVEL with rectangular pulses, the readout uses {:?}",
                self.envelope.kind
            );
            (seconds(self.dd_t_rabi_rect), Envelope::default())
        } else {
            (ctx.settings.rabi_period(), self.envelope)
        };
        let polarization = DdMollow {
            name: "rnovel_init_up".to_string(),
            tau: self.dd_mol_tau,
            dd_type: self.dd_mol_type,
            dd_order: self.dd_mol_order,
            weak_amplitude: self.dd_mol_ampl,
            weak_detuning: 0.0,
            phase_modulation: vec![90.0; self.dd_mol_type.suborder()],
            envelope,
            shaped_weak_drive: true,
            alternating: false,
        }
        .segment(ctx, rabi_period)?;
        let readout = PropiReadout {
            n_pol: self.n_pol,
            m_read_step: self.m_read_step,
            tau: self.tau_ppol,
            order: self.order_ppol,
            direction: PolarizationDirection::Down,
            envelope: self.envelope,
            alternating: self.alternating,
        };
        polarization_readout(ctx, &self.name, polarization, readout)
    }
}

/// Integrated solid effect initialisation followed by a PulsePol readout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsePpolPropi {
    pub name: String,
    pub t_ise: f64,
    pub df_mw_sweep: f64,
    pub mw_sweep_speed: f64,
    pub amp_mw_sweep: f64,
    pub n_pol: u32,
    pub m_read_step: u32,
    pub tau_ppol: f64,
    pub order_ppol: u32,
    pub ppol_read_dir: PolarizationDirection,
    pub envelope: Envelope,
    pub alternating: bool,
}

impl Default for IsePpolPropi {
    fn default() -> Self {
        IsePpolPropi {
            name: "ise_ppol_propi".to_string(),
            t_ise: 1e-6,
            df_mw_sweep: 10e6,
            mw_sweep_speed: 3e12,
            amp_mw_sweep: 0.25,
            n_pol: 100,
            m_read_step: 20,
            tau_ppol: 500e-9,
            order_ppol: 1,
            ppol_read_dir: PolarizationDirection::Up,
            envelope: Envelope::default(),
            alternating: true,
        }
    }
}

impl Protocol for IsePpolPropi {
    const KIND: ProtocolKind = ProtocolKind::IsePpolPropi;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        ctx.table.reset();
        let polarization = ChirpedSweep {
            name: "ise_init_down".to_string(),
            t_ise: self.t_ise,
            sweep_width: self.df_mw_sweep,
            sweep_speed: self.mw_sweep_speed,
            amplitude: self.amp_mw_sweep,
            center_frequency: None,
            both_polarities: false,
        }
        .segment(ctx)?;
        let readout = PropiReadout {
            n_pol: self.n_pol,
            m_read_step: self.m_read_step,
            tau: self.tau_ppol,
            order: self.order_ppol,
            direction: self.ppol_read_dir,
            envelope: self.envelope,
            alternating: self.alternating,
        };
        polarization_readout(ctx, &self.name, polarization, readout)
    }
}

#[cfg(test)]
mod tests {
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

    fn phases(elements: &[Element]) -> Vec<f64> {
        elements
            .iter()
            .filter_map(|e| match e.analog {
                Some(AnalogWaveform::Sine { phase, .. }) => Some(phase),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ppol_directions() {
        let settings = GeneratorSettings::default();
        let up = build(&Ppol::default(), &settings).unwrap();
        let block = &up.blocks[0];
        // 2 cycles of 10 elements, readout, 2 cycles, readout
        assert_eq!(block.len(), 2 * (20 + 3));
        assert_eq!(
            phases(&block.elements()[..10]),
            vec![180.0, 90.0, 180.0, 90.0, 0.0, 90.0]
        );
        // last pulse before the second readout is flipped to -y
        assert_eq!(phases(&block.elements()[42..43]), vec![270.0]);
        assert_eq!(up.ensembles[0].measurement.number_of_lasers, 2);

        let down = Ppol {
            direction: PolarizationDirection::Down,
            alternating: false,
            ..Default::default()
        };
        let block = build(&down, &settings).unwrap().blocks.remove(0);
        assert_eq!(block.len(), 23);
        assert_eq!(phases(&block.elements()[..1]), vec![90.0]);
    }

    #[test]
    fn test_ppol_tau_too_short() {
        let settings = GeneratorSettings::default();
        let ppol = Ppol {
            tau: 50e-9,
            ..Default::default()
        };
        assert!(matches!(
            build(&ppol, &settings),
            Err(Error::Compiler(pulsed_compiler::Error::InfeasibleTiming { .. }))
        ));
    }

    #[test]
    fn test_ungated_readout() {
        let settings = GeneratorSettings {
            gate_channel: Some("d_ch4".to_string()),
            ..Default::default()
        };
        let ppol = Ppol {
            gate_readout: false,
            alternating: false,
            ..Default::default()
        };
        let block = build(&ppol, &settings).unwrap().blocks.remove(0);
        let laser = &block.elements()[20];
        assert_eq!(laser.digital_high, vec![true, false, false, false]);
        // the delay keeps the gate
        assert_eq!(block.elements()[21].digital_high, vec![false, false, false, true]);
    }

    #[test]
    fn test_propi_rows() {
        let settings = GeneratorSettings::default();
        let program = build(&PpolPropi::default(), &settings).unwrap();
        let sequence = &program.sequences[0];
        assert_eq!(sequence.repetitions(), vec![19, 99, 0]);
        assert_eq!(
            sequence.ensemble_names().collect::<Vec<_>>(),
            vec!["ppol_read", "ppol_init_up", "sync_trig"]
        );
        let info = &sequence.measurement;
        assert_eq!(info.controlled_variable.len(), 20);
        assert_eq!(info.controlled_variable[19], 20.0);
        assert_eq!(info.number_of_lasers, 140);
        assert_eq!(info.laser_ignore_list, (40..140).collect::<Vec<_>>());
        assert_eq!(info.labels.0, "Depol. step");
        let read = program.ensemble("ppol_read").unwrap();
        assert_eq!(info.counting_length, read.measurement.counting_length * 20.0);
    }

    #[test]
    fn test_propi_variants_share_the_readout() {
        let settings = GeneratorSettings::default();
        let rnovel = build(&RnovelPpolPropi::default(), &settings).unwrap();
        assert_eq!(
            rnovel.sequences[0].ensemble_names().collect::<Vec<_>>(),
            vec!["ppol_read", "rnovel_init_up", "sync_trig"]
        );
        let ise = build(
            &IsePpolPropi {
                n_pol: 10,
                m_read_step: 5,
                alternating: false,
                ..Default::default()
            },
            &settings,
        )
        .unwrap();
        let info = &ise.sequences[0].measurement;
        assert_eq!(ise.sequences[0].repetitions(), vec![4, 9, 0]);
        assert_eq!(info.number_of_lasers, 15);
        assert_eq!(info.laser_ignore_list, (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_propi_needs_steps() {
        let settings = GeneratorSettings::default();
        let propi = PpolPropi {
            m_read_step: 0,
            ..Default::default()
        };
        assert!(build(&propi, &settings).is_err());
    }
}
