// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Adaptive Ramsey and XY8 tables for externally controlled pattern jumps.
//!
//! Every grid point becomes one sequence row an adaptive controller can jump
//! to. The sequencer idles until the controller picks the next point, plays
//! it, emits `epoch_done` and returns to the idle row. Row positions follow
//! the device's [`RowLayout`](pulsed_compiler::jump_table::RowLayout).

use pulsed_compiler::Program;
use pulsed_compiler::device_traits::SequencerKind;
use pulsed_compiler::ir::{Block, Ensemble, FlowControl, TriggerInput};
use pulsed_compiler::jump_table::{Grid2d, JumpAddressResolver, SweepGrid};
use pulsed_compiler::metadata::MeasurementInfo;
use pulsed_units::{Duration, Seconds};
use serde::Deserialize;

use super::free_precession::{ramsey_segment, xy8_segment};
use super::{Protocol, ProtocolKind};
use crate::context::GeneratorContext;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternJump {
    pub name: String,
    /// Free evolution times of the sweep.
    pub taus: Vec<f64>,
    /// XY8 orders; builds a Ramsey table if unset.
    pub orders: Option<Vec<u32>>,
    pub readout_phase: f64,
    /// Readout of the swept segments, the rig settings if unset.
    pub laser_length: Option<f64>,
    pub wait_length: Option<f64>,
}

impl Default for PatternJump {
    fn default() -> Self {
        PatternJump {
            name: "pattern_jump".to_string(),
            taus: vec![0.0, 250e-9, 500e-9, 750e-9, 1e-6],
            orders: None,
            readout_phase: 0.0,
            laser_length: None,
            wait_length: None,
        }
    }
}

impl PatternJump {
    /// Swept segments in flattened grid order.
    fn swept_segments(
        &self,
        ctx: &GeneratorContext<'_>,
    ) -> Result<(SweepGrid, Vec<(Block, Ensemble)>)> {
        let readout = ctx.readout_timing(self.laser_length, self.wait_length);
        let Some(orders) = &self.orders else {
            let segments = self
                .taus
                .iter()
                .enumerate()
                .map(|(i, &tau)| {
                    ramsey_segment(
                        ctx,
                        &format!("ramsey_{i}"),
                        tau,
                        self.readout_phase,
                        readout,
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok((SweepGrid::Linear(self.taus.clone()), segments));
        };
        let grid = Grid2d::new(
            self.taus.clone(),
            orders.iter().copied().map(f64::from).collect(),
        )?;
        let mut segments = Vec::with_capacity(grid.len());
        for (order_idx, &order) in orders.iter().enumerate() {
            for (time_idx, &tau) in self.taus.iter().enumerate() {
                let flat = grid.flatten(time_idx, order_idx);
                segments.push(xy8_segment(
                    ctx,
                    &format!("xy8_{flat}"),
                    tau,
                    order,
                    self.readout_phase,
                    readout,
                )?);
            }
        }
        Ok((SweepGrid::Rectangular(grid), segments))
    }
}

impl Protocol for PatternJump {
    const KIND: ProtocolKind = ProtocolKind::PatternJump;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        ctx.table.reset();
        if self.taus.is_empty() {
            return Err(Error::new("Pattern jump needs at least one tau"));
        }
        let (grid, segments) = self.swept_segments(ctx)?;
        let (idle_block, idle_ensemble) = ctx.idle_segment("idle")?;
        let (done_block, done_ensemble) = ctx.sync_segment("epoch_done")?;
        let layout = ctx.device.row_layout();

        let idle_row = match ctx.device.sequencer {
            SequencerKind::Branching => {
                let (init_block, init_ensemble) = ctx.laser_wait_segment(
                    "init",
                    ctx.settings.laser_length(),
                    ctx.settings.wait_time(),
                )?;
                let (sync_block, sync_ensemble) = ctx.sync_segment("sync")?;
                ctx.table
                    .append("init", [init_block], [init_ensemble], FlowControl::default());
                ctx.table
                    .append("sync", [sync_block], [sync_ensemble], FlowControl::default());
                let idle_row = ctx.table.current_index();
                ctx.table.append(
                    "idle",
                    [idle_block],
                    [idle_ensemble],
                    FlowControl {
                        wait_for: TriggerInput::A,
                        event_trigger: TriggerInput::A,
                        go_to: Some(idle_row),
                        ..Default::default()
                    },
                );
                idle_row
            }
            SequencerKind::Linear => {
                let idle_row = ctx.table.current_index();
                ctx.table.append(
                    "idle",
                    [idle_block],
                    [idle_ensemble],
                    FlowControl {
                        go_to: Some(idle_row),
                        ..Default::default()
                    },
                );
                idle_row
            }
        };
        let back_to_idle = FlowControl {
            go_to: Some(idle_row),
            ..Default::default()
        };
        ctx.table.append(
            "epoch_done",
            [done_block.clone()],
            [done_ensemble.clone()],
            back_to_idle,
        );
        debug_assert_eq!(ctx.table.current_index(), layout.prefix_rows());

        let mut counting_length: Duration<Seconds> = Duration::zero();
        for (block, ensemble) in segments {
            counting_length = counting_length.max(ensemble.measurement.counting_length);
            let name = ensemble.name().to_string();
            ctx.table.register_jump_target(&name)?;
            ctx.table
                .append(&name, [block], [ensemble], FlowControl::default());
            ctx.table.append(
                "epoch_done",
                [done_block.clone()],
                [done_ensemble.clone()],
                back_to_idle,
            );
        }
        let mut table = ctx.table.finalize(&self.name, true)?;
        pulsed_log::diagnostic!(
            "Pattern jump table '{}' with {} rows, swept rows start at {}",
            self.name,
            table.sequence.steps.len(),
            layout.row(0)
        );

        let times = match &grid {
            SweepGrid::Linear(taus) => taus.clone(),
            SweepGrid::Rectangular(grid) => grid.points().map(|(time, _)| time).collect(),
        };
        table.sequence.measurement = MeasurementInfo::per_epoch(times)
            .with_units("s", "")
            .with_labels("tau", "Signal")
            .with_counting_length(counting_length);

        let resolver = JumpAddressResolver::new(grid, layout, table.jump_table.clone())?;
        Ok(Program::from_table(table).with_resolver(resolver))
    }
}

#[cfg(test)]
mod tests {
    use pulsed_compiler::device_traits::DeviceKind;
    use pulsed_compiler::jump_table::NO_JUMP_ADDRESS;
    use pulsed_compiler::{DefaultElementFactory, GeneratorSettings, SequenceTableBuilder};

    use super::*;

    fn build(protocol: &PatternJump, device: DeviceKind) -> Result<Program> {
        let settings = GeneratorSettings {
            device,
            ..Default::default()
        };
        let traits = settings.device.traits();
        let factory = DefaultElementFactory::for_device(traits);
        let mut table = SequenceTableBuilder::new(traits.jump_addressing);
        let mut ctx = GeneratorContext::new(&settings, &factory, &mut table);
        protocol.generate(&mut ctx)
    }

    #[test]
    fn test_branching_ramsey_table() {
        let program = build(&PatternJump::default(), DeviceKind::AWG8190).unwrap();
        let sequence = &program.sequences[0];
        assert_eq!(
            sequence.ensemble_names().take(6).collect::<Vec<_>>(),
            vec!["init", "sync", "idle", "epoch_done", "ramsey_0", "epoch_done"]
        );
        assert_eq!(sequence.steps.len(), 4 + 2 * 5);
        assert_eq!(sequence.steps[2].flow.wait_for, TriggerInput::A);
        assert_eq!(sequence.steps[2].flow.go_to, Some(2));
        assert_eq!(sequence.steps[5].flow.go_to, Some(2));

        let resolver = program.resolver.as_ref().unwrap();
        let jump = resolver.resolve(260e-9);
        assert_eq!(jump.row, 6);
        assert_eq!(jump.address, 6);
        assert_eq!(jump.time, 250e-9);
        assert_eq!(sequence.steps[jump.row].ensemble, "ramsey_1");
        assert_eq!(sequence.measurement.number_of_lasers, 1);
        assert_eq!(sequence.measurement.controlled_variable.len(), 5);
        // epoch_done is stored once
        assert_eq!(program.ensembles.len(), 4 + 5);
    }

    #[test]
    fn test_linear_xy8_grid() {
        let jump = PatternJump {
            taus: vec![200e-9, 400e-9],
            orders: Some(vec![1, 2, 4]),
            ..Default::default()
        };
        let program = build(&jump, DeviceKind::M3202A).unwrap();
        let sequence = &program.sequences[0];
        assert_eq!(sequence.ensemble_names().next(), Some("idle"));
        assert_eq!(sequence.steps.len(), 2 + 2 * 6);

        let resolver = program.resolver.as_ref().unwrap();
        let jump = resolver.resolve_with_order(390e-9, 2.0);
        assert_eq!(jump.row, 2 + 2 * 3);
        assert_eq!(jump.order, Some(2.0));
        assert_eq!(sequence.steps[jump.row].ensemble, "xy8_3");
        let xy8_3 = program.ensemble("xy8_3").unwrap();
        assert_eq!(xy8_3.measurement.controlled_variable, vec![400e-9]);
        // the idle row is no jump target
        assert_eq!(resolver.resolve(200e-9).address, 2);
        assert_eq!(
            program.jump_table.as_ref().unwrap().address_of_row(0),
            None
        );
        assert_ne!(resolver.address_for(1.0), NO_JUMP_ADDRESS);
    }

    #[test]
    fn test_explicit_addresses() {
        let program = build(&PatternJump::default(), DeviceKind::AWG70K).unwrap();
        let jump_table = program.jump_table.as_ref().unwrap();
        assert_eq!(jump_table.addresses(), vec![1, 2, 3, 4, 5]);
        assert_eq!(jump_table.rows(), vec![4, 6, 8, 10, 12]);
        assert_eq!(program.resolver.as_ref().unwrap().address_for(1e-6), 5);
    }

    #[test]
    fn test_empty_sweep() {
        let jump = PatternJump {
            taus: vec![],
            ..Default::default()
        };
        assert!(build(&jump, DeviceKind::AWG8190).is_err());
    }

    #[test]
    fn test_swept_readout_override() {
        let rig = build(&PatternJump::default(), DeviceKind::AWG8190).unwrap();
        let short = PatternJump {
            laser_length: Some(1.5e-6),
            ..Default::default()
        };
        let short = build(&short, DeviceKind::AWG8190).unwrap();
        let length = |program: &Program| program.sequences[0].measurement.counting_length;
        assert!(length(&short) < length(&rig));
        // init keeps the rig wide laser
        assert_eq!(short.block("init"), rig.block("init"));
    }
}
