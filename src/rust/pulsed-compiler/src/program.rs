// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use crate::device_traits::DeviceTraits;
use crate::ir::{Block, Ensemble, Sequence};
use crate::jump_table::{JumpAddressResolver, JumpTable};
use crate::metadata::MeasurementInfo;
use crate::sequence_table::{SequenceTable, dedup_by_name};
use crate::{EntityKind, Error, Result};

/// Output of one build, handed over to the hardware loader as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub blocks: Vec<Block>,
    pub ensembles: Vec<Ensemble>,
    pub sequences: Vec<Sequence>,
    pub jump_table: Option<JumpTable>,
    pub resolver: Option<JumpAddressResolver>,
}

impl Program {
    /// A single loadable waveform without sequence table.
    pub fn single(block: Block, ensemble: Ensemble) -> Self {
        Program {
            blocks: vec![block],
            ensembles: vec![ensemble],
            ..Default::default()
        }
    }

    pub fn from_table(table: SequenceTable) -> Self {
        Program {
            blocks: table.blocks,
            ensembles: table.ensembles,
            sequences: vec![table.sequence],
            jump_table: table.jump_table,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: JumpAddressResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name() == name)
    }

    pub fn ensemble(&self, name: &str) -> Option<&Ensemble> {
        self.ensembles.iter().find(|e| e.name() == name)
    }

    /// Metadata the acquisition needs: the sequence's if there is one, else the
    /// one of the last ensemble.
    pub fn measurement(&self) -> Option<&MeasurementInfo> {
        self.sequences
            .last()
            .map(|s| &s.measurement)
            .or_else(|| self.ensembles.last().map(|e| &e.measurement))
    }

    /// Check everything the hardware loader relies on.
    pub fn check_loadable(&self, device: &DeviceTraits) -> Result<()> {
        let blocks = dedup_by_name(self.blocks.clone(), EntityKind::Block, |b| b.name())?;
        let ensembles =
            dedup_by_name(self.ensembles.clone(), EntityKind::Ensemble, |e| e.name())?;
        if blocks.len() != self.blocks.len() || ensembles.len() != self.ensembles.len() {
            return Err(Error::InvalidProgram(
                "Blocks and ensembles must be unique by name".to_string(),
            ));
        }

        for block in &self.blocks {
            self.check_block(block, device)?;
        }

        let block_names: HashSet<&str> = self.blocks.iter().map(Block::name).collect();
        for ensemble in &self.ensembles {
            if let Some(missing) = ensemble.block_names().find(|b| !block_names.contains(b)) {
                return Err(Error::InvalidProgram(format!(
                    "Ensemble '{}' references unknown block '{missing}'",
                    ensemble.name()
                )));
            }
            check_measurement(ensemble.name(), &ensemble.measurement)?;
        }

        let ensemble_names: HashSet<&str> = self.ensembles.iter().map(Ensemble::name).collect();
        let mut sequence_names = HashSet::new();
        for sequence in &self.sequences {
            if !sequence_names.insert(sequence.name.as_str()) {
                return Err(Error::NameConflict {
                    kind: EntityKind::Sequence,
                    name: sequence.name.clone(),
                });
            }
            if sequence.steps.is_empty() {
                return Err(Error::InvalidProgram(format!(
                    "Sequence '{}' has no rows",
                    sequence.name
                )));
            }
            for (index, step) in sequence.steps.iter().enumerate() {
                if !ensemble_names.contains(step.ensemble.as_str()) {
                    return Err(Error::InvalidProgram(format!(
                        "Row {index} of sequence '{}' plays unknown ensemble '{}'",
                        sequence.name, step.ensemble
                    )));
                }
                if step.flow.targets().any(|t| t >= sequence.steps.len()) {
                    return Err(Error::InvalidProgram(format!(
                        "Row {index} of sequence '{}' jumps outside the sequence",
                        sequence.name
                    )));
                }
            }
            check_measurement(&sequence.name, &sequence.measurement)?;
        }
        Ok(())
    }

    fn check_block(&self, block: &Block, device: &DeviceTraits) -> Result<()> {
        if block.is_empty() {
            return Err(Error::InvalidProgram(format!(
                "Block '{}' has no elements",
                block.name()
            )));
        }
        let channel_count = device.digital_channels.len();
        if let Some(element) = block
            .elements()
            .iter()
            .find(|e| e.digital_high.len() != channel_count)
        {
            return Err(Error::InvalidProgram(format!(
                "Block '{}' contains an element with {} digital channels, the device has {channel_count}",
                block.name(),
                element.digital_high.len()
            )));
        }
        let samples = block.sample_count(device.sample_rate)?;
        if samples < i64::from(device.min_waveform_samples) {
            return Err(Error::InvalidProgram(format!(
                "Block '{}' has {samples} samples, the device minimum is {}",
                block.name(),
                device.min_waveform_samples
            )));
        }
        Ok(())
    }
}

fn check_measurement(owner: &str, info: &MeasurementInfo) -> Result<()> {
    if info.counting_length.is_negative() {
        return Err(Error::InvalidProgram(format!(
            "'{owner}' has a negative counting length"
        )));
    }
    if let Some(idx) = info
        .laser_ignore_list
        .iter()
        .find(|&&idx| idx >= info.number_of_lasers)
    {
        return Err(Error::InvalidProgram(format!(
            "'{owner}' ignores laser {idx} but only emits {} lasers",
            info.number_of_lasers
        )));
    }
    Ok(())
}
