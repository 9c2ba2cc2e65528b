// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::metadata::MeasurementInfo;

/// Hardware trigger input a sequence row can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerInput {
    #[default]
    Off,
    A,
    B,
}

/// Flow control fields of one sequence table row.
///
/// Row targets are indices into the same sequence; `None` means no jump.
/// `repetitions` counts additional executions, 0 plays the row once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowControl {
    pub repetitions: u32,
    pub event_trigger: TriggerInput,
    pub event_jump_to: Option<usize>,
    pub wait_for: TriggerInput,
    pub go_to: Option<usize>,
}

impl FlowControl {
    pub fn repeated(repetitions: u32) -> Self {
        FlowControl {
            repetitions,
            ..Default::default()
        }
    }

    /// Row targets referenced by this row.
    pub fn targets(&self) -> impl Iterator<Item = usize> {
        self.event_jump_to.into_iter().chain(self.go_to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceStep {
    pub ensemble: String,
    pub flow: FlowControl,
}

/// The ordered, branchable program; the row index is the position in `steps`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: String,
    pub steps: Vec<SequenceStep>,
    pub rotating_frame: bool,
    pub measurement: MeasurementInfo,
}

impl Sequence {
    pub fn repetitions(&self) -> Vec<u32> {
        self.steps.iter().map(|s| s.flow.repetitions).collect()
    }

    pub fn ensemble_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.ensemble.as_str())
    }
}
