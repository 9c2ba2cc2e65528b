// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::metadata::MeasurementInfo;

/// One block reference inside an ensemble.
///
/// `repetitions` counts *additional* plays: 0 plays the block once.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleStep {
    pub block: String,
    pub repetitions: u32,
}

/// A loadable waveform built from repeated blocks, tagged with analysis metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    name: String,
    steps: Vec<EnsembleStep>,
    pub rotating_frame: bool,
    pub measurement: MeasurementInfo,
}

impl Ensemble {
    pub fn new(name: impl Into<String>, rotating_frame: bool) -> Self {
        Ensemble {
            name: name.into(),
            steps: vec![],
            rotating_frame,
            measurement: MeasurementInfo::untagged(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[EnsembleStep] {
        &self.steps
    }

    pub fn push(&mut self, block: impl Into<String>, repetitions: u32) {
        self.steps.push(EnsembleStep {
            block: block.into(),
            repetitions,
        });
    }

    pub fn with_measurement(mut self, measurement: MeasurementInfo) -> Self {
        self.measurement = measurement;
        self
    }

    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.block.as_str())
    }
}
