// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Measurement bookkeeping attached to ensembles and sequences.
//!
//! The acquisition layer slices the raw counter trace by laser pulses. It needs
//! to know how many laser pulses a program emits, which of them carry no
//! signal (initialisation, polarisation, calibration) and which value of the
//! swept parameter every remaining data point belongs to.

use indexmap::IndexMap;
use pulsed_units::{Duration, Seconds};

use crate::ir::{Block, Ensemble};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementInfo {
    pub alternating: bool,
    /// One value per logical data point, not duplicated for alternating readout.
    pub controlled_variable: Vec<f64>,
    pub units: (String, String),
    pub labels: (String, String),
    /// Number of physical laser pulses, including the ignored ones.
    pub number_of_lasers: usize,
    /// Indices of laser pulses to exclude from the analysis, sorted.
    pub laser_ignore_list: Vec<usize>,
    pub counting_length: Duration<Seconds>,
}

impl Default for MeasurementInfo {
    fn default() -> Self {
        Self::untagged()
    }
}

impl MeasurementInfo {
    /// Metadata of a segment without any readout, e.g. triggers and idles.
    pub fn untagged() -> Self {
        MeasurementInfo {
            alternating: false,
            controlled_variable: vec![],
            units: ("s".to_string(), String::new()),
            labels: ("Tau".to_string(), "Signal".to_string()),
            number_of_lasers: 0,
            laser_ignore_list: vec![],
            counting_length: Duration::zero(),
        }
    }

    /// One laser per data point, two if the readout alternates.
    pub fn points(controlled_variable: Vec<f64>, alternating: bool) -> Self {
        let per_point = if alternating { 2 } else { 1 };
        MeasurementInfo {
            alternating,
            number_of_lasers: per_point * controlled_variable.len(),
            controlled_variable,
            ..Self::untagged()
        }
    }

    /// Adaptive programs play one swept segment per epoch, so there is a
    /// single laser pulse whatever the number of grid points.
    pub fn per_epoch(controlled_variable: Vec<f64>) -> Self {
        MeasurementInfo {
            number_of_lasers: 1,
            ..Self::points(controlled_variable, false)
        }
    }

    /// `count` laser pulses that all have to be ignored.
    pub fn ignored(count: usize) -> Self {
        Self::untagged().with_ignored_lasers(count)
    }

    /// Append `count` ignored laser pulses after the existing ones.
    pub fn with_ignored_lasers(mut self, count: usize) -> Self {
        let start = self.number_of_lasers;
        self.laser_ignore_list.extend(start..start + count);
        self.number_of_lasers += count;
        self
    }

    pub fn with_units(mut self, x: &str, y: &str) -> Self {
        self.units = (x.to_string(), y.to_string());
        self
    }

    pub fn with_labels(mut self, x: &str, y: &str) -> Self {
        self.labels = (x.to_string(), y.to_string());
        self
    }

    pub fn with_counting_length(mut self, counting_length: Duration<Seconds>) -> Self {
        self.counting_length = counting_length;
        self
    }

    /// Laser pulses that end up as data points.
    pub fn analysed_lasers(&self) -> usize {
        self.number_of_lasers - self.laser_ignore_list.len()
    }

    fn is_tagged(&self) -> bool {
        self.number_of_lasers > 0 || !self.controlled_variable.is_empty()
    }

    /// Metadata of `self` followed by `other` in one program.
    ///
    /// Laser counts and counting lengths add, `other`'s ignore list is shifted
    /// behind the lasers of `self`, controlled variables concatenate. Axis
    /// units and labels come from the first tagged operand.
    pub fn concat(&self, other: &MeasurementInfo) -> MeasurementInfo {
        let shift = self.number_of_lasers;
        let mut laser_ignore_list = self.laser_ignore_list.clone();
        laser_ignore_list.extend(other.laser_ignore_list.iter().map(|idx| idx + shift));
        laser_ignore_list.sort_unstable();
        laser_ignore_list.dedup();

        let axes_from = if self.is_tagged() || !other.is_tagged() {
            self
        } else {
            other
        };
        let mut controlled_variable = self.controlled_variable.clone();
        controlled_variable.extend_from_slice(&other.controlled_variable);

        MeasurementInfo {
            alternating: self.alternating || other.alternating,
            controlled_variable,
            units: axes_from.units.clone(),
            labels: axes_from.labels.clone(),
            number_of_lasers: self.number_of_lasers + other.number_of_lasers,
            laser_ignore_list,
            counting_length: self.counting_length + other.counting_length,
        }
    }
}

/// Total playback time of `ensemble`, counting every block repetition.
///
/// Fails if a referenced block is missing or has a swept (incremented) length.
pub fn counting_length(ensemble: &Ensemble, blocks: &[Block]) -> Result<Duration<Seconds>> {
    let by_name: IndexMap<&str, &Block> = blocks.iter().map(|b| (b.name(), b)).collect();
    ensemble
        .steps()
        .iter()
        .map(|step| {
            let block = by_name.get(step.block.as_str()).ok_or_else(|| {
                Error::InvalidProgram(format!(
                    "Ensemble '{}' references unknown block '{}'",
                    ensemble.name(),
                    step.block
                ))
            })?;
            Ok(block.duration()? * f64::from(step.repetitions + 1))
        })
        .sum()
}
