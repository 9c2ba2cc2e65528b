// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Sample-grid quantization bound to the constraints of one device.

use pulsed_units::sample_grid::{self, Samples, samples_to_length};
use pulsed_units::{Duration, Seconds};

use crate::Result;
use crate::device_traits::DeviceTraits;
use crate::element_factory::ElementFactory;
use crate::ir::Block;

/// Where padding is inserted into a too short block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Keeps the timing of the block end (readout, triggers) unchanged.
    #[default]
    Prepend,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleClock {
    pub sample_rate: f64,
    pub min_waveform_samples: u32,
}

impl SampleClock {
    pub fn new(sample_rate: f64, min_waveform_samples: u32) -> Self {
        SampleClock {
            sample_rate,
            min_waveform_samples,
        }
    }

    pub fn for_device(traits: &DeviceTraits) -> Self {
        Self::new(traits.sample_rate, traits.min_waveform_samples)
    }

    /// Nearest duration spanning a multiple of `granularity` samples.
    pub fn quantize(&self, duration: Duration<Seconds>, granularity: u32) -> Duration<Seconds> {
        sample_grid::quantize(duration, granularity, self.sample_rate)
    }

    /// Whether `duration` already spans a multiple of `granularity` samples.
    pub fn is_on_grid(&self, duration: Duration<Seconds>, granularity: u32) -> bool {
        let units = duration.value() * self.sample_rate / f64::from(granularity.max(1));
        (units - units.round()).abs() < 1e-6
    }

    pub fn samples(&self, duration: Duration<Seconds>) -> Samples {
        sample_grid::length_to_samples(duration.value(), self.sample_rate)
    }

    pub fn min_waveform_length(&self) -> Duration<Seconds> {
        samples_to_length(self.min_waveform_samples.into(), self.sample_rate)
    }

    /// Pad `block` with an idle element up to the minimum waveform length.
    ///
    /// Blocks that are long enough are returned unchanged.
    pub fn pad_to_min_samples(
        &self,
        mut block: Block,
        placement: Placement,
        factory: &dyn ElementFactory,
    ) -> Result<Block> {
        let samples = block.sample_count(self.sample_rate)?;
        let min_samples = Samples::from(self.min_waveform_samples);
        if samples >= min_samples {
            return Ok(block);
        }
        let missing = samples_to_length(min_samples, self.sample_rate) - block.duration()?;
        let idle = factory.make_idle_element(missing)?;
        match placement {
            Placement::Prepend => block.insert(0, idle),
            Placement::Append => block.push(idle),
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element_factory::DefaultElementFactory;
    use pulsed_units::seconds;

    fn trigger_block(factory: &DefaultElementFactory, t: f64) -> Block {
        let mut block = Block::new("trigger");
        block.push(factory.make_trigger_element(seconds(t), &["d_ch1"]).unwrap());
        block
    }

    #[test]
    fn test_padding_reaches_minimum() {
        let clock = SampleClock::new(12e9, 320);
        let factory = DefaultElementFactory::new(["d_ch1"]);
        let block = trigger_block(&factory, 10e-9);
        assert_eq!(block.sample_count(12e9).unwrap(), 120);

        let padded = clock
            .pad_to_min_samples(block, Placement::Prepend, &factory)
            .unwrap();
        assert_eq!(padded.len(), 2);
        assert!(padded.elements()[0].is_idle());
        assert_eq!(padded.sample_count(12e9).unwrap(), 320);
    }

    #[test]
    fn test_append_placement() {
        let clock = SampleClock::new(1e9, 30);
        let factory = DefaultElementFactory::new(["d_ch1"]);
        let padded = clock
            .pad_to_min_samples(trigger_block(&factory, 5e-9), Placement::Append, &factory)
            .unwrap();
        assert!(padded.elements()[1].is_idle());
        assert_eq!(padded.sample_count(1e9).unwrap(), 30);
    }

    #[test]
    fn test_sufficient_block_is_unchanged() {
        let clock = SampleClock::new(12e9, 320);
        let factory = DefaultElementFactory::new(["d_ch1"]);
        let block = trigger_block(&factory, 1e-6);
        let padded = clock
            .pad_to_min_samples(block.clone(), Placement::Prepend, &factory)
            .unwrap();
        assert_eq!(padded, block);
        let again = clock
            .pad_to_min_samples(padded.clone(), Placement::Prepend, &factory)
            .unwrap();
        assert_eq!(again, padded);
    }

    #[test]
    fn test_quantize_on_device_grid() {
        let clock = SampleClock::new(12e9, 320);
        let q = clock.quantize(seconds(100e-9), 8);
        assert_eq!(clock.samples(q) % 8, 0);
        assert_eq!(clock.quantize(q, 8), q);
        assert!(clock.is_on_grid(q, 8));
        assert!(!clock.is_on_grid(seconds(100.5e-9), 8));
        assert_eq!(clock.min_waveform_length(), seconds(320.0 / 12e9));
    }
}
