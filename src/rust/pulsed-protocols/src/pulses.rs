// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Pulse and readout building blocks shared by the protocols.

use pulsed_compiler::ir::{Block, Element, Ensemble, Envelope};
use pulsed_compiler::metadata::{MeasurementInfo, counting_length};
use pulsed_compiler::settings::READOUT_EDGE_MARGIN;
use pulsed_compiler::timing::Placement;
use pulsed_compiler::{Error, Result};
use pulsed_units::{Duration, Seconds, seconds};

use crate::context::GeneratorContext;

pub(crate) const PHASE_X: f64 = 0.0;
pub(crate) const PHASE_Y: f64 = 90.0;
pub(crate) const PHASE_MINUS_X: f64 = 180.0;
pub(crate) const PHASE_MINUS_Y: f64 = 270.0;

/// Laser and wait time of a single shot readout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ReadoutTiming {
    pub laser_length: Duration<Seconds>,
    pub wait: Duration<Seconds>,
}

impl GeneratorContext<'_> {
    /// Resonant drive pulse with the configured amplitude and frequency.
    pub(crate) fn drive(
        &self,
        duration: Duration<Seconds>,
        phase: f64,
        envelope: Envelope,
    ) -> Result<Element> {
        self.factory.make_drive_element(
            duration,
            self.settings.microwave_amplitude,
            self.settings.microwave_frequency,
            phase,
            envelope,
        )
    }

    pub(crate) fn idle(&self, duration: Duration<Seconds>) -> Result<Element> {
        self.factory.make_idle_element(duration)
    }

    pub(crate) fn trigger(&self, duration: Duration<Seconds>, channels: &[&str]) -> Result<Element> {
        self.factory.make_trigger_element(duration, channels)
    }

    fn laser_channels(&self, gated: bool) -> Vec<&str> {
        let mut channels = vec![self.settings.laser_channel.as_str()];
        if gated {
            channels.extend(self.settings.gate_channel.as_deref());
        }
        channels
    }

    /// Laser pulse, with the counter gate high if a gate channel is configured.
    pub(crate) fn laser_gate(&self, duration: Duration<Seconds>) -> Result<Element> {
        self.trigger(duration, &self.laser_channels(true))
    }

    pub(crate) fn laser(&self, duration: Duration<Seconds>) -> Result<Element> {
        self.trigger(duration, &self.laser_channels(false))
    }

    /// Waits for the laser delay, keeping the counter gate open.
    pub(crate) fn delay_gate(&self) -> Result<Element> {
        let gate: Vec<&str> = self.settings.gate_channel.as_deref().into_iter().collect();
        self.trigger(self.settings.laser_delay(), &gate)
    }

    /// Laser, delay and wait elements closing a measurement.
    pub(crate) fn readout_elements(&self) -> Result<Vec<Element>> {
        Ok(vec![
            self.laser_gate(self.settings.laser_length())?,
            self.delay_gate()?,
            self.idle(self.settings.wait_time())?,
        ])
    }

    /// Readout timing with per-protocol overrides, the settings otherwise.
    pub(crate) fn readout_timing(
        &self,
        laser_length: Option<f64>,
        wait: Option<f64>,
    ) -> ReadoutTiming {
        ReadoutTiming {
            laser_length: laser_length.map_or_else(|| self.settings.laser_length(), seconds),
            wait: wait.map_or_else(|| self.settings.wait_time(), seconds),
        }
    }

    /// Readout of single shot protocols, timed for counters triggering on the
    /// falling edge of the gate or sync pulse.
    pub(crate) fn fast_counter_readout(&self, timing: ReadoutTiming) -> Result<Vec<Element>> {
        let margin = seconds(READOUT_EDGE_MARGIN);
        let delay = self.settings.laser_delay();
        if delay < margin {
            return Err(Error::infeasible("Readout laser delay", delay, margin));
        }
        let head = delay - margin;
        let mut elements = vec![];
        if self.settings.gate_channel.is_some() {
            elements.push(self.laser_gate(head)?);
        }
        if let Some(sync) = self.settings.sync_channel.as_deref() {
            elements.push(self.trigger(head, &[sync, self.settings.laser_channel.as_str()])?);
        }
        let laser = timing.laser_length - head;
        if laser.is_negative() {
            return Err(Error::infeasible("Readout laser length", timing.laser_length, head));
        }
        elements.push(self.laser(laser)?);
        elements.push(self.idle(delay)?);
        elements.push(self.idle(timing.wait)?);
        Ok(elements)
    }

    /// Block padded with a leading idle to the device's minimum waveform length.
    pub(crate) fn padded(&self, block: Block) -> Result<Block> {
        self.clock
            .pad_to_min_samples(block, Placement::Prepend, self.factory)
    }

    /// Wrap `block` into an ensemble playing it once, with counting length filled in.
    pub(crate) fn single_ensemble(
        &self,
        block: &Block,
        rotating_frame: bool,
        measurement: MeasurementInfo,
    ) -> Result<Ensemble> {
        let mut ensemble = Ensemble::new(block.name(), rotating_frame);
        ensemble.push(block.name(), 0);
        let length = counting_length(&ensemble, std::slice::from_ref(block))?;
        Ok(ensemble.with_measurement(measurement.with_counting_length(length)))
    }

    /// Padded trigger of 50 ns on `channels`.
    pub(crate) fn trigger_segment(&self, name: &str, channels: &[&str]) -> Result<(Block, Ensemble)> {
        let mut block = Block::new(name);
        block.push(self.trigger(seconds(50e-9), channels)?);
        let block = self.padded(block)?;
        let ensemble = self.single_ensemble(&block, false, MeasurementInfo::untagged())?;
        Ok((block, ensemble))
    }

    /// Trigger on the sync channel, an idle segment if none is configured.
    pub(crate) fn sync_segment(&self, name: &str) -> Result<(Block, Ensemble)> {
        let channels: Vec<&str> = self.settings.sync_channel.as_deref().into_iter().collect();
        self.trigger_segment(name, &channels)
    }

    /// Minimum length idle segment.
    pub(crate) fn idle_segment(&self, name: &str) -> Result<(Block, Ensemble)> {
        let mut block = Block::new(name);
        block.push(self.idle(seconds(1e-9))?);
        let block = self.padded(block)?;
        let ensemble = self.single_ensemble(&block, false, MeasurementInfo::untagged())?;
        Ok((block, ensemble))
    }

    /// Laser pulse followed by a wait, e.g. to initialise before the first epoch.
    pub(crate) fn laser_wait_segment(
        &self,
        name: &str,
        laser_length: Duration<Seconds>,
        wait_length: Duration<Seconds>,
    ) -> Result<(Block, Ensemble)> {
        let mut block = Block::new(name);
        block.push(self.laser_gate(laser_length)?);
        block.push(self.idle(wait_length)?);
        let block = self.padded(block)?;
        let ensemble = self.single_ensemble(&block, false, MeasurementInfo::untagged())?;
        Ok((block, ensemble))
    }
}
