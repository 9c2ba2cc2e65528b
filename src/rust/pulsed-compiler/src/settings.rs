// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Module for defining the common generation parameters shared by all protocols.
use anyhow::Context;
use pulsed_units::{Duration, Seconds, seconds};
use serde::Deserialize;

use crate::device_traits::DeviceKind;
use crate::timing::SampleClock;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SanitizationChange {
    pub field: &'static str,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

/// Rig wide generation parameters. All durations in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorSettings {
    pub rabi_period: f64,
    pub microwave_amplitude: f64,
    pub microwave_frequency: f64,
    pub laser_length: f64,
    /// Delay of the acousto-optic modulator between trigger and light.
    pub laser_delay: f64,
    pub wait_time: f64,
    pub laser_channel: String,
    pub sync_channel: Option<String>,
    pub gate_channel: Option<String>,
    /// Channels starting with `a` are analog IQ outputs.
    pub microwave_channel: String,
    pub device: DeviceKind,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            rabi_period: 200e-9,
            microwave_amplitude: 0.25,
            microwave_frequency: 2.87e9,
            laser_length: 3e-6,
            laser_delay: 500e-9,
            wait_time: 1e-6,
            laser_channel: "d_ch1".to_string(),
            sync_channel: None,
            gate_channel: None,
            microwave_channel: "a_ch1".to_string(),
            device: DeviceKind::default(),
        }
    }
}

/// Margin between the gate/sync edge and the laser edge of the readout.
pub const READOUT_EDGE_MARGIN: f64 = 20e-9;

impl GeneratorSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings = serde_json::from_str(json).context("Failed to parse generator settings")?;
        Ok(settings)
    }

    pub fn rabi_period(&self) -> Duration<Seconds> {
        seconds(self.rabi_period)
    }

    pub fn laser_length(&self) -> Duration<Seconds> {
        seconds(self.laser_length)
    }

    pub fn laser_delay(&self) -> Duration<Seconds> {
        seconds(self.laser_delay)
    }

    pub fn wait_time(&self) -> Duration<Seconds> {
        seconds(self.wait_time)
    }

    pub fn is_analog_microwave(&self) -> bool {
        self.microwave_channel.starts_with('a')
    }

    /// Snap the timing fields to the device sample grid and check the readout timing.
    ///
    /// The Rabi period is kept at a multiple of 8 samples so that pi/2 pulses
    /// span whole samples.
    ///
    /// Returns the list of fields that were changed.
    pub fn sanitize(&mut self) -> Result<Vec<SanitizationChange>> {
        let traits = self.device.traits();
        let clock = SampleClock::for_device(traits);
        let mut changes = vec![];

        let timing_fields = [
            ("rabi_period", &mut self.rabi_period, 8),
            ("laser_length", &mut self.laser_length, 1),
            ("laser_delay", &mut self.laser_delay, 1),
            ("wait_time", &mut self.wait_time, 1),
        ];
        for (field, value, granularity) in timing_fields {
            if !value.is_finite() || *value < 0.0 {
                return Err(Error::new(format!(
                    "Expected `{field}` to be a non-negative duration, got {value}"
                )));
            }
            if clock.is_on_grid(seconds(*value), granularity) {
                continue;
            }
            let sanitized = clock.quantize(seconds(*value), granularity).value();
            changes.push(SanitizationChange {
                field,
                original: value.to_string(),
                sanitized: sanitized.to_string(),
                reason: format!("Not a multiple of {granularity} samples."),
            });
            *value = sanitized;
        }

        if self.rabi_period <= 0.0 {
            return Err(Error::new("Expected `rabi_period` to be positive"));
        }
        if self.laser_delay < READOUT_EDGE_MARGIN {
            return Err(Error::infeasible(
                "laser_delay",
                self.laser_delay(),
                seconds(READOUT_EDGE_MARGIN),
            ));
        }
        if self.laser_length + READOUT_EDGE_MARGIN < self.laser_delay {
            return Err(Error::infeasible(
                "laser_length",
                self.laser_length(),
                self.laser_delay() - seconds(READOUT_EDGE_MARGIN),
            ));
        }
        let channels = [
            Some(&self.laser_channel),
            self.sync_channel.as_ref(),
            self.gate_channel.as_ref(),
        ];
        for channel in channels.into_iter().flatten() {
            if traits.channel_index(channel).is_none() {
                return Err(Error::new(format!(
                    "Digital channel '{channel}' does not exist on {:?}",
                    self.device
                )));
            }
        }
        Ok(changes)
    }
}
