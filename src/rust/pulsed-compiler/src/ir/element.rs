// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use pulsed_units::{Duration, Seconds};
use serde::Deserialize;

/// Amplitude envelope of a shaped drive pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    #[default]
    Rectangle,
    Parabola,
    SinN,
    ErrorFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub kind: EnvelopeKind,
    /// Shape order, e.g. the exponent of a sin^n envelope.
    pub order: u32,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            kind: EnvelopeKind::Rectangle,
            order: 1,
        }
    }
}

impl Envelope {
    pub fn is_rectangle(&self) -> bool {
        self.kind == EnvelopeKind::Rectangle
    }
}

/// Analog content of an element. Frequencies in Hz, phases in degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalogWaveform {
    Sine {
        amplitude: f64,
        frequency: f64,
        phase: f64,
        envelope: Envelope,
    },
    LinearChirp {
        amplitude: f64,
        start_frequency: f64,
        stop_frequency: f64,
        phase: f64,
    },
}

/// The atomic timed primitive of a pulse block.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub duration: Duration<Seconds>,
    /// Added to `duration` on every repetition of a swept block.
    pub increment: Duration<Seconds>,
    /// `None` keeps the analog outputs at zero.
    pub analog: Option<AnalogWaveform>,
    /// One entry per digital channel of the device.
    pub digital_high: Vec<bool>,
}

impl Element {
    pub fn is_idle(&self) -> bool {
        self.analog.is_none() && !self.digital_high.iter().any(|&high| high)
    }

    pub fn has_increment(&self) -> bool {
        self.increment != Duration::zero()
    }

    pub fn with_increment(mut self, increment: Duration<Seconds>) -> Self {
        self.increment = increment;
        self
    }

    /// Force a digital channel high or low, e.g. to add or drop a gate.
    pub fn set_digital(&mut self, channel: usize, high: bool) {
        if let Some(slot) = self.digital_high.get_mut(channel) {
            *slot = high;
        }
    }
}
