// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use pulsed_units::{Duration, Seconds};

use crate::device_traits::DeviceTraits;
use crate::ir::{AnalogWaveform, Element, Envelope};
use crate::{Error, Result};

/// Source of the primitive elements protocol generators assemble.
pub trait ElementFactory {
    /// A sine drive pulse; `phase` in degrees.
    fn make_drive_element(
        &self,
        duration: Duration<Seconds>,
        amplitude: f64,
        frequency: f64,
        phase: f64,
        envelope: Envelope,
    ) -> Result<Element>;

    /// A linear frequency sweep from `start_frequency` to `stop_frequency`.
    fn make_chirp_element(
        &self,
        duration: Duration<Seconds>,
        amplitude: f64,
        start_frequency: f64,
        stop_frequency: f64,
        phase: f64,
    ) -> Result<Element>;

    fn make_idle_element(&self, duration: Duration<Seconds>) -> Result<Element>;

    /// Digital pulse with the given channels high.
    fn make_trigger_element(&self, duration: Duration<Seconds>, channels: &[&str])
    -> Result<Element>;
}

/// Element factory for the digital channel layout of one device.
#[derive(Debug, Clone)]
pub struct DefaultElementFactory {
    channels: Vec<String>,
}

impl DefaultElementFactory {
    pub fn new(channels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        DefaultElementFactory {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn for_device(traits: &DeviceTraits) -> Self {
        Self::new(traits.digital_channels.iter().copied())
    }

    pub fn channel_index(&self, channel: &str) -> Result<usize> {
        self.channels
            .iter()
            .position(|c| c == channel)
            .ok_or_else(|| Error::new(format!("Unknown digital channel '{channel}'")))
    }

    fn element(&self, duration: Duration<Seconds>, analog: Option<AnalogWaveform>) -> Result<Element> {
        if duration.is_negative() || duration.value().is_nan() {
            return Err(Error::new(format!(
                "Element duration must not be negative, got {duration}"
            )));
        }
        Ok(Element {
            duration,
            increment: Duration::zero(),
            analog,
            digital_high: vec![false; self.channels.len()],
        })
    }
}

impl ElementFactory for DefaultElementFactory {
    fn make_drive_element(
        &self,
        duration: Duration<Seconds>,
        amplitude: f64,
        frequency: f64,
        phase: f64,
        envelope: Envelope,
    ) -> Result<Element> {
        self.element(
            duration,
            Some(AnalogWaveform::Sine {
                amplitude,
                frequency,
                phase,
                envelope,
            }),
        )
    }

    fn make_chirp_element(
        &self,
        duration: Duration<Seconds>,
        amplitude: f64,
        start_frequency: f64,
        stop_frequency: f64,
        phase: f64,
    ) -> Result<Element> {
        self.element(
            duration,
            Some(AnalogWaveform::LinearChirp {
                amplitude,
                start_frequency,
                stop_frequency,
                phase,
            }),
        )
    }

    fn make_idle_element(&self, duration: Duration<Seconds>) -> Result<Element> {
        self.element(duration, None)
    }

    fn make_trigger_element(
        &self,
        duration: Duration<Seconds>,
        channels: &[&str],
    ) -> Result<Element> {
        let mut element = self.element(duration, None)?;
        for channel in channels {
            element.set_digital(self.channel_index(channel)?, true);
        }
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsed_units::seconds;

    #[test]
    fn test_trigger_sets_channels() {
        let factory = DefaultElementFactory::new(["d_ch1", "d_ch2", "d_ch3"]);
        let element = factory
            .make_trigger_element(seconds(50e-9), &["d_ch1", "d_ch3"])
            .unwrap();
        assert_eq!(element.digital_high, vec![true, false, true]);
        assert!(!element.is_idle());
        assert!(factory.make_idle_element(seconds(1e-9)).unwrap().is_idle());
    }

    #[test]
    fn test_rejects_invalid_input() {
        let factory = DefaultElementFactory::new(["d_ch1"]);
        assert!(factory.make_trigger_element(seconds(1e-9), &["d_ch9"]).is_err());
        assert!(factory.make_idle_element(seconds(-1e-9)).is_err());
    }
}
