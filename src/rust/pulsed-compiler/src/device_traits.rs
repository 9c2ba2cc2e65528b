// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

use crate::jump_table::RowLayout;

/// How the sequencer walks through the sequence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerKind {
    /// Rows can branch on events; idle/epoch segments sit in front of the sweep.
    Branching,
    /// Rows are executed in order, only go-to jumps are available.
    Linear,
}

impl SequencerKind {
    /// Structural constants of the adaptive pattern-jump table layout.
    pub const fn row_layout(&self) -> RowLayout {
        match self {
            SequencerKind::Branching => RowLayout {
                offset: 3,
                stride: 2,
            },
            SequencerKind::Linear => RowLayout {
                offset: 1,
                stride: 2,
            },
        }
    }
}

/// How a jump target is addressed by external hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpAddressing {
    /// No separate jump table, the jump address is the sequence row index.
    RowIndex,
    /// A dedicated jump table with running addresses starting at 1.
    Explicit,
}

/// Device specific constraints for program generation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTraits {
    pub sample_rate: f64,
    /// Waveform sample counts must be a multiple of this.
    pub granularity: u32,
    pub min_waveform_samples: u32,
    pub digital_channels: &'static [&'static str],
    pub sequencer: SequencerKind,
    pub jump_addressing: JumpAddressing,
}

impl DeviceTraits {
    pub fn row_layout(&self) -> RowLayout {
        self.sequencer.row_layout()
    }

    pub fn channel_index(&self, channel: &str) -> Option<usize> {
        self.digital_channels.iter().position(|c| *c == channel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceKind {
    #[default]
    AWG8190,
    AWG70K,
    M3202A,
}

impl DeviceKind {
    pub const fn traits(&self) -> &'static DeviceTraits {
        match self {
            DeviceKind::AWG8190 => &AWG8190_TRAITS,
            DeviceKind::AWG70K => &AWG70K_TRAITS,
            DeviceKind::M3202A => &M3202A_TRAITS,
        }
    }
}

const MARKER_CHANNELS: &[&str] = &["d_ch1", "d_ch2", "d_ch3", "d_ch4"];

pub const AWG8190_TRAITS: DeviceTraits = DeviceTraits {
    sample_rate: 12e9,
    granularity: 64,
    min_waveform_samples: 320,
    digital_channels: MARKER_CHANNELS,
    sequencer: SequencerKind::Branching,
    jump_addressing: JumpAddressing::RowIndex,
};

pub const AWG70K_TRAITS: DeviceTraits = DeviceTraits {
    sample_rate: 25e9,
    granularity: 1,
    min_waveform_samples: 4800,
    digital_channels: MARKER_CHANNELS,
    sequencer: SequencerKind::Branching,
    jump_addressing: JumpAddressing::Explicit,
};

pub const M3202A_TRAITS: DeviceTraits = DeviceTraits {
    sample_rate: 1e9,
    granularity: 10,
    min_waveform_samples: 30,
    digital_channels: MARKER_CHANNELS,
    sequencer: SequencerKind::Linear,
    jump_addressing: JumpAddressing::RowIndex,
};
