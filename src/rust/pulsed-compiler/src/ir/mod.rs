// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod block;
pub mod element;
pub mod ensemble;
pub mod sequence;

pub use block::Block;
pub use element::{AnalogWaveform, Element, Envelope, EnvelopeKind};
pub use ensemble::{Ensemble, EnsembleStep};
pub use sequence::{FlowControl, Sequence, SequenceStep, TriggerInput};
