// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Typed durations and the sample-grid arithmetic shared by the pulse compiler.

pub mod duration;
pub mod sample_grid;

pub use duration::{Duration, Seconds, seconds};
pub use sample_grid::Samples;
