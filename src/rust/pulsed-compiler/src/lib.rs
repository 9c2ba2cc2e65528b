// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Compiler core turning pulsed-measurement descriptions into hardware-loadable
//! programs: elements, blocks, ensembles, sequence tables and jump tables.

pub mod device_traits;
pub mod element_factory;
pub mod ir;
pub mod jump_table;
pub mod metadata;
pub mod program;
pub mod sequence_table;
pub mod settings;
pub mod timing;


use std::fmt;

use pulsed_units::{Duration, Seconds};

pub use device_traits::{DeviceKind, DeviceTraits};
pub use element_factory::{DefaultElementFactory, ElementFactory};
pub use metadata::MeasurementInfo;
pub use program::Program;
pub use sequence_table::SequenceTableBuilder;
pub use settings::GeneratorSettings;
pub use timing::SampleClock;

/// Entities that are identified by name inside one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Block,
    Ensemble,
    Sequence,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Block => write!(f, "block"),
            EntityKind::Ensemble => write!(f, "ensemble"),
            EntityKind::Sequence => write!(f, "sequence"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{context}: requested duration {requested} is shorter than the minimum of {minimum}")]
    InfeasibleTiming {
        context: String,
        requested: Duration<Seconds>,
        minimum: Duration<Seconds>,
    },
    #[error("Conflicting definitions for {kind} '{name}'")]
    NameConflict { kind: EntityKind, name: String },
    #[error("Invalid program: {0}")]
    InvalidProgram(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T: fmt::Display>(msg: T) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }

    pub fn infeasible(
        context: impl Into<String>,
        requested: Duration<Seconds>,
        minimum: Duration<Seconds>,
    ) -> Self {
        Error::InfeasibleTiming {
            context: context.into(),
            requested,
            minimum,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
