// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

mod basic;
mod chirp;
mod decoupling;
mod free_precession;
mod pattern_jump;
mod polarization;

use std::fmt;
use std::str::FromStr;

use pulsed_compiler::Program;
use serde::de::DeserializeOwned;

pub use basic::{Idle, LaserWait, Trigger};
pub use chirp::ChirpedSweep;
pub use decoupling::{DdMollow, DdType};
pub use free_precession::{Hahn, Ramsey, Xy8};
pub use pattern_jump::PatternJump;
pub use polarization::{
    IsePpolPropi, PolarizationDirection, Ppol, PpolPropi, RnovelPpolPropi,
};

use crate::context::GeneratorContext;
use crate::{Error, Result};

/// Closed set of protocols the compiler can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    LaserWait,
    Idle,
    Trigger,
    Ramsey,
    Xy8,
    Hahn,
    DdMollow,
    ChirpedSweep,
    Ppol,
    PpolPropi,
    RnovelPpolPropi,
    IsePpolPropi,
    PatternJump,
}

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 13] = [
        ProtocolKind::LaserWait,
        ProtocolKind::Idle,
        ProtocolKind::Trigger,
        ProtocolKind::Ramsey,
        ProtocolKind::Xy8,
        ProtocolKind::Hahn,
        ProtocolKind::DdMollow,
        ProtocolKind::ChirpedSweep,
        ProtocolKind::Ppol,
        ProtocolKind::PpolPropi,
        ProtocolKind::RnovelPpolPropi,
        ProtocolKind::IsePpolPropi,
        ProtocolKind::PatternJump,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::LaserWait => "laser_wait",
            ProtocolKind::Idle => "idle",
            ProtocolKind::Trigger => "trigger",
            ProtocolKind::Ramsey => "ramsey",
            ProtocolKind::Xy8 => "xy8",
            ProtocolKind::Hahn => "hahn",
            ProtocolKind::DdMollow => "dd_mollow",
            ProtocolKind::ChirpedSweep => "chirped_sweep",
            ProtocolKind::Ppol => "ppol",
            ProtocolKind::PpolPropi => "ppol_2x_propi",
            ProtocolKind::RnovelPpolPropi => "rnovel_ppol_propi",
            ProtocolKind::IsePpolPropi => "ise_ppol_propi",
            ProtocolKind::PatternJump => "pattern_jump",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<ProtocolKind> {
        ProtocolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownProtocol(s.to_string()))
    }
}

/// A protocol's parameter set, deserialised fresh for every build.
pub trait Protocol: DeserializeOwned + Default {
    const KIND: ProtocolKind;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_round_trip() {
        for kind in ProtocolKind::ALL {
            assert_eq!(kind.as_str().parse::<ProtocolKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_identifier() {
        let err = "rabi".parse::<ProtocolKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownProtocol(name) if name == "rabi"));
        assert!("Ramsey".parse::<ProtocolKind>().is_err());
    }
}
