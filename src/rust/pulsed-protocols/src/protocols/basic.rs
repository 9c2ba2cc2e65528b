// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Helper segments without readout: laser initialisation, idles and triggers.

use pulsed_compiler::Program;
use pulsed_units::seconds;
use serde::Deserialize;

use super::{Protocol, ProtocolKind};
use crate::Result;
use crate::context::GeneratorContext;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaserWait {
    pub name: String,
    pub laser_length: f64,
    pub wait_length: f64,
}

impl Default for LaserWait {
    fn default() -> Self {
        LaserWait {
            name: "laser_wait".to_string(),
            laser_length: 500e-9,
            wait_length: 1e-6,
        }
    }
}

impl Protocol for LaserWait {
    const KIND: ProtocolKind = ProtocolKind::LaserWait;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let (block, ensemble) = ctx.laser_wait_segment(
            &self.name,
            seconds(self.laser_length),
            seconds(self.wait_length),
        )?;
        Ok(Program::single(block, ensemble))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Idle {
    pub name: String,
}

impl Default for Idle {
    fn default() -> Self {
        Idle {
            name: "idle".to_string(),
        }
    }
}

impl Protocol for Idle {
    const KIND: ProtocolKind = ProtocolKind::Idle;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let (block, ensemble) = ctx.idle_segment(&self.name)?;
        Ok(Program::single(block, ensemble))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Trigger {
    pub name: String,
    pub channels: Vec<String>,
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger {
            name: "trigger".to_string(),
            channels: vec![],
        }
    }
}

impl Protocol for Trigger {
    const KIND: ProtocolKind = ProtocolKind::Trigger;

    fn generate(&self, ctx: &mut GeneratorContext<'_>) -> Result<Program> {
        let channels: Vec<&str> = self.channels.iter().map(String::as_str).collect();
        let (block, ensemble) = ctx.trigger_segment(&self.name, &channels)?;
        Ok(Program::single(block, ensemble))
    }
}
