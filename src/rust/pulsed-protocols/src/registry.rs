// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use indexmap::IndexMap;
use indexmap::map::Entry;
use pulsed_compiler::Program;

use crate::context::GeneratorContext;
use crate::protocols::{
    ChirpedSweep, DdMollow, Hahn, Idle, IsePpolPropi, LaserWait, PatternJump, Ppol, PpolPropi,
    Protocol, ProtocolKind, Ramsey, RnovelPpolPropi, Trigger, Xy8,
};
use crate::{Error, Result};

/// Type erased generator: deserialises the parameters and builds the program.
pub type GeneratorFn = fn(&mut GeneratorContext<'_>, serde_json::Value) -> Result<Program>;

fn adapt<P: Protocol>(ctx: &mut GeneratorContext<'_>, params: serde_json::Value) -> Result<Program> {
    let protocol = if params.is_null() {
        P::default()
    } else {
        serde_json::from_value::<P>(params)
            .with_context(|| format!("Invalid parameters for protocol '{}'", P::KIND))?
    };
    protocol.generate(ctx)
}

/// Maps protocol identifiers to their generators.
pub struct ProtocolRegistry {
    generators: IndexMap<ProtocolKind, GeneratorFn>,
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ProtocolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        ProtocolRegistry {
            generators: IndexMap::new(),
        }
    }

    /// Registry with a generator for every [`ProtocolKind`].
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin: [(ProtocolKind, GeneratorFn); 13] = [
            (LaserWait::KIND, adapt::<LaserWait>),
            (Idle::KIND, adapt::<Idle>),
            (Trigger::KIND, adapt::<Trigger>),
            (Ramsey::KIND, adapt::<Ramsey>),
            (Xy8::KIND, adapt::<Xy8>),
            (Hahn::KIND, adapt::<Hahn>),
            (DdMollow::KIND, adapt::<DdMollow>),
            (ChirpedSweep::KIND, adapt::<ChirpedSweep>),
            (Ppol::KIND, adapt::<Ppol>),
            (PpolPropi::KIND, adapt::<PpolPropi>),
            (RnovelPpolPropi::KIND, adapt::<RnovelPpolPropi>),
            (IsePpolPropi::KIND, adapt::<IsePpolPropi>),
            (PatternJump::KIND, adapt::<PatternJump>),
        ];
        for (kind, generator) in builtin {
            let registered = registry.register(kind, generator);
            debug_assert!(registered.is_ok(), "builtin protocol '{kind}' listed twice");
        }
        registry
    }

    pub fn register(&mut self, kind: ProtocolKind, generator: GeneratorFn) -> Result<()> {
        match self.generators.entry(kind) {
            Entry::Occupied(_) => Err(Error::DuplicateRegistration(kind)),
            Entry::Vacant(slot) => {
                slot.insert(generator);
                Ok(())
            }
        }
    }

    pub fn register_protocol<P: Protocol>(&mut self) -> Result<()> {
        self.register(P::KIND, adapt::<P>)
    }

    pub fn contains(&self, kind: ProtocolKind) -> bool {
        self.generators.contains_key(&kind)
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = ProtocolKind> + '_ {
        self.generators.keys().copied()
    }

    /// Run the generator of `kind`. Null parameters select the defaults.
    pub fn generate(
        &self,
        kind: ProtocolKind,
        ctx: &mut GeneratorContext<'_>,
        params: serde_json::Value,
    ) -> Result<Program> {
        let generator = self
            .generators
            .get(&kind)
            .ok_or_else(|| Error::UnknownProtocol(kind.to_string()))?;
        generator(ctx, params)
    }
}
