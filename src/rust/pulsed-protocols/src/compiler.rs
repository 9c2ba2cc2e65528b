// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use pulsed_compiler::{DefaultElementFactory, GeneratorSettings, Program, SequenceTableBuilder};
use pulsed_log::{info, warn};

use crate::context::GeneratorContext;
use crate::protocols::ProtocolKind;
use crate::registry::ProtocolRegistry;
use crate::Result;

/// Entry point turning a protocol identifier and its parameters into a
/// loadable [`Program`] for the configured device.
pub struct PulseCompiler {
    settings: GeneratorSettings,
    registry: ProtocolRegistry,
    table: SequenceTableBuilder,
}

impl PulseCompiler {
    /// Sanitize `settings` and set up the builtin protocols.
    pub fn new(mut settings: GeneratorSettings) -> Result<Self> {
        for change in settings.sanitize()? {
            warn!(
                "Adjusted '{}' from {} to {}: {}",
                change.field,
                change.original,
                change.sanitized,
                change.reason
            );
        }
        let addressing = settings.device.traits().jump_addressing;
        Ok(PulseCompiler {
            settings,
            registry: ProtocolRegistry::with_builtin(),
            table: SequenceTableBuilder::new(addressing),
        })
    }

    pub fn with_registry(mut self, registry: ProtocolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn registry_mut(&mut self) -> &mut ProtocolRegistry {
        &mut self.registry
    }

    /// Build one protocol. Null `params` select the protocol's defaults.
    ///
    /// The returned program passed [`Program::check_loadable`]; on error no
    /// partial program is returned.
    pub fn build(&mut self, kind: ProtocolKind, params: serde_json::Value) -> Result<Program> {
        let device = self.settings.device.traits();
        let factory = DefaultElementFactory::for_device(device);
        let mut ctx = GeneratorContext::new(&self.settings, &factory, &mut self.table);
        let program = self.registry.generate(kind, &mut ctx, params)?;
        program.check_loadable(device)?;
        info!(
            "Built '{}': {} blocks, {} ensembles, {} sequences",
            kind,
            program.blocks.len(),
            program.ensembles.len(),
            program.sequences.len()
        );
        Ok(program)
    }

    /// [`build`](Self::build) by identifier, e.g. `"ppol_2x_propi"`.
    pub fn build_named(&mut self, identifier: &str, params: serde_json::Value) -> Result<Program> {
        let kind = identifier.parse::<ProtocolKind>()?;
        self.build(kind, params)
    }
}
