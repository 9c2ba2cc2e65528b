// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Experiment protocols built on top of `pulsed-compiler`, plus the registry
//! and compiler entry point that dispatch a protocol identifier to its generator.

mod compiler;
mod context;
pub mod protocols;
mod pulses;
mod registry;


pub use compiler::PulseCompiler;
pub use context::GeneratorContext;
pub use protocols::{Protocol, ProtocolKind};
pub use registry::{GeneratorFn, ProtocolRegistry};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Compiler(#[from] pulsed_compiler::Error),
    #[error("Unknown protocol '{0}'")]
    UnknownProtocol(String),
    #[error("A generator for protocol '{0}' is already registered")]
    DuplicateRegistration(ProtocolKind),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T: std::fmt::Display>(msg: T) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
