// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use pulsed_compiler::{
    DeviceTraits, ElementFactory, GeneratorSettings, SampleClock, SequenceTableBuilder,
};

/// Everything a generator may use during one build.
///
/// The sequence table builder is borrowed mutably for the whole build, so two
/// builds can never interleave on the same builder.
pub struct GeneratorContext<'a> {
    pub settings: &'a GeneratorSettings,
    pub device: &'static DeviceTraits,
    pub factory: &'a dyn ElementFactory,
    pub clock: SampleClock,
    pub table: &'a mut SequenceTableBuilder,
}

impl<'a> GeneratorContext<'a> {
    pub fn new(
        settings: &'a GeneratorSettings,
        factory: &'a dyn ElementFactory,
        table: &'a mut SequenceTableBuilder,
    ) -> Self {
        let device = settings.device.traits();
        GeneratorContext {
            settings,
            device,
            factory,
            clock: SampleClock::for_device(device),
            table,
        }
    }
}
