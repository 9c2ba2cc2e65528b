// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use pulsed_units::sample_grid::{Samples, length_to_samples};
use pulsed_units::{Duration, Seconds};

use crate::ir::Element;
use crate::{Error, Result};

/// A named, ordered list of elements played back as one fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    elements: Vec<Element>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Block {
            name: name.into(),
            elements: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn extend<'a>(&mut self, elements: impl IntoIterator<Item = &'a Element>) {
        self.elements.extend(elements.into_iter().cloned());
    }

    pub fn insert(&mut self, index: usize, element: Element) {
        self.elements.insert(index, element);
    }

    /// Swap the last element, e.g. to change the phase of the final readout pulse.
    pub fn replace_last(&mut self, element: Element) {
        match self.elements.last_mut() {
            Some(last) => *last = element,
            None => self.elements.push(element),
        }
    }

    /// Length of the first repetition.
    pub fn init_duration(&self) -> Duration<Seconds> {
        self.elements.iter().map(|e| e.duration).sum()
    }

    /// Length added by every further repetition.
    pub fn increment(&self) -> Duration<Seconds> {
        self.elements.iter().map(|e| e.increment).sum()
    }

    /// Fixed length of the block, undefined for swept blocks.
    pub fn duration(&self) -> Result<Duration<Seconds>> {
        if self.increment() != Duration::zero() {
            return Err(Error::new(format!(
                "Can't determine the length of block '{}', it contains incremented elements",
                self.name
            )));
        }
        Ok(self.init_duration())
    }

    pub fn sample_count(&self, sample_rate: f64) -> Result<Samples> {
        Ok(length_to_samples(self.duration()?.value(), sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsed_units::seconds;

    fn idle(t: f64) -> Element {
        Element {
            duration: seconds(t),
            increment: Duration::zero(),
            analog: None,
            digital_high: vec![false; 4],
        }
    }

    #[test]
    fn test_duration_is_sum_of_elements() {
        let mut block = Block::new("b");
        block.push(idle(250e-9));
        block.push(idle(250e-9));
        assert_eq!(block.duration().unwrap(), seconds(500e-9));
        assert_eq!(block.sample_count(12e9).unwrap(), 6000);
    }

    #[test]
    fn test_incremented_block_has_no_duration() {
        let mut block = Block::new("swept");
        block.push(idle(100e-9).with_increment(seconds(10e-9)));
        assert!(block.duration().is_err());
        assert_eq!(block.init_duration(), seconds(100e-9));
        assert_eq!(block.increment(), seconds(10e-9));
    }

    #[test]
    fn test_replace_last() {
        let mut block = Block::new("b");
        block.replace_last(idle(1e-9));
        block.push(idle(2e-9));
        block.replace_last(idle(3e-9));
        assert_eq!(block.len(), 2);
        assert_eq!(block.elements()[1].duration, seconds(3e-9));
    }
}
