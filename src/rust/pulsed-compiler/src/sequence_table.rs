// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Incremental assembly of a sequence table.
//!
//! Generators of composite and adaptive protocols append one row at a time and
//! hand over the blocks and ensembles the row needs. The builder keeps the
//! running row index, so a generator can learn a row's index before appending
//! it (to register jump targets or to point a go-to back at it).

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::device_traits::JumpAddressing;
use crate::ir::{Block, Ensemble, FlowControl, Sequence, SequenceStep};
use crate::jump_table::{JumpAddress, JumpTable};
use crate::metadata::MeasurementInfo;
use crate::{EntityKind, Error, Result};

/// Drained content of a [`SequenceTableBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTable {
    pub sequence: Sequence,
    pub blocks: Vec<Block>,
    pub ensembles: Vec<Ensemble>,
    /// `None` if no jump target was registered.
    pub jump_table: Option<JumpTable>,
}

pub struct SequenceTableBuilder {
    rows: Vec<SequenceStep>,
    blocks: Vec<Block>,
    ensembles: Vec<Ensemble>,
    jump_table: JumpTable,
}

impl SequenceTableBuilder {
    pub fn new(addressing: JumpAddressing) -> Self {
        SequenceTableBuilder {
            rows: vec![],
            blocks: vec![],
            ensembles: vec![],
            jump_table: JumpTable::new(addressing),
        }
    }

    /// Forget everything appended so far. The next row gets index 0.
    pub fn reset(&mut self) {
        self.rows.clear();
        self.blocks.clear();
        self.ensembles.clear();
        self.jump_table.clear();
    }

    /// Index the next [`append`](Self::append) will write.
    pub fn current_index(&self) -> usize {
        self.rows.len()
    }

    /// Append one row playing ensemble `name`. Returns the row index.
    pub fn append(
        &mut self,
        name: impl Into<String>,
        blocks: impl IntoIterator<Item = Block>,
        ensembles: impl IntoIterator<Item = Ensemble>,
        flow: FlowControl,
    ) -> usize {
        let index = self.rows.len();
        self.blocks.extend(blocks);
        self.ensembles.extend(ensembles);
        self.rows.push(SequenceStep {
            ensemble: name.into(),
            flow,
        });
        index
    }

    /// Make the row written by the next `append` a jump target.
    pub fn register_jump_target(&mut self, name: impl Into<String>) -> Result<JumpAddress> {
        let row = self.current_index();
        self.jump_table.register(name, row)
    }

    /// Drain the builder into a sequence plus the deduplicated blocks and ensembles.
    ///
    /// The builder is empty afterwards, also when an error is returned.
    pub fn finalize(
        &mut self,
        sequence_name: impl Into<String>,
        rotating_frame: bool,
    ) -> Result<SequenceTable> {
        let rows = std::mem::take(&mut self.rows);
        let blocks = std::mem::take(&mut self.blocks);
        let ensembles = std::mem::take(&mut self.ensembles);
        let addressing = self.jump_table.addressing();
        let jump_table = std::mem::replace(&mut self.jump_table, JumpTable::new(addressing));
        let sequence_name = sequence_name.into();

        if rows.is_empty() {
            return Err(Error::InvalidProgram(format!(
                "Sequence '{sequence_name}' has no rows"
            )));
        }
        let blocks = dedup_by_name(blocks, EntityKind::Block, |b| b.name())?;
        let ensembles = dedup_by_name(ensembles, EntityKind::Ensemble, |e| e.name())?;

        for (index, row) in rows.iter().enumerate() {
            if !ensembles.iter().any(|e| e.name() == row.ensemble) {
                return Err(Error::InvalidProgram(format!(
                    "Row {index} of sequence '{sequence_name}' plays unknown ensemble '{}'",
                    row.ensemble
                )));
            }
            if let Some(target) = row.flow.targets().find(|&t| t >= rows.len()) {
                return Err(Error::InvalidProgram(format!(
                    "Row {index} of sequence '{sequence_name}' jumps to row {target}, \
                     the sequence has {} rows",
                    rows.len()
                )));
            }
        }
        if let Some(row) = jump_table.rows().into_iter().find(|&r| r >= rows.len()) {
            return Err(Error::InvalidProgram(format!(
                "Jump target row {row} of sequence '{sequence_name}' was never appended"
            )));
        }

        pulsed_log::diagnostic!(
            "Finalized sequence '{sequence_name}': {} rows, {} blocks, {} ensembles, {} jump targets",
            rows.len(),
            blocks.len(),
            ensembles.len(),
            jump_table.len()
        );
        Ok(SequenceTable {
            sequence: Sequence {
                name: sequence_name,
                steps: rows,
                rotating_frame,
                measurement: MeasurementInfo::untagged(),
            },
            blocks,
            ensembles,
            jump_table: (!jump_table.is_empty()).then_some(jump_table),
        })
    }
}

/// First occurrence wins; a later definition with different content is an error.
pub(crate) fn dedup_by_name<T: PartialEq>(
    items: Vec<T>,
    kind: EntityKind,
    name_of: impl Fn(&T) -> &str,
) -> Result<Vec<T>> {
    let mut unique: IndexMap<String, T> = IndexMap::new();
    for item in items {
        match unique.entry(name_of(&item).to_string()) {
            Entry::Occupied(existing) => {
                if *existing.get() != item {
                    return Err(Error::NameConflict {
                        kind,
                        name: existing.key().clone(),
                    });
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
        }
    }
    Ok(unique.into_values().collect())
}
