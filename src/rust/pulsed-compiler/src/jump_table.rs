// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Jump addresses for adaptive protocols.
//!
//! An adaptive controller decides after every repetition which swept segment
//! to play next. It only knows the physical parameter (free precession time,
//! decoupling order), so the resolver maps that value onto the nearest
//! precomputed grid point and then onto the sequence row and jump address.

use indexmap::IndexMap;

use crate::device_traits::JumpAddressing;
use crate::{Error, Result};

pub type JumpAddress = u32;

/// Address 0 (all address lines low) is never a valid jump target.
pub const NO_JUMP_ADDRESS: JumpAddress = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpEntry {
    pub row: usize,
    pub address: JumpAddress,
}

/// Logical segment name to (sequence row, jump address), in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpTable {
    addressing: JumpAddressing,
    entries: IndexMap<String, JumpEntry>,
    next_address: JumpAddress,
}

impl JumpTable {
    pub fn new(addressing: JumpAddressing) -> Self {
        JumpTable {
            addressing,
            entries: IndexMap::new(),
            next_address: 1,
        }
    }

    pub fn addressing(&self) -> JumpAddressing {
        self.addressing
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_address = 1;
    }

    /// Register `name` as jump target for sequence row `row`.
    pub fn register(&mut self, name: impl Into<String>, row: usize) -> Result<JumpAddress> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(Error::new(format!("Jump target '{name}' already exists")));
        }
        let address = match self.addressing {
            JumpAddressing::RowIndex => JumpAddress::try_from(row)
                .map_err(|_| Error::new(format!("Row {row} exceeds the jump address range")))?,
            JumpAddressing::Explicit => self.next_address,
        };
        if address == NO_JUMP_ADDRESS {
            return Err(Error::new(format!(
                "Jump target '{name}' would use the reserved address 0"
            )));
        }
        if self.entries.values().any(|e| e.address >= address) {
            return Err(Error::new(format!(
                "Jump target '{name}' breaks the increasing address order"
            )));
        }
        self.next_address = address + 1;
        self.entries.insert(name, JumpEntry { row, address });
        Ok(address)
    }

    pub fn get(&self, name: &str) -> Option<&JumpEntry> {
        self.entries.get(name)
    }

    pub fn address_of_row(&self, row: usize) -> Option<JumpAddress> {
        self.entries
            .values()
            .find(|e| e.row == row)
            .map(|e| e.address)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn rows(&self) -> Vec<usize> {
        self.entries.values().map(|e| e.row).collect()
    }

    pub fn addresses(&self) -> Vec<JumpAddress> {
        self.entries.values().map(|e| e.address).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index of the grid point closest to `value`.
///
/// Ties go to the lower index, values outside the grid clamp to its edges.
/// Returns 0 for an empty grid.
pub fn nearest_index(grid: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (idx, point) in grid.iter().enumerate() {
        let distance = (point - value).abs();
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }
    best
}

/// Where the swept segments of an adaptive program sit in the sequence table.
///
/// `1 + offset` rows precede the first swept segment, consecutive swept
/// segments are `stride` rows apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub offset: usize,
    pub stride: usize,
}

impl RowLayout {
    pub fn row(&self, flat_index: usize) -> usize {
        1 + self.offset + self.stride * flat_index
    }

    pub fn prefix_rows(&self) -> usize {
        1 + self.offset
    }
}

/// Rectangular (time × order) grid of a two-parameter protocol.
///
/// Points are flattened time-major: `flat = n_time * order_idx + time_idx`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2d {
    time_axis: Vec<f64>,
    order_axis: Vec<f64>,
}

impl Grid2d {
    pub fn new(time_axis: Vec<f64>, order_axis: Vec<f64>) -> Result<Self> {
        if time_axis.is_empty() || order_axis.is_empty() {
            return Err(Error::new("Both axes of a 2D jump grid need at least one point"));
        }
        Ok(Grid2d {
            time_axis,
            order_axis,
        })
    }

    pub fn time_axis(&self) -> &[f64] {
        &self.time_axis
    }

    pub fn order_axis(&self) -> &[f64] {
        &self.order_axis
    }

    pub fn len(&self) -> usize {
        self.time_axis.len() * self.order_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flatten(&self, time_idx: usize, order_idx: usize) -> usize {
        self.time_axis.len() * order_idx + time_idx
    }

    /// All points as `(time, order)` in flattened order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.order_axis
            .iter()
            .flat_map(|&order| self.time_axis.iter().map(move |&time| (time, order)))
    }

    pub fn nearest(&self, time: f64, order: f64) -> (usize, f64, f64) {
        let time_idx = nearest_index(&self.time_axis, time);
        let order_idx = nearest_index(&self.order_axis, order);
        (
            self.flatten(time_idx, order_idx),
            self.time_axis[time_idx],
            self.order_axis[order_idx],
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepGrid {
    Linear(Vec<f64>),
    Rectangular(Grid2d),
}

impl SweepGrid {
    pub fn len(&self) -> usize {
        match self {
            SweepGrid::Linear(grid) => grid.len(),
            SweepGrid::Rectangular(grid) => grid.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a jump lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedJump {
    pub row: usize,
    /// [`NO_JUMP_ADDRESS`] if the row is not a registered jump target.
    pub address: JumpAddress,
    /// Grid values actually played, `(time, order)`; order is `None` on 1D grids.
    pub time: f64,
    pub order: Option<f64>,
}

/// Read-only lookup from physical parameters to sequence rows and jump addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpAddressResolver {
    grid: SweepGrid,
    layout: RowLayout,
    jump_table: Option<JumpTable>,
}

impl JumpAddressResolver {
    pub fn new(grid: SweepGrid, layout: RowLayout, jump_table: Option<JumpTable>) -> Result<Self> {
        if grid.is_empty() {
            return Err(Error::new("Cannot resolve jumps on an empty parameter grid"));
        }
        Ok(JumpAddressResolver {
            grid,
            layout,
            jump_table,
        })
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    pub fn grid(&self) -> &SweepGrid {
        &self.grid
    }

    fn address(&self, row: usize) -> JumpAddress {
        self.jump_table
            .as_ref()
            .and_then(|table| table.address_of_row(row))
            .unwrap_or(NO_JUMP_ADDRESS)
    }

    /// Resolve a one-parameter query. On a 2D grid the first order is used.
    pub fn resolve(&self, time: f64) -> ResolvedJump {
        match &self.grid {
            SweepGrid::Linear(grid) => {
                let idx = nearest_index(grid, time);
                let row = self.layout.row(idx);
                ResolvedJump {
                    row,
                    address: self.address(row),
                    time: grid[idx],
                    order: None,
                }
            }
            SweepGrid::Rectangular(grid) => self.resolve_2d(grid, time, grid.order_axis()[0]),
        }
    }

    /// Resolve a (time, order) query. On a 1D grid the order is ignored.
    pub fn resolve_with_order(&self, time: f64, order: f64) -> ResolvedJump {
        match &self.grid {
            SweepGrid::Linear(_) => self.resolve(time),
            SweepGrid::Rectangular(grid) => self.resolve_2d(grid, time, order),
        }
    }

    fn resolve_2d(&self, grid: &Grid2d, time: f64, order: f64) -> ResolvedJump {
        let (flat, time, order) = grid.nearest(time, order);
        let row = self.layout.row(flat);
        ResolvedJump {
            row,
            address: self.address(row),
            time,
            order: Some(order),
        }
    }

    /// Jump address for the adaptive controller, 0 if there is no valid target.
    pub fn address_for(&self, time: f64) -> JumpAddress {
        self.resolve(time).address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCHING: RowLayout = RowLayout {
        offset: 3,
        stride: 2,
    };

    #[test]
    fn test_nearest_index() {
        let grid = [0.0, 1e-6, 2e-6];
        assert_eq!(nearest_index(&grid, 1e-6), 1);
        assert_eq!(nearest_index(&grid, 0.4e-6), 0);
        // exactly between two points: lower index wins
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 0.5), 0);
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 1.5), 1);
        // clamping
        assert_eq!(nearest_index(&grid, -5.0), 0);
        assert_eq!(nearest_index(&grid, 5.0), 2);
        // duplicates: first occurrence
        assert_eq!(nearest_index(&[1.0, 1.0], 1.0), 0);
    }

    #[test]
    fn test_resolve_tau_zero() {
        let resolver = JumpAddressResolver::new(
            SweepGrid::Linear(vec![0.0, 1e-6, 2e-6]),
            BRANCHING,
            None,
        )
        .unwrap();
        let jump = resolver.resolve(0.0);
        assert_eq!(jump.row, 4);
        assert_eq!(jump.address, NO_JUMP_ADDRESS);
        assert_eq!(resolver.resolve(1.9e-6).row, 1 + 3 + 2 * 2);
    }

    #[test]
    fn test_grid_2d_flattening() {
        let grid = Grid2d::new(vec![1e-6, 2e-6, 3e-6], vec![1.0, 2.0]).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.flatten(2, 1), 5);
        assert_eq!(grid.nearest(2.1e-6, 1.9), (4, 2e-6, 2.0));
        assert_eq!(grid.points().nth(4), Some((2e-6, 2.0)));

        let resolver = JumpAddressResolver::new(
            SweepGrid::Rectangular(grid),
            RowLayout {
                offset: 1,
                stride: 2,
            },
            None,
        )
        .unwrap();
        let jump = resolver.resolve_with_order(3e-6, 1.0);
        assert_eq!(jump.row, 1 + 1 + 2 * 2);
        assert_eq!(jump.order, Some(1.0));
        assert_eq!(resolver.resolve(0.0).row, 2);
    }

    #[test]
    fn test_empty_grids_are_rejected() {
        assert!(Grid2d::new(vec![], vec![1.0]).is_err());
        assert!(JumpAddressResolver::new(SweepGrid::Linear(vec![]), BRANCHING, None).is_err());
    }

    #[test]
    fn test_row_index_addressing() {
        let mut table = JumpTable::new(JumpAddressing::RowIndex);
        assert!(table.register("init", 0).is_err());
        assert_eq!(table.register("idle", 2).unwrap(), 2);
        assert_eq!(table.register("ramsey_0", 4).unwrap(), 4);
        assert!(table.register("ramsey_0", 6).is_err());
        assert!(table.register("back", 3).is_err());
        assert_eq!(table.rows(), vec![2, 4]);
        assert_eq!(table.address_of_row(4), Some(4));
    }

    #[test]
    fn test_explicit_addressing() {
        let mut table = JumpTable::new(JumpAddressing::Explicit);
        assert_eq!(table.register("idle", 2).unwrap(), 1);
        assert_eq!(table.register("ramsey_0", 4).unwrap(), 2);
        assert_eq!(table.register("ramsey_1", 6).unwrap(), 3);
        assert_eq!(table.addresses(), vec![1, 2, 3]);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["idle", "ramsey_0", "ramsey_1"]);

        let resolver = JumpAddressResolver::new(
            SweepGrid::Linear(vec![1e-6, 2e-6]),
            BRANCHING,
            Some(table.clone()),
        )
        .unwrap();
        assert_eq!(resolver.address_for(2.2e-6), 3);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.register("idle", 2).unwrap(), 1);
    }
}
