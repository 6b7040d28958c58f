use ndarray::Array2;
use std::collections::BTreeSet;

use crate::*;

/// Server-provided outcome per cell; `None` is not yet determined.
///
/// Always replaced wholesale from a response, never patched per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct GameMatrix {
    cells: Array2<Option<CellOutcome>>,
}

impl GameMatrix {
    pub fn empty(size: GridSize) -> Self {
        Self {
            cells: Array2::default(size.to_nd_index()),
        }
    }

    /// Lays a wire matrix over `size`. Short rows leave the rest undetermined,
    /// entries outside the grid are dropped.
    pub fn from_raw(size: GridSize, raw: &RawMatrix) -> Self {
        let mut matrix = Self::empty(size);
        for (row, values) in raw.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                match matrix.cells.get_mut([row, col]) {
                    Some(slot) => *slot = *value,
                    None => log::trace!("ignoring matrix entry ({row}, {col}) outside {size:?}"),
                }
            }
        }
        matrix
    }

    pub fn size(&self) -> GridSize {
        let (rows, cols) = self.cells.dim();
        // constructed from a GridSize, so both axes fit a Coord
        GridSize::new(rows as Coord, cols as Coord)
    }

    pub fn get(&self, cell: Cell) -> Option<CellOutcome> {
        self.cells.get(cell.to_nd_index()).copied().flatten()
    }

    pub fn is_undetermined(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Row-major walk over every grid position.
    pub fn iter(&self) -> impl Iterator<Item = (Cell, Option<CellOutcome>)> + '_ {
        self.cells
            .indexed_iter()
            .map(|((row, col), outcome)| (Cell::new(row as Coord, col as Coord), *outcome))
    }

    pub fn safe_cells(&self) -> BTreeSet<Cell> {
        self.iter()
            .filter(|(_, outcome)| outcome.is_some_and(CellOutcome::is_safe))
            .map(|(cell, _)| cell)
            .collect()
    }
}

impl Default for GameMatrix {
    fn default() -> Self {
        Self::empty(GridSize::default())
    }
}
