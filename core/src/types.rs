use serde::{Deserialize, Serialize};

pub use mines_protocol::{CellCount, CellOutcome, Coord, GridOption, RawMatrix, RoundId};

/// Stakes, balances, rewards and multipliers.
pub type Amount = f64;

pub const fn mult(a: Coord, b: Coord) -> CellCount {
    let a = a as CellCount;
    let b = b as CellCount;
    a.saturating_mul(b)
}

/// A grid position. Ordering is row-major.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: Coord,
    pub col: Coord,
}

impl Cell {
    pub const fn new(row: Coord, col: Coord) -> Self {
        Self { row, col }
    }

    pub fn to_nd_index(self) -> [usize; 2] {
        [self.row.into(), self.col.into()]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: Coord,
    pub cols: Coord,
}

impl GridSize {
    pub const fn new(rows: Coord, cols: Coord) -> Self {
        Self { rows, cols }
    }

    pub const fn total_cells(self) -> CellCount {
        mult(self.rows, self.cols)
    }

    /// At least one cell has to stay safe.
    pub const fn max_mines(self) -> CellCount {
        self.total_cells().saturating_sub(1)
    }

    pub const fn contains(self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    pub fn to_nd_index(self) -> (usize, usize) {
        (self.rows.into(), self.cols.into())
    }

    pub fn iter_cells(self) -> impl Iterator<Item = Cell> {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Cell::new(row, col)))
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(3, 3)
    }
}

impl From<GridOption> for GridSize {
    fn from(option: GridOption) -> Self {
        Self::new(option.rows, option.cols)
    }
}

impl From<GridSize> for GridOption {
    fn from(size: GridSize) -> Self {
        GridOption::new(size.rows, size.cols)
    }
}
