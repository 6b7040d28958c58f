use futures_util::future::LocalBoxFuture;

use crate::*;

/// Input controls the round client enables and disables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    Cashout,
    PickRandom,
    Grid,
    /// The whole settings group: grid size, mines, bet ladder.
    Settings,
}

/// Commands sent to the view layer. The view never pushes state back.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ViewUpdate {
    Enable(Control),
    Disable(Control),
    ShowBet,
    HideBet,
    /// The cashout and random-pick pair.
    ShowGameControls,
    HideGameControls,
    ShowWin(Amount),
    HideWin,
    LowBalance,
}

pub trait ViewHooks {
    fn apply(&self, update: ViewUpdate);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CellVisual {
    /// One-shot explosion for the mine the player hit.
    Blast,
    StaticMine,
    /// Loops forever once shown.
    Diamond,
}

impl CellVisual {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Blast)
    }
}

/// Per-cell visuals of the grid.
pub trait BoardView {
    fn is_revealed(&self, cell: Cell) -> bool;

    /// Replaces the concealed cell with `visual`. The returned future resolves
    /// once a terminal visual has finished playing.
    fn show(&self, cell: Cell, visual: CellVisual) -> Result<LocalBoxFuture<'static, ()>, VisualError>;

    /// Throws away every cell visual and rebuilds a concealed grid.
    fn regenerate(&self, size: GridSize);
}
