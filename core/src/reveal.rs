use futures_util::future::{self, FutureExt, LocalBoxFuture};
use std::cell::Cell as StdCell;
use std::rc::Rc;

use crate::*;

/// Cancels the bulk reveals started before the last board reset.
#[derive(Clone, Debug)]
pub struct CancelToken {
    generation: Rc<StdCell<u64>>,
    issued: u64,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.generation.get() != self.issued
    }
}

/// What one bulk pass did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub started: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Drives cell visuals on a [`BoardView`] from server outcomes.
///
/// Bulk passes walk the grid row-major, start every reveal without waiting for
/// the previous one, pause after every few started cells and finish once all
/// started reveals have settled. Per-cell failures are logged and skipped.
pub struct RevealEngine {
    board: Rc<dyn BoardView>,
    timer: Rc<dyn Timer>,
    pacing: RevealPacing,
    generation: Rc<StdCell<u64>>,
}

impl RevealEngine {
    pub fn new(board: Rc<dyn BoardView>, timer: Rc<dyn Timer>, pacing: RevealPacing) -> Self {
        Self {
            board,
            timer,
            pacing,
            generation: Rc::new(StdCell::new(0)),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            generation: Rc::clone(&self.generation),
            issued: self.generation.get(),
        }
    }

    pub fn is_revealed(&self, cell: Cell) -> bool {
        self.board.is_revealed(cell)
    }

    /// Reveals the cell the player picked. For a mine the returned future
    /// resolves when the blast has finished, for a diamond right away.
    pub fn reveal_cell(&self, cell: Cell, hit_mine: bool) -> LocalBoxFuture<'static, ()> {
        let visual = if hit_mine {
            CellVisual::Blast
        } else {
            CellVisual::Diamond
        };
        log::trace!("reveal {cell:?} as {visual:?}");

        match self.board.show(cell, visual) {
            Ok(done) if visual.is_terminal() => done,
            Ok(_) => future::ready(()).boxed_local(),
            Err(err) => {
                log::warn!("Could not reveal {cell:?}: {err}");
                future::ready(()).boxed_local()
            }
        }
    }

    /// Shows every still concealed cell the matrix knows about.
    pub async fn reveal_all_remaining(&self, matrix: &GameMatrix) -> BatchReport {
        self.run_batch(matrix, false).await
    }

    /// Shows every cell of a resumed round, concealed or not.
    pub async fn restore_from_matrix(&self, matrix: &GameMatrix) -> BatchReport {
        self.run_batch(matrix, true).await
    }

    async fn run_batch(&self, matrix: &GameMatrix, every_cell: bool) -> BatchReport {
        use CellOutcome::*;

        let token = self.cancel_token();
        let mut report = BatchReport::default();
        let mut started = Vec::new();

        for (cell, outcome) in matrix.iter() {
            if token.is_cancelled() {
                log::debug!("reveal batch cancelled after {} cell(s)", report.started);
                report.cancelled = true;
                break;
            }
            if !every_cell && self.board.is_revealed(cell) {
                continue;
            }
            let visual = match outcome {
                Some(Mine) => CellVisual::StaticMine,
                Some(Diamond) => CellVisual::Diamond,
                _ => continue,
            };

            match self.board.show(cell, visual) {
                Ok(done) => {
                    log::trace!("batch: {cell:?} as {visual:?}");
                    started.push(done);
                    report.started += 1;
                }
                Err(err) => {
                    log::warn!("Skipping {cell:?} in reveal batch: {err}");
                    report.failed += 1;
                    continue;
                }
            }

            if self.pacing.pause_after(report.started) {
                self.timer.sleep(self.pacing.delay()).await;
            }
        }

        future::join_all(started).await;
        report
    }

    /// Cancels running batches and rebuilds a concealed grid.
    pub fn reset_board(&self, size: GridSize) {
        self.generation.set(self.generation.get().wrapping_add(1));
        log::debug!("board reset to {}x{}", size.rows, size.cols);
        self.board.regenerate(size);
    }
}
