use mines_protocol::{Exchange, GameLoad, GameLoaded, STATUS_NO_GAME};
use std::rc::Rc;
use std::time::Duration;

use crate::*;

/// A round left unresolved by an earlier session.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRound {
    pub round_id: RoundId,
    pub grid: GridSize,
    pub reward: Amount,
    pub stake: Amount,
    pub mine_count: Option<CellCount>,
    pub matrix: GameMatrix,
    pub reveal_count: CellCount,
}

impl PendingRound {
    /// `None` when the snapshot does not describe a resumable round.
    fn from_loaded(loaded: GameLoaded) -> Result<Option<Self>, RecoveryError> {
        if !loaded.has_existing_game {
            log::debug!("no pending round");
            return Ok(None);
        }
        let round_id = match loaded.round_id {
            Some(round_id) if !round_id.is_empty() => round_id,
            _ => {
                log::info!("Pending round has no round id, treating it as concluded");
                return Ok(None);
            }
        };
        let grid: GridSize = match loaded.grid_option {
            Some(option) => option
                .parse::<GridOption>()
                .map_err(|_| RecoveryError::InvalidGrid(option))?
                .into(),
            None => return Err(RecoveryError::MissingGrid),
        };
        let matrix = loaded
            .revealed_matrix
            .map(|raw| GameMatrix::from_raw(grid, &raw))
            .unwrap_or_else(|| GameMatrix::empty(grid));

        Ok(Some(Self {
            round_id,
            grid,
            reward: loaded.current_winning.unwrap_or(0.0),
            stake: loaded.bet_amount.filter(|&stake| stake > 0.0).unwrap_or(1.0),
            mine_count: loaded.mine_count,
            matrix,
            reveal_count: loaded.revealed_count.unwrap_or(0),
        }))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecoveryOutcome {
    NothingToRestore,
    Restored(RoundId),
}

/// Resumes an in-flight round on startup.
pub struct PendingRoundRecovery {
    store: Rc<SessionStore>,
    client: Rc<RequestClient>,
    reveal: Rc<RevealEngine>,
    timer: Rc<dyn Timer>,
    settle: Duration,
    restore_starting: Listeners<()>,
    restore_complete: Listeners<()>,
}

impl PendingRoundRecovery {
    pub fn new(
        store: Rc<SessionStore>,
        client: Rc<RequestClient>,
        reveal: Rc<RevealEngine>,
        timer: Rc<dyn Timer>,
        settle: Duration,
    ) -> Self {
        Self {
            store,
            client,
            reveal,
            timer,
            settle,
            restore_starting: Listeners::new("restore starting"),
            restore_complete: Listeners::new("restore complete"),
        }
    }

    pub fn on_restore_starting(&self, callback: impl Fn(&()) -> anyhow::Result<()> + 'static) -> Subscription {
        self.restore_starting.subscribe(callback)
    }

    /// Fires after every restore attempt, failed ones included.
    pub fn on_restore_complete(&self, callback: impl Fn(&()) -> anyhow::Result<()> + 'static) -> Subscription {
        self.restore_complete.subscribe(callback)
    }

    /// Asks the remote authority for a pending round. Never touches the store.
    pub async fn check_pending(&self) -> Result<Option<PendingRound>, RecoveryError> {
        let load = GameLoad {
            table_id: self.store.table_id(),
        };
        let frame = self.client.exchange(&load).await?;

        if frame.status.as_deref() == Some(STATUS_NO_GAME) {
            log::debug!("no pending round");
            return Ok(None);
        }
        if !frame.is_ok() {
            log::warn!("Unexpected game load status {:?}", frame.status);
            return Ok(None);
        }

        let loaded: GameLoaded = frame
            .decode()
            .map_err(|err| RequestError::from_protocol(GameLoad::OPERATION, err))?;
        PendingRound::from_loaded(loaded)
    }

    /// Loads `pending` into the store and the board and marks it started.
    pub async fn restore(&self, pending: PendingRound) -> Result<(), RecoveryError> {
        log::info!("Restoring round {}", pending.round_id);
        self.restore_starting.emit(&());
        self.timer.sleep(self.settle).await;

        let result = self.apply(pending).await;
        if let Err(err) = &result {
            log::error!("Restoring pending round failed: {err}");
        }
        self.restore_complete.emit(&());
        result
    }

    async fn apply(&self, pending: PendingRound) -> Result<(), RecoveryError> {
        self.store.restore_round(&pending)?;

        self.reveal.reset_board(pending.grid);
        let report = self.reveal.restore_from_matrix(&pending.matrix).await;
        log::debug!("restored {} cell(s), {} failed", report.started, report.failed);

        self.store.set_started(true)?;
        Ok(())
    }

    /// Checks for a pending round and restores it when there is one.
    pub async fn recover(&self) -> Result<RecoveryOutcome, RecoveryError> {
        match self.check_pending().await? {
            None => Ok(RecoveryOutcome::NothingToRestore),
            Some(pending) => {
                let round_id = pending.round_id.clone();
                self.restore(pending).await?;
                Ok(RecoveryOutcome::Restored(round_id))
            }
        }
    }
}
