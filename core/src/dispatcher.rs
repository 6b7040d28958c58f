use mines_protocol::{CellSelect, GetBalance, PlaceBet, RoundEnd, RoundStart};
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::cell::Cell as StdCell;
use std::rc::Rc;

use crate::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RoundPhase {
    #[default]
    Idle,
    RoundStarting,
    Betting,
    Active,
    Revealing,
    Ending,
}

/// Why a round is being ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EndReason {
    Cashout,
    /// Ended after a mine hit; no win is shown.
    Bomb,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// No round in progress or nothing left to pick.
    Ignored,
    Safe,
    HitMine,
    /// Last safe cell found, the round was cashed out.
    Cleared,
}

/// Picks an index in `0..len` for the random-pick helper.
pub trait CellPicker {
    fn pick(&self, len: usize) -> Result<usize, DispatchError>;
}

/// Uniform picks from the operating system's random source.
#[derive(Copy, Clone, Debug, Default)]
pub struct OsCellPicker;

impl CellPicker for OsCellPicker {
    fn pick(&self, len: usize) -> Result<usize, DispatchError> {
        if len == 0 {
            return Err(DispatchError::NoCandidates);
        }
        let len = u64::try_from(len).map_err(|err| DispatchError::Entropy(err.to_string()))?;
        // reject the tail of the u32 range so every index is equally likely
        let zone = (1u64 << 32) / len * len;
        let mut rng = OsRng;
        loop {
            let value = u64::from(
                rng.try_next_u32()
                    .map_err(|err| DispatchError::Entropy(err.to_string()))?,
            );
            if value < zone {
                // value % len < len, which came from a usize
                return Ok((value % len) as usize);
            }
        }
    }
}

/// Mediates every player action through the remote authority.
///
/// Operations run the phase machine
/// `Idle -> RoundStarting -> Betting -> Active -> (Revealing)* -> Ending -> Idle`
/// and report failures to the caller after restoring the controls.
pub struct ActionDispatcher {
    store: Rc<SessionStore>,
    client: Rc<RequestClient>,
    reveal: Rc<RevealEngine>,
    view: Rc<dyn ViewHooks>,
    picker: Box<dyn CellPicker>,
    phase: StdCell<RoundPhase>,
}

impl ActionDispatcher {
    pub fn new(
        store: Rc<SessionStore>,
        client: Rc<RequestClient>,
        reveal: Rc<RevealEngine>,
        view: Rc<dyn ViewHooks>,
        picker: Box<dyn CellPicker>,
    ) -> Self {
        Self {
            store,
            client,
            reveal,
            view,
            picker,
            phase: StdCell::default(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase.get()
    }

    fn set_phase(&self, phase: RoundPhase) {
        let previous = self.phase.replace(phase);
        if previous != phase {
            log::debug!("phase: {previous:?} -> {phase:?}");
        }
    }

    fn expect_phase(&self, expected: RoundPhase) -> Result<(), DispatchError> {
        let phase = self.phase();
        if phase != expected {
            log::warn!("Expected {expected:?} but round is {phase:?}");
            return Err(DispatchError::WrongPhase(phase));
        }
        Ok(())
    }

    fn lock_inputs(&self) {
        use Control::*;
        for control in [Cashout, PickRandom, Grid] {
            self.view.apply(ViewUpdate::Disable(control));
        }
    }

    /// Re-enables the round controls; cashout only once something was found.
    fn unlock_inputs(&self) {
        self.view.apply(ViewUpdate::Enable(Control::Grid));
        self.view.apply(ViewUpdate::Enable(Control::PickRandom));
        if self.store.reveal_count() >= 1 {
            self.view.apply(ViewUpdate::Enable(Control::Cashout));
        } else {
            self.view.apply(ViewUpdate::Disable(Control::Cashout));
        }
    }

    /// Starts a round and places the bet as one workflow.
    ///
    /// Fails without contacting the server when the stake exceeds the
    /// balance. A failure at either step rolls back to `Idle` with the bet
    /// control shown and the settings enabled.
    pub async fn start_round(&self) -> Result<(), DispatchError> {
        self.expect_phase(RoundPhase::Idle)?;
        if self.store.is_started() {
            return Err(DispatchError::WrongPhase(self.phase()));
        }

        let stake = self.store.stake();
        let balance = self.store.balance();
        if stake > balance {
            log::info!("Stake {stake} exceeds balance {balance}");
            self.view.apply(ViewUpdate::LowBalance);
            return Err(DispatchError::LowBalance { stake, balance });
        }

        self.view.apply(ViewUpdate::HideWin);
        self.reveal.reset_board(self.store.grid());
        self.view.apply(ViewUpdate::HideBet);
        self.view.apply(ViewUpdate::Disable(Control::Settings));

        match self.open_round().await {
            Ok(()) => {
                self.set_phase(RoundPhase::Active);
                self.view.apply(ViewUpdate::ShowGameControls);
                self.unlock_inputs();
                Ok(())
            }
            Err(err) => {
                log::error!("Could not start round: {err}");
                self.rollback_start();
                Err(err)
            }
        }
    }

    async fn open_round(&self) -> Result<(), DispatchError> {
        self.set_phase(RoundPhase::RoundStarting);
        let started = self
            .client
            .request(&RoundStart::new(self.store.table_id()))
            .await?;
        self.store.set_round_id(started.round_id)?;
        self.place_bet().await
    }

    fn rollback_start(&self) {
        self.store.mark_ended();
        if let Err(err) = self.store.clear_round_id() {
            log::error!("Could not clear round id: {err}");
        }
        self.set_phase(RoundPhase::Idle);
        self.view.apply(ViewUpdate::ShowBet);
        self.view.apply(ViewUpdate::Enable(Control::Settings));
    }

    /// Places the bet for the round id obtained by [`Self::start_round`].
    pub async fn place_bet(&self) -> Result<(), DispatchError> {
        self.expect_phase(RoundPhase::RoundStarting)?;
        let round_id = self.store.round_id().ok_or(StoreError::MissingRoundId)?;
        self.set_phase(RoundPhase::Betting);

        let bet = PlaceBet::new(
            round_id,
            self.store.table_id(),
            self.store.stake(),
            self.store.grid().into(),
            self.store.mine_count(),
        );
        let placed = match self.client.request(&bet).await {
            Ok(placed) => placed,
            Err(err) => {
                self.store.mark_ended();
                return Err(err.into());
            }
        };

        self.store.set_reward(0.0);
        self.store.set_multiplier(1.0);
        self.store.clear_clicked();
        self.store.set_reveal_count(0);
        self.store.clear_matrix();
        self.store.set_balance(placed.balance);
        self.store.set_started(true)?;
        Ok(())
    }

    /// Reveals one cell. Hitting a mine plays the blast, reveals the board,
    /// ends the round and only then marks it as ended. Finding the last safe
    /// cell cashes out on its own.
    pub async fn reveal_cell(&self, cell: Cell) -> Result<RevealOutcome, DispatchError> {
        if !self.store.is_started() {
            log::warn!("No round in progress, ignoring reveal of {cell:?}");
            return Ok(RevealOutcome::Ignored);
        }
        self.expect_phase(RoundPhase::Active)?;

        let grid = self.store.grid();
        if !grid.contains(cell) {
            return Err(StoreError::InvalidCell(cell).into());
        }
        if self.store.is_clicked(cell) || self.reveal.is_revealed(cell) {
            log::warn!("{cell:?} is already revealed");
            return Err(DispatchError::AlreadyRevealed(cell));
        }
        let round_id = self.store.round_id().ok_or(DispatchError::NotStarted)?;

        self.set_phase(RoundPhase::Revealing);
        self.lock_inputs();

        let select = CellSelect {
            row: cell.row,
            col: cell.col,
            table_id: self.store.table_id(),
            round_id,
        };
        let selected = match self.client.request(&select).await {
            Ok(selected) => selected,
            Err(err) => {
                log::error!("Reveal of {cell:?} failed: {err}");
                self.set_phase(RoundPhase::Active);
                self.unlock_inputs();
                return Err(err.into());
            }
        };

        self.store.increment_reveal_count();
        self.store.set_multiplier(selected.current_multiplier);
        self.store.record_clicked(cell)?;
        if let Some(raw) = &selected.revealed_matrix {
            self.store.set_matrix(GameMatrix::from_raw(grid, raw));
        }
        if let Some(reward) = selected.reward {
            self.store.set_reward(reward);
        }
        self.store.set_balance(selected.balance);

        if selected.hit_mine {
            self.finish_on_mine(cell).await;
            return Ok(RevealOutcome::HitMine);
        }

        self.reveal.reveal_cell(cell, false).await;
        self.set_phase(RoundPhase::Active);

        if self.store.is_cleared() {
            log::debug!("every safe cell found, cashing out");
            self.cash_out().await?;
            return Ok(RevealOutcome::Cleared);
        }

        self.unlock_inputs();
        Ok(RevealOutcome::Safe)
    }

    async fn finish_on_mine(&self, cell: Cell) {
        self.set_phase(RoundPhase::Ending);
        self.reveal.reveal_cell(cell, true).await;

        let matrix = self.store.matrix();
        self.reveal.reveal_all_remaining(&matrix).await;
        self.view.apply(ViewUpdate::HideGameControls);

        // the round is over for the player whatever the server says
        if let Err(err) = self.end_round(EndReason::Bomb).await {
            log::error!("Round end after mine hit failed: {err}");
        }
        self.finish_round();
    }

    /// Reveals a uniformly random cell not yet revealed this round.
    pub async fn pick_random(&self) -> Result<RevealOutcome, DispatchError> {
        if !self.store.is_started() {
            log::warn!("No round in progress, nothing to pick");
            return Ok(RevealOutcome::Ignored);
        }

        let candidates = self.store.unclicked_cells();
        if candidates.is_empty() {
            log::warn!("No unrevealed cells left to pick");
            return Ok(RevealOutcome::Ignored);
        }

        let index = self.picker.pick(candidates.len())?;
        let cell = candidates
            .get(index)
            .copied()
            .ok_or_else(|| DispatchError::Entropy(format!("index {index} out of range")))?;
        log::debug!("picked {cell:?} ({}/{})", index + 1, candidates.len());
        self.reveal_cell(cell).await
    }

    /// Sends the round end and takes over the final matrix. The round stays
    /// started, marking it ended is up to the caller.
    pub async fn end_round(&self, reason: EndReason) -> Result<(), DispatchError> {
        if !self.store.is_started() {
            log::warn!("No round in progress, cannot end it");
            return Err(DispatchError::NotStarted);
        }
        let round_id = self.store.round_id().ok_or(DispatchError::NotStarted)?;

        let ended = self
            .client
            .request(&RoundEnd::new(round_id, self.store.table_id()))
            .await?;

        self.view.apply(ViewUpdate::HideGameControls);
        if reason == EndReason::Cashout {
            self.view.apply(ViewUpdate::ShowWin(self.store.reward()));
        }
        self.store
            .set_matrix(GameMatrix::from_raw(self.store.grid(), &ended.revealed_matrix));
        if let Some(balance) = ended.balance {
            self.store.set_balance(balance);
        }
        self.store.set_reveal_count(0);
        log::debug!("round ended ({reason:?})");
        Ok(())
    }

    /// Collects the reward. On failure the round stays started with the
    /// controls enabled, so the player can retry.
    pub async fn cash_out(&self) -> Result<(), DispatchError> {
        if !self.store.is_started() {
            log::warn!("No round in progress, nothing to cash out");
            return Err(DispatchError::NotStarted);
        }
        self.expect_phase(RoundPhase::Active)?;

        self.set_phase(RoundPhase::Ending);
        self.lock_inputs();
        if let Err(err) = self.end_round(EndReason::Cashout).await {
            log::error!("Cashout failed: {err}");
            self.set_phase(RoundPhase::Active);
            self.unlock_inputs();
            return Err(err);
        }

        let matrix = self.store.matrix();
        self.reveal.reveal_all_remaining(&matrix).await;
        self.finish_round();
        Ok(())
    }

    fn finish_round(&self) {
        self.store.mark_ended();
        if let Err(err) = self.store.clear_round_id() {
            log::error!("Could not clear round id: {err}");
        }
        self.set_phase(RoundPhase::Idle);
        self.view.apply(ViewUpdate::ShowBet);
        self.view.apply(ViewUpdate::Enable(Control::Settings));
    }

    pub async fn refresh_balance(&self) -> Result<Amount, DispatchError> {
        let balance = self.client.request(&GetBalance).await?.balance;
        self.store.set_balance(balance);
        Ok(balance)
    }

    /// Takes over a round restored from an earlier session.
    pub fn resume_restored_round(&self) -> Result<(), DispatchError> {
        if !self.store.is_started() {
            return Err(DispatchError::NotStarted);
        }
        self.expect_phase(RoundPhase::Idle)?;

        self.set_phase(RoundPhase::Active);
        self.view.apply(ViewUpdate::HideBet);
        self.view.apply(ViewUpdate::Disable(Control::Settings));
        self.view.apply(ViewUpdate::ShowGameControls);
        self.unlock_inputs();
        Ok(())
    }
}
