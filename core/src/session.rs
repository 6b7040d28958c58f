use std::cell::RefCell;
use std::collections::BTreeSet;

use crate::*;

/// Client-side mirror of the round context.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundSession {
    pub round_id: Option<RoundId>,
    pub table_id: String,
    pub started: bool,
    pub grid: GridSize,
    pub mine_count: CellCount,
    pub stake: Amount,
    pub bet_steps: Vec<Amount>,
    pub balance: Amount,
    pub reward: Amount,
    pub multiplier: Amount,
    /// Successful reveals this round.
    pub reveal_count: CellCount,
    pub clicked: BTreeSet<Cell>,
    pub matrix: GameMatrix,
}

/// Holds the [`RoundSession`] and notifies listeners about changes.
///
/// Writing a value equal to the current one is a no-op and notifies nobody.
/// Grid, mine count, stake and bet ladder are frozen while a round is started.
pub struct SessionStore {
    state: RefCell<RoundSession>,
    round_started: Listeners<()>,
    round_ended: Listeners<()>,
    balance_changed: Listeners<Amount>,
    reward_changed: Listeners<Amount>,
    multiplier_changed: Listeners<Amount>,
    grid_changed: Listeners<GridSize>,
    mines_changed: Listeners<CellCount>,
    stake_changed: Listeners<Amount>,
    bet_steps_changed: Listeners<[Amount]>,
}

fn validate_grid(grid: GridSize) -> Result<(), StoreError> {
    if grid.total_cells() < 2 {
        return Err(StoreError::GridTooSmall);
    }
    Ok(())
}

fn validate_mines(grid: GridSize, mines: CellCount) -> Result<(), StoreError> {
    let max = grid.max_mines();
    if mines < 1 || mines > max {
        return Err(StoreError::MineCountOutOfRange { mines, max });
    }
    Ok(())
}

fn validate_stake(stake: Amount) -> Result<(), StoreError> {
    if !stake.is_finite() || stake <= 0.0 {
        return Err(StoreError::InvalidStake(stake));
    }
    Ok(())
}

fn validate_bet_steps(steps: &[Amount]) -> Result<(), StoreError> {
    let ascending = steps.windows(2).all(|pair| pair[0] < pair[1]);
    if steps.is_empty() || !ascending || steps.iter().any(|&step| validate_stake(step).is_err()) {
        return Err(StoreError::InvalidBetSteps);
    }
    Ok(())
}

impl SessionStore {
    pub fn new(config: &ClientConfig) -> Result<Self, StoreError> {
        validate_grid(config.default_grid)?;
        validate_mines(config.default_grid, config.default_mines)?;
        validate_stake(config.default_stake)?;
        validate_bet_steps(&config.bet_steps)?;
        if !config.bet_steps.contains(&config.default_stake) {
            return Err(StoreError::OffLadder(config.default_stake));
        }

        let state = RoundSession {
            round_id: None,
            table_id: config.table_id.clone(),
            started: false,
            grid: config.default_grid,
            mine_count: config.default_mines,
            stake: config.default_stake,
            bet_steps: config.bet_steps.clone(),
            balance: config.default_balance,
            reward: 0.0,
            multiplier: 1.0,
            reveal_count: 0,
            clicked: BTreeSet::new(),
            matrix: GameMatrix::empty(config.default_grid),
        };

        Ok(Self {
            state: RefCell::new(state),
            round_started: Listeners::new("round started"),
            round_ended: Listeners::new("round ended"),
            balance_changed: Listeners::new("balance"),
            reward_changed: Listeners::new("reward"),
            multiplier_changed: Listeners::new("multiplier"),
            grid_changed: Listeners::new("grid"),
            mines_changed: Listeners::new("mines"),
            stake_changed: Listeners::new("stake"),
            bet_steps_changed: Listeners::new("bet steps"),
        })
    }

    /// Writes `value` into the selected field, returns whether it changed.
    fn update<V: PartialEq>(&self, value: V, field: impl FnOnce(&mut RoundSession) -> &mut V) -> bool {
        let mut state = self.state.borrow_mut();
        let slot = field(&mut state);
        if *slot == value {
            false
        } else {
            *slot = value;
            true
        }
    }

    fn ensure_idle(&self, what: &'static str) -> Result<(), StoreError> {
        if self.is_started() {
            log::warn!("Refusing to change {what} while a round is in progress");
            return Err(StoreError::RoundInProgress(what));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> RoundSession {
        self.state.borrow().clone()
    }

    pub fn table_id(&self) -> String {
        self.state.borrow().table_id.clone()
    }

    pub fn round_id(&self) -> Option<RoundId> {
        self.state.borrow().round_id.clone()
    }

    pub fn set_round_id(&self, round_id: RoundId) -> Result<(), StoreError> {
        self.ensure_idle("round id")?;
        if round_id.is_empty() {
            return Err(StoreError::MissingRoundId);
        }
        log::debug!("round id: {round_id}");
        self.state.borrow_mut().round_id = Some(round_id);
        Ok(())
    }

    pub fn clear_round_id(&self) -> Result<(), StoreError> {
        self.ensure_idle("round id")?;
        self.state.borrow_mut().round_id = None;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.state.borrow().started
    }

    /// Fires the started listeners on a `false -> true` edge and the ended
    /// listeners on `true -> false`.
    pub fn set_started(&self, started: bool) -> Result<(), StoreError> {
        if !started {
            self.mark_ended();
            return Ok(());
        }
        if self.state.borrow().round_id.is_none() {
            return Err(StoreError::MissingRoundId);
        }
        if self.update(true, |s| &mut s.started) {
            log::debug!("round started");
            self.round_started.emit(&());
        }
        Ok(())
    }

    pub fn mark_ended(&self) {
        if self.update(false, |s| &mut s.started) {
            log::debug!("round ended");
            self.round_ended.emit(&());
        }
    }

    pub fn grid(&self) -> GridSize {
        self.state.borrow().grid
    }

    /// Resizes the grid, clamping a mine count that no longer fits.
    pub fn set_grid(&self, grid: GridSize) -> Result<(), StoreError> {
        self.ensure_idle("grid")?;
        validate_grid(grid)?;
        if !self.update(grid, |s| &mut s.grid) {
            return Ok(());
        }

        let clamped = {
            let mut state = self.state.borrow_mut();
            state.matrix = GameMatrix::empty(grid);
            state.clicked.clear();
            if state.mine_count > grid.max_mines() {
                state.mine_count = grid.max_mines();
                Some(state.mine_count)
            } else {
                None
            }
        };

        log::debug!("grid: {}x{}", grid.rows, grid.cols);
        self.grid_changed.emit(&grid);
        if let Some(mines) = clamped {
            log::debug!("mine count clamped to {mines}");
            self.mines_changed.emit(&mines);
        }
        Ok(())
    }

    pub fn mine_count(&self) -> CellCount {
        self.state.borrow().mine_count
    }

    pub fn set_mine_count(&self, mines: CellCount) -> Result<(), StoreError> {
        self.ensure_idle("mine count")?;
        validate_mines(self.grid(), mines)?;
        if self.update(mines, |s| &mut s.mine_count) {
            self.mines_changed.emit(&mines);
        }
        Ok(())
    }

    pub fn cycle_mines_up(&self) -> Result<CellCount, StoreError> {
        let max = self.grid().max_mines();
        let mines = self.mine_count();
        let next = if mines >= max { 1 } else { mines + 1 };
        self.set_mine_count(next)?;
        Ok(next)
    }

    pub fn cycle_mines_down(&self) -> Result<CellCount, StoreError> {
        let max = self.grid().max_mines();
        let mines = self.mine_count();
        let next = if mines <= 1 { max } else { mines - 1 };
        self.set_mine_count(next)?;
        Ok(next)
    }

    pub fn stake(&self) -> Amount {
        self.state.borrow().stake
    }

    /// Selects one of the bet steps as the stake.
    pub fn set_stake(&self, stake: Amount) -> Result<(), StoreError> {
        self.ensure_idle("stake")?;
        validate_stake(stake)?;
        if !self.state.borrow().bet_steps.contains(&stake) {
            return Err(StoreError::OffLadder(stake));
        }
        if self.update(stake, |s| &mut s.stake) {
            self.stake_changed.emit(&stake);
        }
        Ok(())
    }

    pub fn bet_steps(&self) -> Vec<Amount> {
        self.state.borrow().bet_steps.clone()
    }

    /// Replaces the ladder. A stake that is no longer on it drops to the
    /// highest step below it, or the lowest step.
    pub fn set_bet_steps(&self, steps: Vec<Amount>) -> Result<(), StoreError> {
        self.ensure_idle("bet steps")?;
        validate_bet_steps(&steps)?;
        if !self.update(steps.clone(), |s| &mut s.bet_steps) {
            return Ok(());
        }
        self.bet_steps_changed.emit(&steps);

        let stake = self.stake();
        if !steps.contains(&stake) {
            let snapped = steps
                .iter()
                .rev()
                .copied()
                .find(|&step| step < stake)
                .unwrap_or(steps[0]);
            log::debug!("stake {stake} snapped to {snapped}");
            self.set_stake(snapped)?;
        }
        Ok(())
    }

    /// Moves the stake to the next step above it, wrapping to the lowest.
    pub fn cycle_bet_up(&self) -> Result<Amount, StoreError> {
        self.ensure_idle("stake")?;
        let stake = self.stake();
        let steps = self.bet_steps();
        let next = steps
            .iter()
            .copied()
            .find(|&step| step > stake)
            .unwrap_or(steps[0]);
        self.set_stake(next)?;
        Ok(next)
    }

    /// Moves the stake to the next step below it, wrapping to the highest.
    pub fn cycle_bet_down(&self) -> Result<Amount, StoreError> {
        self.ensure_idle("stake")?;
        let stake = self.stake();
        let steps = self.bet_steps();
        let next = steps
            .iter()
            .rev()
            .copied()
            .find(|&step| step < stake)
            .unwrap_or(steps[steps.len() - 1]);
        self.set_stake(next)?;
        Ok(next)
    }

    /// Takes over a round resumed from the server.
    ///
    /// The whole snapshot is checked before anything is written, so a rejected
    /// one leaves the store as it was. The stake is the server's and does not
    /// have to be on the bet ladder. The round is not marked started.
    pub fn restore_round(&self, round: &PendingRound) -> Result<(), StoreError> {
        self.ensure_idle("round")?;
        validate_grid(round.grid)?;
        let mines = round
            .mine_count
            .unwrap_or_else(|| self.mine_count().min(round.grid.max_mines()));
        validate_mines(round.grid, mines)?;
        validate_stake(round.stake)?;
        if round.round_id.is_empty() {
            return Err(StoreError::MissingRoundId);
        }

        let previous = {
            let mut state = self.state.borrow_mut();
            let previous = (state.grid, state.mine_count, state.stake, state.reward);
            state.round_id = Some(round.round_id.clone());
            state.grid = round.grid;
            state.mine_count = mines;
            state.stake = round.stake;
            state.reward = round.reward;
            state.reveal_count = round.reveal_count;
            state.clicked = round
                .matrix
                .safe_cells()
                .into_iter()
                .filter(|&cell| round.grid.contains(cell))
                .collect();
            state.matrix = round.matrix.clone();
            previous
        };
        let (grid, mine_count, stake, reward) = previous;

        log::debug!("round {} restored into the store", round.round_id);
        if grid != round.grid {
            self.grid_changed.emit(&round.grid);
        }
        if mine_count != mines {
            self.mines_changed.emit(&mines);
        }
        if stake != round.stake {
            self.stake_changed.emit(&round.stake);
        }
        if reward != round.reward {
            self.reward_changed.emit(&round.reward);
        }
        Ok(())
    }

    pub fn balance(&self) -> Amount {
        self.state.borrow().balance
    }

    pub fn set_balance(&self, balance: Amount) {
        if self.update(balance, |s| &mut s.balance) {
            log::debug!("balance: {balance}");
            self.balance_changed.emit(&balance);
        }
    }

    pub fn reward(&self) -> Amount {
        self.state.borrow().reward
    }

    pub fn set_reward(&self, reward: Amount) {
        if self.update(reward, |s| &mut s.reward) {
            self.reward_changed.emit(&reward);
        }
    }

    pub fn multiplier(&self) -> Amount {
        self.state.borrow().multiplier
    }

    pub fn set_multiplier(&self, multiplier: Amount) {
        if self.update(multiplier, |s| &mut s.multiplier) {
            self.multiplier_changed.emit(&multiplier);
        }
    }

    pub fn reveal_count(&self) -> CellCount {
        self.state.borrow().reveal_count
    }

    pub fn set_reveal_count(&self, count: CellCount) {
        self.state.borrow_mut().reveal_count = count;
    }

    pub fn increment_reveal_count(&self) -> CellCount {
        let mut state = self.state.borrow_mut();
        state.reveal_count = state.reveal_count.saturating_add(1);
        state.reveal_count
    }

    /// Every safe cell has been revealed.
    pub fn is_cleared(&self) -> bool {
        let state = self.state.borrow();
        state.reveal_count >= state.grid.total_cells().saturating_sub(state.mine_count)
    }

    pub fn matrix(&self) -> GameMatrix {
        self.state.borrow().matrix.clone()
    }

    pub fn set_matrix(&self, matrix: GameMatrix) {
        self.state.borrow_mut().matrix = matrix;
    }

    pub fn clear_matrix(&self) {
        let mut state = self.state.borrow_mut();
        state.matrix = GameMatrix::empty(state.grid);
    }

    pub fn clicked_cells(&self) -> BTreeSet<Cell> {
        self.state.borrow().clicked.clone()
    }

    pub fn is_clicked(&self, cell: Cell) -> bool {
        self.state.borrow().clicked.contains(&cell)
    }

    pub fn record_clicked(&self, cell: Cell) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if !state.grid.contains(cell) {
            return Err(StoreError::InvalidCell(cell));
        }
        state.clicked.insert(cell);
        Ok(())
    }

    pub fn clear_clicked(&self) {
        self.state.borrow_mut().clicked.clear();
    }

    /// Every grid cell not yet revealed this round, row-major.
    pub fn unclicked_cells(&self) -> Vec<Cell> {
        let state = self.state.borrow();
        state
            .grid
            .iter_cells()
            .filter(|cell| !state.clicked.contains(cell))
            .collect()
    }

    pub fn on_round_started(&self, callback: impl Fn(&()) -> anyhow::Result<()> + 'static) -> Subscription {
        self.round_started.subscribe(callback)
    }

    pub fn on_round_ended(&self, callback: impl Fn(&()) -> anyhow::Result<()> + 'static) -> Subscription {
        self.round_ended.subscribe(callback)
    }

    pub fn on_balance_change(&self, callback: impl Fn(&Amount) -> anyhow::Result<()> + 'static) -> Subscription {
        self.balance_changed.subscribe(callback)
    }

    pub fn on_reward_change(&self, callback: impl Fn(&Amount) -> anyhow::Result<()> + 'static) -> Subscription {
        self.reward_changed.subscribe(callback)
    }

    pub fn on_multiplier_change(
        &self,
        callback: impl Fn(&Amount) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        self.multiplier_changed.subscribe(callback)
    }

    pub fn on_grid_change(&self, callback: impl Fn(&GridSize) -> anyhow::Result<()> + 'static) -> Subscription {
        self.grid_changed.subscribe(callback)
    }

    pub fn on_mines_change(&self, callback: impl Fn(&CellCount) -> anyhow::Result<()> + 'static) -> Subscription {
        self.mines_changed.subscribe(callback)
    }

    pub fn on_stake_change(&self, callback: impl Fn(&Amount) -> anyhow::Result<()> + 'static) -> Subscription {
        self.stake_changed.subscribe(callback)
    }

    pub fn on_bet_steps_change(
        &self,
        callback: impl Fn(&[Amount]) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        self.bet_steps_changed.subscribe(callback)
    }
}
