use futures_util::future::{self, FutureExt, LocalBoxFuture};
use gloo::timers::callback::Timeout;
use gloo::timers::future::TimeoutFuture;
use mines_core::{Amount, BoardView, Cell, CellVisual, Control, GridSize, ViewHooks, ViewUpdate, VisualError};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use yew::Callback;

/// How long the blast animation plays.
const BLAST_MS: u32 = 600;

/// The win banner hides itself after this long.
const WIN_BANNER_MS: u32 = 2_000;

/// What the table component renders, written by the board and view hooks.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ViewState {
    pub size: GridSize,
    pub cells: BTreeMap<Cell, CellVisual>,
    pub disabled: HashSet<Control>,
    pub bet_visible: bool,
    pub game_controls_visible: bool,
    pub win: Option<Amount>,
    pub low_balance: bool,
}

impl ViewState {
    pub(crate) fn new(size: GridSize) -> Self {
        Self {
            size,
            cells: BTreeMap::new(),
            disabled: HashSet::new(),
            bet_visible: true,
            game_controls_visible: false,
            win: None,
            low_balance: false,
        }
    }

    pub(crate) fn is_enabled(&self, control: Control) -> bool {
        !self.disabled.contains(&control)
    }

    fn apply(&mut self, update: ViewUpdate) {
        use ViewUpdate::*;
        match update {
            Enable(control) => {
                self.disabled.remove(&control);
            }
            Disable(control) => {
                self.disabled.insert(control);
            }
            ShowBet => self.bet_visible = true,
            HideBet => {
                self.bet_visible = false;
                self.low_balance = false;
            }
            ShowGameControls => self.game_controls_visible = true,
            HideGameControls => self.game_controls_visible = false,
            ShowWin(amount) => self.win = Some(amount),
            HideWin => self.win = None,
            LowBalance => self.low_balance = true,
        }
    }
}

pub(crate) type SharedView = Rc<RefCell<ViewState>>;

/// Cell visuals as CSS classes on the rendered grid.
pub(crate) struct BrowserBoard {
    state: SharedView,
    redraw: Callback<()>,
}

impl BrowserBoard {
    pub(crate) fn new(state: SharedView, redraw: Callback<()>) -> Self {
        Self { state, redraw }
    }
}

impl BoardView for BrowserBoard {
    fn is_revealed(&self, cell: Cell) -> bool {
        self.state.borrow().cells.contains_key(&cell)
    }

    fn show(&self, cell: Cell, visual: CellVisual) -> Result<LocalBoxFuture<'static, ()>, VisualError> {
        {
            let mut state = self.state.borrow_mut();
            if !state.size.contains(cell) {
                return Err(VisualError::MissingCell(cell));
            }
            state.cells.insert(cell, visual);
        }
        self.redraw.emit(());

        if visual.is_terminal() {
            Ok(TimeoutFuture::new(BLAST_MS).boxed_local())
        } else {
            Ok(future::ready(()).boxed_local())
        }
    }

    fn regenerate(&self, size: GridSize) {
        {
            let mut state = self.state.borrow_mut();
            state.size = size;
            state.cells.clear();
        }
        self.redraw.emit(());
    }
}

/// Control visibility and the win banner.
pub(crate) struct BrowserHooks {
    state: SharedView,
    redraw: Callback<()>,
    win_timeout: RefCell<Option<Timeout>>,
}

impl BrowserHooks {
    pub(crate) fn new(state: SharedView, redraw: Callback<()>) -> Self {
        Self {
            state,
            redraw,
            win_timeout: RefCell::new(None),
        }
    }
}

impl ViewHooks for BrowserHooks {
    fn apply(&self, update: ViewUpdate) {
        log::trace!("view: {update:?}");
        self.state.borrow_mut().apply(update);

        match update {
            ViewUpdate::ShowWin(_) => {
                let state = Rc::clone(&self.state);
                let redraw = self.redraw.clone();
                let timeout = Timeout::new(WIN_BANNER_MS, move || {
                    state.borrow_mut().win = None;
                    redraw.emit(());
                });
                self.win_timeout.replace(Some(timeout));
            }
            ViewUpdate::HideWin => {
                // dropping the handle cancels the pending hide
                self.win_timeout.replace(None);
            }
            _ => {}
        }
        self.redraw.emit(());
    }
}
