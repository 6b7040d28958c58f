use mines_core::{
    Cell, CellVisual, ClientConfig, Control, GridSize, HistoryBrowser, MinesTable, SessionStore,
    Subscription,
};
use mines_protocol::HistoryPage;
use std::cell::RefCell;
use std::fmt::Display;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::history::HttpHistorySource;
use crate::storage::{LocalOrDefault, Preferences};
use crate::timer::BrowserTimer;
use crate::transport::{WebSocketTransport, read_frames};
use crate::view::{BrowserBoard, BrowserHooks, SharedView, ViewState};

const HISTORY_PAGE_SIZE: u32 = 10;

#[derive(Properties, Clone, PartialEq)]
pub(crate) struct AppProps {
    pub config: ClientConfig,
    pub server: String,
    #[prop_or_default]
    pub history_url: Option<String>,
    #[prop_or_default]
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Msg {
    Redraw,
    Reveal(Cell),
    PickRandom,
    Bet,
    Cashout,
    MinesUp,
    MinesDown,
    BetUp,
    BetDown,
    Grid(GridSize),
    Restoring(bool),
    Failed(String),
    ToggleHistory,
    HistoryPrevious,
    HistoryNext,
    HistoryLoaded(Result<HistoryPage, String>),
}

pub(crate) struct TableApp {
    view: SharedView,
    table: Option<Rc<MinesTable>>,
    history: Option<Rc<HistoryBrowser>>,
    history_page: Option<HistoryPage>,
    history_open: bool,
    restoring: bool,
    error: Option<String>,
    _subscriptions: Vec<Subscription>,
}

fn redraw_on<T: ?Sized>(redraw: &Callback<()>) -> impl Fn(&T) -> anyhow::Result<()> + 'static {
    let redraw = redraw.clone();
    move |_| {
        redraw.emit(());
        Ok(())
    }
}

/// Redraws on every store change the view shows.
fn watch_store(store: &SessionStore, view: &SharedView, redraw: &Callback<()>) -> Vec<Subscription> {
    let grid_view = Rc::clone(view);
    let grid_redraw = redraw.clone();
    vec![
        store.on_balance_change(redraw_on(redraw)),
        store.on_reward_change(redraw_on(redraw)),
        store.on_multiplier_change(redraw_on(redraw)),
        store.on_mines_change(redraw_on(redraw)),
        store.on_stake_change(redraw_on(redraw)),
        store.on_round_started(redraw_on(redraw)),
        store.on_round_ended(redraw_on(redraw)),
        store.on_grid_change(move |grid| {
            {
                let mut view = grid_view.borrow_mut();
                view.size = *grid;
                view.cells.clear();
            }
            grid_redraw.emit(());
            Ok(())
        }),
    ]
}

impl TableApp {
    fn connect(ctx: &Context<Self>, view: &SharedView) -> Option<(Rc<MinesTable>, Vec<Subscription>)> {
        let props = ctx.props();
        let redraw = ctx.link().callback(|()| Msg::Redraw);

        let (transport, incoming) = match WebSocketTransport::open(&props.server) {
            Ok(opened) => opened,
            Err(err) => {
                log::error!("Could not open {}: {err}", props.server);
                return None;
            }
        };
        let table = match MinesTable::new(
            props.config.clone(),
            Rc::new(transport),
            Rc::new(BrowserTimer),
            Rc::new(BrowserBoard::new(Rc::clone(view), redraw.clone())),
            Rc::new(BrowserHooks::new(Rc::clone(view), redraw.clone())),
        ) {
            Ok(table) => Rc::new(table),
            Err(err) => {
                log::error!("Invalid table configuration: {err}");
                return None;
            }
        };

        Preferences::local_or_default().apply(table.store());

        let mut subscriptions = watch_store(table.store(), view, &redraw);
        let link = ctx.link().clone();
        subscriptions.push(table.recovery().on_restore_starting(move |_| {
            link.send_message(Msg::Restoring(true));
            Ok(())
        }));
        let link = ctx.link().clone();
        subscriptions.push(table.recovery().on_restore_complete(move |_| {
            link.send_message(Msg::Restoring(false));
            Ok(())
        }));

        spawn_local(read_frames(incoming, Rc::downgrade(&table)));
        Self::run(ctx, {
            let table = Rc::clone(&table);
            async move { table.startup().await }
        });

        Some((table, subscriptions))
    }

    /// Runs a table operation in the background and reports its failure.
    fn run<T, E: Display>(ctx: &Context<Self>, action: impl Future<Output = Result<T, E>> + 'static) {
        let link = ctx.link().clone();
        spawn_local(async move {
            if let Err(err) = action.await {
                log::warn!("{err}");
                link.send_message(Msg::Failed(err.to_string()));
            }
        });
    }

    fn load_history(ctx: &Context<Self>, history: &Rc<HistoryBrowser>, msg: Msg) {
        let history = Rc::clone(history);
        let link = ctx.link().clone();
        spawn_local(async move {
            let page = match msg {
                Msg::HistoryNext => history.next().await,
                Msg::HistoryPrevious => history.previous().await,
                _ => history.load(1, HISTORY_PAGE_SIZE).await,
            };
            link.send_message(Msg::HistoryLoaded(page.map_err(|err| err.to_string())));
        });
    }

    /// Settings changes are synchronous; remember them for the next visit.
    fn change_settings<T, E: Display>(&mut self, change: impl FnOnce(&SessionStore) -> Result<T, E>) -> bool {
        let Some(table) = &self.table else {
            return false;
        };
        match change(table.store()) {
            Ok(_) => {
                Preferences::capture(table.store()).local_save();
                self.error = None;
            }
            Err(err) => {
                log::warn!("{err}");
                self.error = Some(err.to_string());
            }
        }
        true
    }

    fn view_cell(&self, ctx: &Context<Self>, cell: Cell, visual: Option<CellVisual>, clickable: bool) -> Html {
        let class = classes!(
            "cell",
            match visual {
                None => classes!("closed"),
                Some(CellVisual::Diamond) => classes!("open", "diamond"),
                Some(CellVisual::StaticMine) => classes!("open", "mine"),
                Some(CellVisual::Blast) => classes!("open", "mine", "blast"),
            }
        );
        let onclick = (clickable && visual.is_none()).then(|| ctx.link().callback(move |_: MouseEvent| Msg::Reveal(cell)));
        html! { <td {class} {onclick}/> }
    }

    fn view_history(&self, ctx: &Context<Self>) -> Html {
        if !self.history_open {
            return html! {};
        }
        let Some(page) = &self.history_page else {
            return html! { <section class="history"><p>{"Loading…"}</p></section> };
        };
        html! {
            <section class="history">
                <table>
                    <tr><th>{"Ended"}</th><th>{"Bet"}</th><th>{"Won"}</th><th>{"Profit"}</th></tr>
                    {
                        for page.entries.iter().map(|entry| html! {
                            <tr>
                                <td>{entry.end_time.format("%Y-%m-%d %H:%M").to_string()}</td>
                                <td>{format!("{:.2}", entry.bet_amount)}</td>
                                <td>{format!("{:.2}", entry.amount_won)}</td>
                                <td>{format!("{:.2}", entry.profit)}</td>
                            </tr>
                        })
                    }
                </table>
                <footer>
                    <button disabled={!page.has_previous_page()} onclick={ctx.link().callback(|_| Msg::HistoryPrevious)}>{"‹"}</button>
                    <span>{format!("{}/{}", page.page, page.total_pages)}</span>
                    <button disabled={!page.has_next_page} onclick={ctx.link().callback(|_| Msg::HistoryNext)}>{"›"}</button>
                </footer>
            </section>
        }
    }
}

impl Component for TableApp {
    type Message = Msg;
    type Properties = AppProps;

    fn create(ctx: &Context<Self>) -> Self {
        let props = ctx.props();
        let view = Rc::new(RefCell::new(ViewState::new(props.config.default_grid)));

        let (table, subscriptions) = match Self::connect(ctx, &view) {
            Some((table, subscriptions)) => (Some(table), subscriptions),
            None => (None, Vec::new()),
        };
        let history = props.history_url.clone().map(|url| {
            let source = HttpHistorySource::new(url, props.token.clone());
            Rc::new(HistoryBrowser::new(Box::new(source), props.config.table_id.clone()))
        });
        let error = table.is_none().then(|| "Could not reach the table".to_string());

        Self {
            view,
            table,
            history,
            history_page: None,
            history_open: false,
            restoring: false,
            error,
            _subscriptions: subscriptions,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        use Msg::*;

        let Some(table) = self.table.clone() else {
            return false;
        };
        let dispatcher = Rc::clone(table.dispatcher());

        match msg {
            Redraw => true,
            Reveal(cell) => {
                log::debug!("reveal {cell:?}");
                Self::run(ctx, async move { dispatcher.reveal_cell(cell).await });
                false
            }
            PickRandom => {
                Self::run(ctx, async move { dispatcher.pick_random().await });
                false
            }
            Bet => {
                self.error = None;
                Self::run(ctx, async move { dispatcher.start_round().await });
                true
            }
            Cashout => {
                Self::run(ctx, async move { dispatcher.cash_out().await });
                false
            }
            MinesUp => self.change_settings(SessionStore::cycle_mines_up),
            MinesDown => self.change_settings(SessionStore::cycle_mines_down),
            BetUp => self.change_settings(SessionStore::cycle_bet_up),
            BetDown => self.change_settings(SessionStore::cycle_bet_down),
            Grid(grid) => self.change_settings(|store| store.set_grid(grid)),
            Restoring(restoring) => {
                self.restoring = restoring;
                true
            }
            Failed(error) => {
                self.error = Some(error);
                true
            }
            ToggleHistory => {
                self.history_open = !self.history_open;
                if let (true, Some(history)) = (self.history_open, &self.history) {
                    self.history_page = None;
                    Self::load_history(ctx, history, ToggleHistory);
                }
                true
            }
            HistoryPrevious | HistoryNext => {
                if let Some(history) = &self.history {
                    Self::load_history(ctx, history, msg);
                }
                false
            }
            HistoryLoaded(Ok(page)) => {
                self.history_page = Some(page);
                true
            }
            HistoryLoaded(Err(error)) => {
                self.error = Some(error);
                self.history_open = false;
                true
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        use Msg::*;

        let view = self.view.borrow().clone();
        let Some(table) = &self.table else {
            return html! { <div class="mines offline">{ for self.error.clone() }</div> };
        };
        let session = table.store().snapshot();
        let settings_enabled = view.is_enabled(Control::Settings) && !session.started;
        let grid_enabled = view.is_enabled(Control::Grid) && session.started && !self.restoring;
        let presets = table.config().grid_presets.clone();

        html! {
            <div class="mines">
                <nav>
                    <aside>{format!("Balance {:.2}", session.balance)}</aside>
                    <aside>{format!("×{:.2}", session.multiplier)}</aside>
                    <aside>{format!("Reward {:.2}", session.reward)}</aside>
                </nav>
                <table class={classes!(self.restoring.then_some("restoring"))}>
                    {
                        for (0..view.size.rows).map(|row| html! {
                            <tr>
                                {
                                    for (0..view.size.cols).map(|col| {
                                        let cell = Cell::new(row, col);
                                        self.view_cell(ctx, cell, view.cells.get(&cell).copied(), grid_enabled)
                                    })
                                }
                            </tr>
                        })
                    }
                </table>
                <section class="controls">
                    if view.bet_visible {
                        <button class="bet" disabled={!settings_enabled} onclick={ctx.link().callback(|_| Bet)}>
                            {format!("Bet {}", session.stake)}
                        </button>
                    }
                    if view.game_controls_visible {
                        <button class="cashout" disabled={!view.is_enabled(Control::Cashout)} onclick={ctx.link().callback(|_| Cashout)}>
                            {"Cash out"}
                        </button>
                        <button class="random" disabled={!view.is_enabled(Control::PickRandom)} onclick={ctx.link().callback(|_| PickRandom)}>
                            {"Random"}
                        </button>
                    }
                </section>
                <section class="settings">
                    <span>
                        <button disabled={!settings_enabled} onclick={ctx.link().callback(|_| BetDown)}>{"−"}</button>
                        {format!("Stake {}", session.stake)}
                        <button disabled={!settings_enabled} onclick={ctx.link().callback(|_| BetUp)}>{"+"}</button>
                    </span>
                    <span>
                        <button disabled={!settings_enabled} onclick={ctx.link().callback(|_| MinesDown)}>{"−"}</button>
                        {format!("Mines {}", session.mine_count)}
                        <button disabled={!settings_enabled} onclick={ctx.link().callback(|_| MinesUp)}>{"+"}</button>
                    </span>
                    <span>
                        {
                            for presets.into_iter().map(|grid| html! {
                                <button
                                    class={classes!((grid == session.grid).then_some("selected"))}
                                    disabled={!settings_enabled}
                                    onclick={ctx.link().callback(move |_| Grid(grid))}
                                >
                                    {format!("{}x{}", grid.cols, grid.rows)}
                                </button>
                            })
                        }
                    </span>
                    if self.history.is_some() {
                        <button onclick={ctx.link().callback(|_| ToggleHistory)}>{"History"}</button>
                    }
                </section>
                if view.low_balance {
                    <p class="low-balance">{"Insufficient balance for this stake"}</p>
                }
                if let Some(error) = &self.error {
                    <p class="error">{error.clone()}</p>
                }
                if let Some(amount) = view.win {
                    <dialog class="win" open={true}>{format!("You won {amount:.2}")}</dialog>
                }
                {self.view_history(ctx)}
            </div>
        }
    }
}
