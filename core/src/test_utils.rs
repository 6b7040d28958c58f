//! Deterministic doubles for the transport, timer and view seams.

use futures_channel::oneshot;
use futures_executor::{LocalPool, LocalSpawner};
use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::task::LocalSpawnExt;
use mines_protocol::{Operation, RequestId};
use serde_json::{Map, Value, json};
use std::cell::{Cell as StdCell, RefCell};
use std::collections::BTreeSet;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::*;

/// How long the blast visual keeps a reveal busy.
pub const BLAST_DURATION: Duration = Duration::from_millis(400);

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Sent(Operation),
    Show(Cell, CellVisual),
    Settled(Cell),
    Regenerate(GridSize),
    View(ViewUpdate),
    Started,
    Ended,
}

/// Shared, ordered record of everything the doubles observed.
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn views(&self) -> Vec<ViewUpdate> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::View(update) => Some(*update),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == event)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Timer whose clock only moves when a sleeper is fired.
#[derive(Default)]
pub struct VirtualTimer {
    now: StdCell<Duration>,
    seq: StdCell<u64>,
    sleepers: RefCell<Vec<(Duration, u64, oneshot::Sender<()>)>>,
}

impl VirtualTimer {
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Wakes the earliest live sleeper and moves the clock to its deadline.
    /// Sleepers whose future was dropped are discarded without moving the clock.
    pub fn fire_next(&self) -> bool {
        let next = {
            let mut sleepers = self.sleepers.borrow_mut();
            sleepers.retain(|(_, _, wake)| !wake.is_canceled());
            let index = sleepers
                .iter()
                .enumerate()
                .min_by_key(|(_, (deadline, seq, _))| (*deadline, *seq))
                .map(|(index, _)| index);
            index.map(|index| sleepers.remove(index))
        };
        match next {
            Some((deadline, _, wake)) => {
                self.now.set(deadline);
                let _ = wake.send(());
                true
            }
            None => false,
        }
    }
}

impl Timer for VirtualTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let (wake, woken) = oneshot::channel();
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.sleepers
            .borrow_mut()
            .push((self.now.get() + duration, seq, wake));
        woken.map(|_| ()).boxed_local()
    }
}

#[derive(Clone, Debug)]
pub enum Reply {
    /// `200 OK` with these body fields.
    Ok(Value),
    /// Status and error description.
    Status(&'static str, &'static str),
    /// Never answered.
    Hold,
}

struct Received {
    operation: Operation,
    id: Option<RequestId>,
    data: Value,
    held: bool,
}

/// Remote authority answering from per-operation scripts.
///
/// Answers are queued and only reach the client through [`Harness::settle`].
/// Operations without a script are held.
pub struct ScriptedServer {
    log: EventLog,
    script: RefCell<Vec<(Operation, Reply)>>,
    received: RefCell<Vec<Received>>,
    outbox: RefCell<Vec<String>>,
    disconnected: StdCell<bool>,
}

impl ScriptedServer {
    fn new(log: EventLog) -> Self {
        Self {
            log,
            script: RefCell::new(Vec::new()),
            received: RefCell::new(Vec::new()),
            outbox: RefCell::new(Vec::new()),
            disconnected: StdCell::new(false),
        }
    }

    pub fn reply(&self, operation: Operation, reply: Reply) {
        self.script.borrow_mut().push((operation, reply));
    }

    pub fn hold(&self, operation: Operation) {
        self.reply(operation, Reply::Hold);
    }

    pub fn disconnect(&self) {
        self.disconnected.set(true);
    }

    pub fn held_ids(&self, operation: Operation) -> Vec<RequestId> {
        self.received
            .borrow()
            .iter()
            .filter(|r| r.held && r.operation == operation)
            .filter_map(|r| r.id)
            .collect()
    }

    pub fn requests(&self, operation: Operation) -> Vec<Value> {
        self.received
            .borrow()
            .iter()
            .filter(|r| r.operation == operation)
            .map(|r| r.data.clone())
            .collect()
    }

    pub fn sent(&self) -> Vec<Operation> {
        self.received.borrow().iter().map(|r| r.operation).collect()
    }

    pub fn clear_requests(&self) {
        self.received.borrow_mut().clear();
    }

    pub fn pop_outgoing(&self) -> Option<String> {
        let mut outbox = self.outbox.borrow_mut();
        if outbox.is_empty() {
            None
        } else {
            Some(outbox.remove(0))
        }
    }

    fn next_reply(&self, operation: Operation) -> Reply {
        let mut script = self.script.borrow_mut();
        match script.iter().position(|(op, _)| *op == operation) {
            Some(index) => script.remove(index).1,
            None => Reply::Hold,
        }
    }
}

impl Transport for ScriptedServer {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.disconnected.get() {
            return Err(TransportError::Closed);
        }
        let frame: Value =
            serde_json::from_str(&frame).map_err(|err| TransportError::Send(err.to_string()))?;
        let operation: Operation = serde_json::from_value(frame["operation"].clone())
            .map_err(|err| TransportError::Send(err.to_string()))?;
        let id = frame["requestId"].as_u64();
        self.log.push(Event::Sent(operation));

        let mut response = Map::new();
        response.insert("operation".into(), json!(operation.as_str()));
        if let Some(id) = id {
            response.insert("requestId".into(), json!(id));
        }
        let reply = self.next_reply(operation);
        let held = matches!(reply, Reply::Hold);
        match reply {
            Reply::Ok(body) => {
                response.insert("status".into(), json!("200 OK"));
                if let Value::Object(body) = body {
                    response.extend(body);
                }
            }
            Reply::Status(status, description) => {
                response.insert("status".into(), json!(status));
                response.insert("errorDescription".into(), json!(description));
            }
            Reply::Hold => {}
        }
        if !held {
            self.outbox
                .borrow_mut()
                .push(Value::Object(response).to_string());
        }

        self.received.borrow_mut().push(Received {
            operation,
            id,
            data: frame["data"].clone(),
            held,
        });
        Ok(())
    }
}

/// Board double; blasts take [`BLAST_DURATION`] of virtual time.
pub struct RecordingBoard {
    log: EventLog,
    timer: Rc<VirtualTimer>,
    revealed: RefCell<BTreeSet<Cell>>,
    failing: RefCell<BTreeSet<Cell>>,
    shown: RefCell<Vec<(Cell, CellVisual)>>,
}

impl RecordingBoard {
    pub fn mark_revealed(&self, cell: Cell) {
        self.revealed.borrow_mut().insert(cell);
    }

    pub fn fail_on(&self, cell: Cell) {
        self.failing.borrow_mut().insert(cell);
    }

    /// Successful shows since the last regenerate.
    pub fn shown(&self) -> Vec<(Cell, CellVisual)> {
        self.shown.borrow().clone()
    }
}

impl BoardView for RecordingBoard {
    fn is_revealed(&self, cell: Cell) -> bool {
        self.revealed.borrow().contains(&cell)
    }

    fn show(&self, cell: Cell, visual: CellVisual) -> Result<LocalBoxFuture<'static, ()>, VisualError> {
        if self.failing.borrow().contains(&cell) {
            return Err(VisualError::Failed(format!("{cell:?} is broken")));
        }
        self.revealed.borrow_mut().insert(cell);
        self.shown.borrow_mut().push((cell, visual));
        self.log.push(Event::Show(cell, visual));

        if !visual.is_terminal() {
            return Ok(futures_util::future::ready(()).boxed_local());
        }
        let log = self.log.clone();
        let blast = self.timer.sleep(BLAST_DURATION);
        Ok(async move {
            blast.await;
            log.push(Event::Settled(cell));
        }
        .boxed_local())
    }

    fn regenerate(&self, size: GridSize) {
        self.revealed.borrow_mut().clear();
        self.shown.borrow_mut().clear();
        self.log.push(Event::Regenerate(size));
    }
}

pub struct RecordingHooks(EventLog);

impl ViewHooks for RecordingHooks {
    fn apply(&self, update: ViewUpdate) {
        self.0.push(Event::View(update));
    }
}

/// Uses the queued index once, then falls back to the OS picker.
struct ScriptedPicker(Rc<StdCell<Option<usize>>>);

impl CellPicker for ScriptedPicker {
    fn pick(&self, len: usize) -> Result<usize, DispatchError> {
        match self.0.take() {
            Some(index) => Ok(index),
            None => OsCellPicker.pick(len),
        }
    }
}

/// Result slot of a spawned future.
pub struct Outcome<T>(Rc<RefCell<Option<T>>>);

impl<T> Outcome<T> {
    pub fn take(&self) -> Option<T> {
        self.0.borrow_mut().take()
    }

    pub fn is_ready(&self) -> bool {
        self.0.borrow().is_some()
    }
}

pub struct Harness {
    pool: LocalPool,
    spawner: LocalSpawner,
    pub config: ClientConfig,
    pub log: EventLog,
    pub timer: Rc<VirtualTimer>,
    pub server: Rc<ScriptedServer>,
    pub client: Rc<RequestClient>,
    pub store: Rc<SessionStore>,
    pub board: Rc<RecordingBoard>,
    pub reveal: Rc<RevealEngine>,
    table: Rc<MinesTable>,
    next_pick: Rc<StdCell<Option<usize>>>,
    _subscriptions: Vec<Subscription>,
}

impl Harness {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        let config = ClientConfig::default();
        let log = EventLog::default();
        let timer = Rc::new(VirtualTimer::default());
        let server = Rc::new(ScriptedServer::new(log.clone()));
        let board = Rc::new(RecordingBoard {
            log: log.clone(),
            timer: timer.clone(),
            revealed: RefCell::default(),
            failing: RefCell::default(),
            shown: RefCell::default(),
        });
        let next_pick = Rc::new(StdCell::new(None));
        let table = Rc::new(
            MinesTable::with_picker(
                config.clone(),
                server.clone(),
                timer.clone(),
                board.clone(),
                Rc::new(RecordingHooks(log.clone())),
                Box::new(ScriptedPicker(next_pick.clone())),
            )
            .unwrap(),
        );
        let client = Rc::clone(table.client());
        let store = Rc::clone(table.store());
        let reveal = Rc::clone(table.reveal());

        let started_log = log.clone();
        let ended_log = log.clone();
        let subscriptions = vec![
            store.on_round_started(move |_| {
                started_log.push(Event::Started);
                Ok(())
            }),
            store.on_round_ended(move |_| {
                ended_log.push(Event::Ended);
                Ok(())
            }),
        ];

        Self {
            pool,
            spawner,
            config,
            log,
            timer,
            server,
            client,
            store,
            board,
            reveal,
            table,
            next_pick,
            _subscriptions: subscriptions,
        }
    }

    pub fn table(&self) -> Rc<MinesTable> {
        Rc::clone(&self.table)
    }

    pub fn dispatcher(&self) -> Rc<ActionDispatcher> {
        Rc::clone(self.table.dispatcher())
    }

    pub fn recovery(&self) -> PendingRoundRecovery {
        PendingRoundRecovery::new(
            self.store.clone(),
            self.client.clone(),
            self.reveal.clone(),
            self.timer.clone(),
            self.config.restore_settle(),
        )
    }

    /// Makes the next random pick return `index`.
    pub fn pick_next(&self, index: usize) {
        self.next_pick.set(Some(index));
    }

    /// Scripts a successful round start followed by a bet leaving `balance`.
    pub fn script_round_start(&self, round_id: &str, balance: Amount) {
        self.server
            .reply(Operation::RoundStart, Reply::Ok(json!({"roundId": round_id})));
        self.server
            .reply(Operation::PlaceBet, Reply::Ok(json!({"balance": balance})));
    }

    pub fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Outcome<T> {
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        self.spawner
            .spawn_local(async move {
                let value = future.await;
                *sink.borrow_mut() = Some(value);
            })
            .unwrap();
        Outcome(slot)
    }

    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Runs until no task can progress, delivering queued answers first and
    /// firing timers only when nothing else is left.
    pub fn settle(&mut self) {
        loop {
            self.pool.run_until_stalled();
            if let Some(frame) = self.server.pop_outgoing() {
                self.client.handle_incoming(&frame);
                continue;
            }
            if self.timer.fire_next() {
                continue;
            }
            break;
        }
    }
}
