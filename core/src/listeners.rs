use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T) -> anyhow::Result<()>>;
type Entries<T> = RefCell<Vec<(u64, Callback<T>)>>;

/// An ordered set of change listeners.
///
/// Listeners run synchronously in registration order. A listener returning an
/// error is logged and the remaining ones still run. Listeners may subscribe,
/// unsubscribe or read the owner while an emit is in progress, the set is
/// snapshotted before firing.
pub struct Listeners<T: ?Sized> {
    name: &'static str,
    next_id: Cell<u64>,
    entries: Rc<Entries<T>>,
}

impl<T: ?Sized + 'static> Listeners<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: Cell::new(0),
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&T) -> anyhow::Result<()> + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let callback: Callback<T> = Rc::new(callback);
        self.entries.borrow_mut().push((id, callback));

        let entries: Weak<Entries<T>> = Rc::downgrade(&self.entries);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(entries) = entries.upgrade() {
                    entries.borrow_mut().retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        log::trace!("{}: notifying {} listener(s)", self.name, snapshot.len());
        for (index, callback) in snapshot.iter().enumerate() {
            if let Err(err) = callback(value) {
                log::error!("{} listener #{index} failed: {err:#}", self.name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its listener when dropped.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Keeps the listener registered for as long as its owner lives.
    pub fn forget(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}
