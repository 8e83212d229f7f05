//! Change notification: listeners keyed by event type, removed by key.
//!
//! Single-threaded. Listeners run synchronously in registration order and
//! may add or remove listeners (including themselves) while being notified;
//! such changes take effect from the next dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Event types dispatched by images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The observed object's state changed.
    Change,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Change => "change",
        }
    }
}

pub type Listener = Rc<dyn Fn()>;

/// Handle returned by [`Observable::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    id: u64,
    event: EventType,
}

impl ListenerKey {
    pub fn event(&self) -> EventType {
        self.event
    }
}

#[derive(Default)]
pub struct Observable {
    next_id: Cell<u64>,
    revision: Cell<u64>,
    listeners: RefCell<Vec<(ListenerKey, Listener)>>,
}

impl Observable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: EventType, listener: Listener) -> ListenerKey {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let key = ListenerKey { id, event };
        self.listeners.borrow_mut().push((key, listener));
        key
    }

    /// Remove the listener registered under `key`. Returns whether it existed.
    pub fn un_by_key(&self, key: ListenerKey) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(k, _)| *k != key);
        listeners.len() != before
    }

    /// Notify every listener of `event`.
    pub fn dispatch(&self, event: EventType) {
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(k, _)| k.event == event)
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener();
        }
    }

    /// Bump the revision counter and dispatch [`EventType::Change`].
    pub fn changed(&self) {
        self.revision.set(self.revision.get() + 1);
        self.dispatch(EventType::Change);
    }

    /// Number of [`Observable::changed`] calls so far.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn has_listeners(&self, event: EventType) -> bool {
        self.listeners.borrow().iter().any(|(k, _)| k.event == event)
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("revision", &self.revision.get())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}
