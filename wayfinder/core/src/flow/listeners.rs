//! Listener registration for flow controllers
//!
//! Listeners live outside the controller's state slot so that replacing the
//! state never touches them. Emission iterates over a snapshot, which lets a
//! listener add or dispose listeners (or navigate) while being notified.
//!
//! A listener that navigates triggers a nested emission, which reaches every
//! listener first. The outer emission is then superseded and stops: the
//! listeners it had not reached yet never see the stale event.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::{FlowEvent, FlowListener};

type SharedListener<V> = Rc<dyn Fn(&FlowEvent<V>)>;

struct Slots<V> {
    next_id: u64,
    /// Bumped by every emission
    generation: u64,
    entries: Vec<(u64, SharedListener<V>)>,
}

/// Ordered collection of flow listeners
pub struct ListenerSet<V> {
    slots: Rc<RefCell<Slots<V>>>,
}

impl<V: 'static> Default for ListenerSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> ListenerSet<V> {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                generation: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a listener, returning its handle and a shared reference to it
    /// (used by controllers to replay the current screen)
    pub fn add(&self, listener: FlowListener<V>) -> (ListenerHandle, Rc<dyn Fn(&FlowEvent<V>)>) {
        let listener: SharedListener<V> = Rc::from(listener);
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.entries.push((id, Rc::clone(&listener)));
            id
        };

        let weak: Weak<RefCell<Slots<V>>> = Rc::downgrade(&self.slots);
        let handle = ListenerHandle::new(move || {
            if let Some(slots) = weak.upgrade() {
                slots.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
            }
        });
        (handle, listener)
    }

    /// Notify every listener still registered at the time of its turn
    ///
    /// Stops early once a listener caused a newer emission.
    pub fn emit(&self, event: &FlowEvent<V>) {
        let (generation, snapshot) = {
            let mut slots = self.slots.borrow_mut();
            slots.generation += 1;
            let snapshot: Vec<(u64, SharedListener<V>)> = slots
                .entries
                .iter()
                .map(|(id, listener)| (*id, Rc::clone(listener)))
                .collect();
            (slots.generation, snapshot)
        };

        for (id, listener) in snapshot {
            let (superseded, registered) = {
                let slots = self.slots.borrow();
                (
                    slots.generation != generation,
                    slots.entries.iter().any(|(e, _)| *e == id),
                )
            };
            if superseded {
                tracing::debug!(?event, "Event superseded by a newer one");
                return;
            }
            if registered {
                listener(event);
            }
        }
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().entries.len()
    }

    /// Whether no listener is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration handle returned by `add_listener`
///
/// [`dispose`](Self::dispose) deregisters the listener and is idempotent.
/// Dropping the handle does not deregister.
pub struct ListenerHandle {
    disposer: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl ListenerHandle {
    fn new(disposer: impl FnOnce() + 'static) -> Self {
        Self {
            disposer: RefCell::new(Some(Box::new(disposer))),
        }
    }

    /// Deregister the listener
    pub fn dispose(&self) {
        let disposer = self.disposer.borrow_mut().take();
        if let Some(disposer) = disposer {
            disposer();
        }
    }

    /// Whether [`dispose`](Self::dispose) was called
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposer.borrow().is_none()
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
