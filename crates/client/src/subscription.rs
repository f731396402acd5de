// Scoped event subscriptions.
//
// Every handler registration returns a guard; dropping the guard removes
// the handler. Tearing down a view drops its guards, so no state update can
// reach an unmounted view — the one hard lifecycle invariant of this
// client. Handlers must not register or drop subscriptions from inside a
// callback (dispatch holds the registry borrow).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Handler<E> = Box<dyn FnMut(&E)>;

struct Slot<E> {
    id: u64,
    handler: Handler<E>,
}

struct Inner<E> {
    next_id: u64,
    slots: Vec<Slot<E>>,
}

/// A set of event handlers with scoped lifetimes.
pub struct SubscriptionSet<E> {
    inner: Rc<RefCell<Inner<E>>>,
}

impl<E> SubscriptionSet<E> {
    pub fn new() -> Self {
        Self { inner: Rc::new(RefCell::new(Inner { next_id: 1, slots: Vec::new() })) }
    }

    /// Register a handler. It stays registered until the guard is dropped.
    pub fn subscribe(&self, handler: impl FnMut(&E) + 'static) -> SubscriptionGuard
    where
        E: 'static,
    {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.slots.push(Slot { id, handler: Box::new(handler) });
            id
        };

        let weak: Weak<RefCell<Inner<E>>> = Rc::downgrade(&self.inner);
        SubscriptionGuard {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().slots.retain(|slot| slot.id != id);
                }
            })),
        }
    }

    /// Deliver `event` to every live handler, in registration order.
    pub fn emit(&self, event: &E) {
        let mut inner = self.inner.borrow_mut();
        for slot in inner.slots.iter_mut() {
            (slot.handler)(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for SubscriptionSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deregisters its handler when dropped.
pub struct SubscriptionGuard {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard").finish_non_exhaustive()
    }
}
