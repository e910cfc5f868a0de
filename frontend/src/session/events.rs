use std::cell::RefCell;
use std::rc::Rc;

/// Reason a session left the `Expired` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    IdleTimeout,
    AbsoluteTimeout,
}

impl ExpiryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryReason::IdleTimeout => "idle-timeout",
            ExpiryReason::AbsoluteTimeout => "absolute-timeout",
        }
    }
}

type Handler<T> = Rc<dyn Fn(&T)>;
type HandlerList<T> = Rc<RefCell<Vec<(u64, Handler<T>)>>>;

/// One list of listeners for a single event kind. Each subscription gets its
/// own disposer; emitting snapshots the list first so a handler that
/// subscribes or disposes during delivery cannot corrupt the iteration.
pub struct Listeners<T> {
    handlers: HandlerList<T>,
    next_id: RefCell<u64>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            handlers: Rc::new(RefCell::new(Vec::new())),
            next_id: RefCell::new(0),
        }
    }
}

impl<T: 'static> Listeners<T> {
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            *next
        };
        self.handlers.borrow_mut().push((id, Rc::new(handler)));

        let handlers = Rc::clone(&self.handlers);
        Subscription {
            detach: Box::new(move || {
                handlers.borrow_mut().retain(|(entry, _)| *entry != id);
            }),
        }
    }

    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(payload);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }
}

/// Handle returned by every `on_*` registration. Dropping it without calling
/// [`Subscription::dispose`] leaves the listener attached for the lifetime of
/// the emitter, mirroring an unused disposer.
#[must_use = "dispose() detaches the listener; hold the handle if you intend to"]
pub struct Subscription {
    detach: Box<dyn FnOnce()>,
}

impl Subscription {
    pub fn dispose(self) {
        (self.detach)();
    }
}

/// The controller's event surface: one listener list per lifecycle event.
#[derive(Default)]
pub struct SessionEvents {
    pub activity: Listeners<(i64, i64)>,
    pub warning: Listeners<i64>,
    pub expired: Listeners<ExpiryReason>,
    pub regenerated: Listeners<(String, String)>,
    pub invalidated: Listeners<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emit_reaches_every_listener() {
        let listeners: Listeners<i64> = Listeners::default();
        let seen = Rc::new(Cell::new(0));

        let a = Rc::clone(&seen);
        let _sub_a = listeners.subscribe(move |v| a.set(a.get() + *v));
        let b = Rc::clone(&seen);
        let _sub_b = listeners.subscribe(move |v| b.set(b.get() + *v));

        listeners.emit(&3);
        assert_eq!(seen.get(), 6);
    }

    #[test]
    fn dispose_detaches_only_that_registration() {
        let listeners: Listeners<()> = Listeners::default();
        let hits = Rc::new(Cell::new(0));

        let a = Rc::clone(&hits);
        let sub_a = listeners.subscribe(move |_| a.set(a.get() + 1));
        let b = Rc::clone(&hits);
        let _sub_b = listeners.subscribe(move |_| b.set(b.get() + 10));

        sub_a.dispose();
        listeners.emit(&());
        assert_eq!(hits.get(), 10);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn disposing_twice_subscribed_same_closure_is_independent() {
        let listeners: Listeners<()> = Listeners::default();
        let hits = Rc::new(Cell::new(0));

        let make = |hits: &Rc<Cell<i32>>| {
            let hits = Rc::clone(hits);
            move |_: &()| hits.set(hits.get() + 1)
        };
        let first = listeners.subscribe(make(&hits));
        let _second = listeners.subscribe(make(&hits));

        first.dispose();
        listeners.emit(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn listener_disposing_during_emit_does_not_skip_others() {
        let listeners: Rc<Listeners<()>> = Rc::new(Listeners::default());
        let hits = Rc::new(Cell::new(0));

        let sub_holder: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let holder = Rc::clone(&sub_holder);
        let first = listeners.subscribe(move |_| {
            if let Some(sub) = holder.borrow_mut().take() {
                sub.dispose();
            }
        });
        let counted = Rc::clone(&hits);
        let second = listeners.subscribe(move |_| counted.set(counted.get() + 1));
        *sub_holder.borrow_mut() = Some(second);

        listeners.emit(&());
        // The second listener was snapshot before the first disposed it.
        assert_eq!(hits.get(), 1);
        listeners.emit(&());
        assert_eq!(hits.get(), 1);
        first.dispose();
    }

    #[test]
    fn expiry_reason_codes() {
        assert_eq!(ExpiryReason::IdleTimeout.as_str(), "idle-timeout");
        assert_eq!(ExpiryReason::AbsoluteTimeout.as_str(), "absolute-timeout");
    }
}
