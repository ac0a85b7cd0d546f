//! Node events and a single-threaded event emitter.

use crate::error::ResourceError;
use crate::texture::Dimensions;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Events a node raises to application code, identical on every driver.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The node's texture finished loading
    Loaded(Dimensions),
    /// The node's texture or shader could not be made ready
    Failed(ResourceError),
    /// `destroy()` is about to detach the node
    BeforeDestroy,
    /// `destroy()` has detached the node
    AfterDestroy,
}

impl NodeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loaded(_) => "loaded",
            Self::Failed(_) => "failed",
            Self::BeforeDestroy => "beforeDestroy",
            Self::AfterDestroy => "afterDestroy",
        }
    }
}

/// Handle returned by [`EventEmitter::on`] for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<E> = Rc<dyn Fn(&E)>;

/// Dispatches events to registered handlers in registration order.
pub struct EventEmitter<E> {
    listeners: RefCell<Vec<(ListenerId, Handler<E>)>>,
    next_id: Cell<u64>,
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Register a handler.
    pub fn on(&self, handler: impl Fn(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Invoke every handler with `event`.
    ///
    /// Handlers may register or remove listeners while running; changes
    /// apply from the next emit.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let emitter = EventEmitter::<NodeEvent>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s1 = seen.clone();
        emitter.on(move |e| s1.borrow_mut().push(format!("a:{}", e.name())));
        let s2 = seen.clone();
        emitter.on(move |e| s2.borrow_mut().push(format!("b:{}", e.name())));

        emitter.emit(&NodeEvent::BeforeDestroy);
        assert_eq!(*seen.borrow(), vec!["a:beforeDestroy", "b:beforeDestroy"]);
    }

    #[test]
    fn test_off_and_remove_all() {
        let emitter = EventEmitter::<NodeEvent>::new();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        let id = emitter.on(move |_| c.set(c.get() + 1));
        assert!(emitter.off(id));
        assert!(!emitter.off(id));

        emitter.emit(&NodeEvent::AfterDestroy);
        assert_eq!(count.get(), 0);

        let c = count.clone();
        emitter.on(move |_| c.set(c.get() + 1));
        emitter.remove_all_listeners();
        emitter.emit(&NodeEvent::AfterDestroy);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_handler_may_remove_listeners() {
        let emitter = Rc::new(EventEmitter::<NodeEvent>::new());
        let count = Rc::new(Cell::new(0));

        let e = emitter.clone();
        let c = count.clone();
        emitter.on(move |_| {
            c.set(c.get() + 1);
            e.remove_all_listeners();
        });

        emitter.emit(&NodeEvent::BeforeDestroy);
        emitter.emit(&NodeEvent::BeforeDestroy);
        assert_eq!(count.get(), 1);
    }
}
