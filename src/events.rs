use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Result;
use crate::dom::NodeId;
use crate::harness::Harness;

/// Where a listener is attached. The window sits above the document in the
/// propagation path, exactly like the browser's `window` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

pub(crate) type HandlerFn = dyn FnMut(&mut Harness, &mut EventState) -> Result<()>;

/// A registered callback. Cloning shares the underlying callback, and two
/// clones compare equal, so the exact registration can later be removed.
#[derive(Clone)]
pub struct Handler(Rc<RefCell<HandlerFn>>);

impl Handler {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&mut Harness, &mut EventState) -> Result<()> + 'static,
    {
        Self(Rc::new(RefCell::new(callback)))
    }

    pub(crate) fn invoke(&self, harness: &mut Harness, event: &mut EventState) -> Result<()> {
        (self.0.borrow_mut())(harness, event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub(crate) capture: bool,
    pub(crate) handler: Handler,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ListenerStore {
    map: HashMap<EventTarget, HashMap<String, Vec<Listener>>>,
}

impl ListenerStore {
    pub(crate) fn add(&mut self, target: EventTarget, event: String, listener: Listener) {
        let listeners = self.map.entry(target).or_default().entry(event).or_default();
        // Duplicate (handler, capture) pairs are ignored, like addEventListener.
        if listeners
            .iter()
            .any(|existing| existing.capture == listener.capture && existing.handler == listener.handler)
        {
            return;
        }
        listeners.push(listener);
    }

    pub(crate) fn remove(
        &mut self,
        target: EventTarget,
        event: &str,
        capture: bool,
        handler: &Handler,
    ) -> bool {
        let Some(events) = self.map.get_mut(&target) else {
            return false;
        };
        let Some(listeners) = events.get_mut(event) else {
            return false;
        };

        if let Some(pos) = listeners
            .iter()
            .position(|listener| listener.capture == capture && listener.handler == *handler)
        {
            listeners.remove(pos);
            if listeners.is_empty() {
                events.remove(event);
            }
            if events.is_empty() {
                self.map.remove(&target);
            }
            return true;
        }

        false
    }

    pub(crate) fn get(&self, target: EventTarget, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.capture == capture)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn contains(
        &self,
        target: EventTarget,
        event: &str,
        capture: bool,
        handler: &Handler,
    ) -> bool {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .is_some_and(|listeners| {
                listeners
                    .iter()
                    .any(|listener| listener.capture == capture && listener.handler == *handler)
            })
    }

    pub(crate) fn count(&self, target: EventTarget, event: &str) -> usize {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Observable state of a dispatched event, returned to the caller once
/// propagation finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventState {
    pub event_type: String,
    pub target: EventTarget,
    pub current_target: EventTarget,
    pub time_stamp_ms: i64,
    pub bubbles: bool,
    pub cancelable: bool,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl EventState {
    pub(crate) fn new(event_type: &str, target: EventTarget, time_stamp_ms: i64) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            time_stamp_ms,
            bubbles: true,
            cancelable: true,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub(crate) fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub(crate) fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped
    }
}
