use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::dom::{Element, ElementId};

/// Callback registered on an event target.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Anything listeners can be attached to.
#[derive(Debug, Clone)]
pub enum Target {
    Window,
    Document,
    Element(Rc<Element>),
}

/// Non-owning key for per-target listener tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKey {
    Window,
    Document,
    Element(ElementId),
}

impl Target {
    pub fn as_element(&self) -> Option<&Rc<Element>> {
        match self {
            Target::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn key(&self) -> TargetKey {
        match self {
            Target::Window => TargetKey::Window,
            Target::Document => TargetKey::Document,
            Target::Element(el) => TargetKey::Element(el.id()),
        }
    }
}

impl From<&Rc<Element>> for Target {
    fn from(el: &Rc<Element>) -> Self {
        Target::Element(Rc::clone(el))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
}

/// The legacy boolean third argument only selects the phase.
impl From<bool> for ListenerOptions {
    fn from(capture: bool) -> Self {
        Self {
            capture,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct Event {
    event_type: String,
    bubbles: bool,
    cancelable: bool,
    default_prevented: Cell<bool>,
    in_passive_listener: Cell<bool>,
    submitter: Option<Rc<Element>>,
}

impl Event {
    pub fn new(event_type: &str, bubbles: bool, cancelable: bool) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles,
            cancelable,
            default_prevented: Cell::new(false),
            in_passive_listener: Cell::new(false),
            submitter: None,
        }
    }

    /// A cancelable, bubbling submit event as fired by the submission algorithm.
    pub fn submit(submitter: Option<Rc<Element>>) -> Self {
        Self {
            submitter,
            ..Self::new("submit", true, true)
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Ignored for non-cancelable events and inside passive listeners.
    pub fn prevent_default(&self) {
        if self.cancelable && !self.in_passive_listener.get() {
            self.default_prevented.set(true);
        }
    }

    pub fn submitter(&self) -> Option<&Rc<Element>> {
        self.submitter.as_ref()
    }

    pub(crate) fn set_passive(&self, passive: bool) {
        self.in_passive_listener.set(passive);
    }
}
