//! Per-subject ledger of submission-listener registrations.
//!
//! Ledgers are keyed by [`ElementId`], which the document never reuses, and
//! hold the subject only through a `Weak`. The registry must never be the
//! reason a removed form stays alive; ledgers of reclaimed subjects are
//! pruned whenever a new subject is first seen.

use std::collections::HashMap;
use std::fmt;
use std::ptr;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use super::stack::OriginTrace;
use crate::host::{Element, ElementId, Event, Listener, ListenerOptions};

/// Identity of a registered callback. Never invoked, never kept alive.
#[derive(Clone)]
pub struct HandlerRef(Weak<dyn Fn(&Event)>);

impl HandlerRef {
    pub fn of(listener: &Listener) -> Self {
        Self(Rc::downgrade(listener))
    }

    pub fn refers_to(&self, listener: &Listener) -> bool {
        ptr::addr_eq(self.0.as_ptr(), Rc::as_ptr(listener))
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerRef({:p})", self.0.as_ptr() as *const ())
    }
}

#[derive(Debug, Clone)]
pub struct ListenerRegistration {
    subject: Weak<Element>,
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
    pub origin: OriginTrace,
    pub handler: HandlerRef,
}

impl ListenerRegistration {
    pub fn new(subject: &Rc<Element>, options: ListenerOptions, origin: OriginTrace, handler: HandlerRef) -> Self {
        Self {
            subject: Rc::downgrade(subject),
            capture: options.capture,
            once: options.once,
            passive: options.passive,
            origin,
            handler,
        }
    }

    /// The subject, if it has not been reclaimed yet.
    pub fn subject(&self) -> Option<Rc<Element>> {
        self.subject.upgrade()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub capture: usize,
    pub bubble: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ListenerSummary {
    pub count: usize,
    pub by_phase: PhaseCounts,
    pub entries: Vec<ListenerRegistration>,
}

struct Ledger {
    subject: Weak<Element>,
    entries: Vec<ListenerRegistration>,
}

#[derive(Default)]
pub struct ListenerRegistry {
    ledgers: HashMap<ElementId, Ledger>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a registration for `subject`. Unattributed registrations are ignored.
    pub fn record(&mut self, subject: Option<&Rc<Element>>, registration: ListenerRegistration) {
        let Some(subject) = subject else { return };
        if !self.ledgers.contains_key(&subject.id()) {
            self.prune();
        }
        self.ledgers
            .entry(subject.id())
            .or_insert_with(|| Ledger {
                subject: Rc::downgrade(subject),
                entries: Vec::new(),
            })
            .entries
            .push(registration);
    }

    pub fn summarize(&self, subject: &Element) -> ListenerSummary {
        let Some(ledger) = self.ledgers.get(&subject.id()) else {
            return ListenerSummary::default();
        };
        let capture = ledger.entries.iter().filter(|e| e.capture).count();
        ListenerSummary {
            count: ledger.entries.len(),
            by_phase: PhaseCounts {
                capture,
                bubble: ledger.entries.len() - capture,
            },
            entries: ledger.entries.clone(),
        }
    }

    /// Drops ledgers whose subject has been reclaimed. Returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.ledgers.len();
        self.ledgers.retain(|_, ledger| ledger.subject.strong_count() > 0);
        before - self.ledgers.len()
    }

    pub fn tracked_subjects(&self) -> usize {
        self.ledgers.len()
    }
}
