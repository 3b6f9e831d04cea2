//! Simulated page host.
//!
//! Models the capability surface the probe interposes on: listener
//! registration and dispatch, native and requested form submission, element
//! clicks, and the three outbound network transports. Host code always calls
//! through the current capability slot, so it cannot tell whether a probe is
//! installed.

pub mod capabilities;
pub mod dom;
pub mod event;
pub mod net;
pub mod page;

use thiserror::Error;

pub use capabilities::{Capabilities, Slot};
pub use dom::{Document, Element, ElementId, ReadyState};
pub use event::{Event, Listener, ListenerOptions, Target};
pub use net::{Body, FetchInput, FetchResponse, RequestInit, Transport, TransportId, TransportKind};
pub use page::{Location, Navigation, Page};

/// Failure raised by a host capability. Interposers hand it back untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct HostError {
    pub name: String,
    pub message: String,
}

impl HostError {
    pub fn new(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new("InvalidStateError", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFoundError", message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new("SyntaxError", message)
    }
}
