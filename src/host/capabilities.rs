use std::rc::Rc;

use super::dom::Element;
use super::event::{Event, Listener, ListenerOptions, Target};
use super::net::{Body, FetchInput, FetchResponse, RequestInit, Transport};
use super::HostError;

pub type AddListenerFn = Rc<dyn Fn(&Target, &str, Listener, ListenerOptions) -> Result<(), HostError>>;
pub type DispatchFn = Rc<dyn Fn(&Target, &Event) -> Result<bool, HostError>>;
pub type SubmitFn = Rc<dyn Fn(&Rc<Element>) -> Result<(), HostError>>;
pub type RequestSubmitFn = Rc<dyn Fn(&Rc<Element>, Option<&Rc<Element>>) -> Result<(), HostError>>;
pub type ClickFn = Rc<dyn Fn(&Rc<Element>) -> Result<(), HostError>>;
pub type FetchFn = Rc<dyn Fn(&FetchInput, Option<&RequestInit>) -> Result<FetchResponse, HostError>>;
pub type BeaconFn = Rc<dyn Fn(&str, Option<&Body>) -> Result<bool, HostError>>;
pub type OpenFn = Rc<dyn Fn(&Rc<Transport>, &str, &str) -> Result<(), HostError>>;
pub type SendFn = Rc<dyn Fn(&Rc<Transport>, Option<&Body>) -> Result<(), HostError>>;

/// One substitutable capability.
///
/// Keeps the native callable next to the one host code currently reaches,
/// plus a marker so a second wrap is refused instead of stacking.
pub struct Slot<F: Clone> {
    original: F,
    current: F,
    wrapped: bool,
}

impl<F: Clone> Slot<F> {
    pub fn new(native: F) -> Self {
        Self {
            original: native.clone(),
            current: native,
            wrapped: false,
        }
    }

    pub fn current(&self) -> F {
        self.current.clone()
    }

    pub fn original(&self) -> F {
        self.original.clone()
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Replaces the current callable with `decorate(current)`.
    /// Returns false, leaving the slot untouched, if it was already wrapped.
    pub fn wrap(&mut self, decorate: impl FnOnce(F) -> F) -> bool {
        if self.wrapped {
            return false;
        }
        self.current = decorate(self.current.clone());
        self.wrapped = true;
        true
    }
}

/// The full capability table of one page. Optional slots model hosts that
/// lack the capability entirely.
pub struct Capabilities {
    pub add_event_listener: Slot<AddListenerFn>,
    pub dispatch_event: Slot<DispatchFn>,
    pub submit: Slot<SubmitFn>,
    pub request_submit: Option<Slot<RequestSubmitFn>>,
    pub click: Slot<ClickFn>,
    pub fetch: Option<Slot<FetchFn>>,
    pub send_beacon: Option<Slot<BeaconFn>>,
    pub transport_open: Slot<OpenFn>,
    pub transport_send: Slot<SendFn>,
}

impl Capabilities {
    /// True if any slot has been substituted.
    pub fn any_wrapped(&self) -> bool {
        self.add_event_listener.is_wrapped()
            || self.dispatch_event.is_wrapped()
            || self.submit.is_wrapped()
            || self.request_submit.as_ref().is_some_and(Slot::is_wrapped)
            || self.click.is_wrapped()
            || self.fetch.as_ref().is_some_and(Slot::is_wrapped)
            || self.send_beacon.as_ref().is_some_and(Slot::is_wrapped)
            || self.transport_open.is_wrapped()
            || self.transport_send.is_wrapped()
    }
}
