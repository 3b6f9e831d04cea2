use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::capabilities::{
    AddListenerFn, BeaconFn, Capabilities, ClickFn, DispatchFn, FetchFn, OpenFn, RequestSubmitFn,
    SendFn, Slot, SubmitFn,
};
use super::dom::{Document, Element, ElementId, ReadyState};
use super::event::{Event, Listener, ListenerOptions, Target, TargetKey};
use super::net::{Body, FetchInput, FetchResponse, NetworkRecord, RequestInit, Transport, TransportId, TransportKind};
use super::HostError;

const BEACON_QUOTA_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    href: String,
}

impl Location {
    pub fn new(href: &str) -> Self {
        Self {
            href: href.to_string(),
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Path component without query or fragment.
    pub fn pathname(&self) -> &str {
        let rest = match self.href.find("://") {
            Some(idx) => {
                let after_scheme = &self.href[idx + 3..];
                match after_scheme.find('/') {
                    Some(slash) => &after_scheme[slash..],
                    None => return "/",
                }
            }
            None => self.href.as_str(),
        };
        let end = rest.find(|c| c == '?' || c == '#').unwrap_or(rest.len());
        &rest[..end]
    }
}

/// A form submission that reached the navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub form: ElementId,
    pub action: Option<String>,
    pub method: String,
    pub submitter: Option<ElementId>,
}

/// Which optional capabilities the host provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFeatures {
    pub request_submit: bool,
    pub fetch: bool,
    pub send_beacon: bool,
}

impl Default for HostFeatures {
    fn default() -> Self {
        Self {
            request_submit: true,
            fetch: true,
            send_beacon: true,
        }
    }
}

struct Registered {
    id: u64,
    event_type: String,
    listener: Listener,
    options: ListenerOptions,
}

struct HostState {
    document: Document,
    listeners: RefCell<HashMap<TargetKey, Vec<Registered>>>,
    next_listener: Cell<u64>,
    next_transport: Cell<u64>,
    next_request: Cell<u64>,
    navigations: RefCell<Vec<Navigation>>,
    network: RefCell<Vec<NetworkRecord>>,
}

impl HostState {
    fn add_listener(&self, target: &Target, event_type: &str, listener: Listener, options: ListenerOptions) {
        let mut table = self.listeners.borrow_mut();
        let entries = table.entry(target.key()).or_default();
        let duplicate = entries.iter().any(|r| {
            r.event_type == event_type
                && r.options.capture == options.capture
                && Rc::ptr_eq(&r.listener, &listener)
        });
        if duplicate {
            return;
        }
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        entries.push(Registered {
            id,
            event_type: event_type.to_string(),
            listener,
            options,
        });
    }

    /// Capture from the window down, capture then bubble listeners at the
    /// target, then bubble back up.
    fn dispatch(&self, target: &Target, event: &Event) -> bool {
        let mut path = vec![TargetKey::Window];
        match target {
            Target::Window => {}
            Target::Document => path.push(TargetKey::Document),
            Target::Element(el) => {
                path.push(TargetKey::Document);
                path.extend(el.ancestors().iter().map(|a| TargetKey::Element(a.id())));
                path.push(TargetKey::Element(el.id()));
            }
        }
        let (at_target, outer) = match path.split_last() {
            Some((last, rest)) => (*last, rest.to_vec()),
            None => return true,
        };

        for key in &outer {
            self.invoke(*key, event, |r| r.options.capture);
        }
        self.invoke(at_target, event, |r| r.options.capture);
        self.invoke(at_target, event, |r| !r.options.capture);
        if event.bubbles() {
            for key in outer.iter().rev() {
                self.invoke(*key, event, |r| !r.options.capture);
            }
        }
        !event.default_prevented()
    }

    fn invoke(&self, key: TargetKey, event: &Event, phase: impl Fn(&Registered) -> bool) {
        let snapshot: Vec<(u64, Listener, ListenerOptions)> = match self.listeners.borrow().get(&key) {
            Some(entries) => entries
                .iter()
                .filter(|r| r.event_type == event.event_type() && phase(r))
                .map(|r| (r.id, Rc::clone(&r.listener), r.options))
                .collect(),
            None => return,
        };

        for (id, listener, options) in snapshot {
            {
                let mut table = self.listeners.borrow_mut();
                let Some(entries) = table.get_mut(&key) else { return };
                // A listener removed by an earlier one in the same pass does not run.
                if !entries.iter().any(|r| r.id == id) {
                    continue;
                }
                if options.once {
                    entries.retain(|r| r.id != id);
                }
            }
            event.set_passive(options.passive);
            listener(event);
            event.set_passive(false);
        }
    }

    fn navigate(&self, form: &Element, submitter: Option<&Rc<Element>>) {
        let method = submitter
            .and_then(|s| s.attribute("formmethod"))
            .or_else(|| form.attribute("method"))
            .unwrap_or_else(|| "get".to_string());
        let action = submitter
            .and_then(|s| s.attribute("formaction"))
            .or_else(|| form.attribute("action"));
        self.navigations.borrow_mut().push(Navigation {
            form: form.id(),
            action,
            method: method.to_ascii_lowercase(),
            submitter: submitter.map(|s| s.id()),
        });
    }

    fn run_submission(&self, form: &Rc<Element>, submitter: Option<&Rc<Element>>) {
        let event = Event::submit(submitter.cloned());
        if self.dispatch(&Target::Element(Rc::clone(form)), &event) {
            self.navigate(form, submitter);
        }
    }

    fn record(&self, record: NetworkRecord) -> u64 {
        self.network.borrow_mut().push(record);
        let id = self.next_request.get();
        self.next_request.set(id + 1);
        id
    }
}

fn native_capabilities(host: &Rc<HostState>, features: HostFeatures) -> Capabilities {
    let add_event_listener: AddListenerFn = {
        let host = Rc::clone(host);
        Rc::new(
            move |target: &Target, event_type: &str, listener: Listener, options: ListenerOptions| -> Result<(), HostError> {
                host.add_listener(target, event_type, listener, options);
                Ok(())
            },
        )
    };

    let dispatch_event: DispatchFn = {
        let host = Rc::clone(host);
        Rc::new(move |target: &Target, event: &Event| -> Result<bool, HostError> {
            if event.event_type().is_empty() {
                return Err(HostError::invalid_state("the event is not initialized"));
            }
            Ok(host.dispatch(target, event))
        })
    };

    let submit: SubmitFn = {
        let host = Rc::clone(host);
        Rc::new(move |form: &Rc<Element>| -> Result<(), HostError> {
            if !form.is_form() {
                return Err(HostError::type_error("Illegal invocation"));
            }
            host.navigate(form, None);
            Ok(())
        })
    };

    let request_submit: RequestSubmitFn = {
        let host = Rc::clone(host);
        Rc::new(
            move |form: &Rc<Element>, submitter: Option<&Rc<Element>>| -> Result<(), HostError> {
                if !form.is_form() {
                    return Err(HostError::type_error("Illegal invocation"));
                }
                if let Some(submitter) = submitter {
                    if !submitter.activates_submission() {
                        return Err(HostError::type_error("The specified element is not a submit button."));
                    }
                    let owner = submitter.closest_form();
                    if owner.map(|f| f.id()) != Some(form.id()) {
                        return Err(HostError::not_found("The specified element is not owned by this form element."));
                    }
                }
                host.run_submission(form, submitter);
                Ok(())
            },
        )
    };

    let click: ClickFn = {
        let host = Rc::clone(host);
        Rc::new(move |el: &Rc<Element>| -> Result<(), HostError> {
            let event = Event::new("click", true, true);
            let proceed = host.dispatch(&Target::Element(Rc::clone(el)), &event);
            if proceed && el.activates_submission() {
                if let Some(form) = el.closest_form() {
                    host.run_submission(&form, Some(el));
                }
            }
            Ok(())
        })
    };

    let fetch: FetchFn = {
        let host = Rc::clone(host);
        Rc::new(
            move |input: &FetchInput, init: Option<&RequestInit>| -> Result<FetchResponse, HostError> {
                if input.url().is_empty() {
                    return Err(HostError::type_error("Failed to parse URL from ''"));
                }
                let method = init
                    .and_then(|i| i.method.clone())
                    .or_else(|| input.method().map(str::to_string))
                    .unwrap_or_else(|| "GET".to_string());
                let request_id = host.record(NetworkRecord {
                    transport: TransportKind::Fetch,
                    method: Some(method),
                    url: input.url().to_string(),
                    body: init.and_then(|i| i.body.clone()),
                });
                Ok(FetchResponse { request_id })
            },
        )
    };

    let send_beacon: BeaconFn = {
        let host = Rc::clone(host);
        Rc::new(move |url: &str, data: Option<&Body>| -> Result<bool, HostError> {
            if url.is_empty() {
                return Err(HostError::type_error("Failed to parse URL from ''"));
            }
            if data.is_some_and(|d| d.len() > BEACON_QUOTA_BYTES) {
                return Ok(false);
            }
            host.record(NetworkRecord {
                transport: TransportKind::Beacon,
                method: None,
                url: url.to_string(),
                body: data.cloned(),
            });
            Ok(true)
        })
    };

    let transport_open: OpenFn = Rc::new(
        |transport: &Rc<Transport>, method: &str, url: &str| -> Result<(), HostError> {
            transport.open(method, url)
        },
    );

    let transport_send: SendFn = {
        let host = Rc::clone(host);
        Rc::new(move |transport: &Rc<Transport>, body: Option<&Body>| -> Result<(), HostError> {
            let (method, url) = transport.begin_send()?;
            host.record(NetworkRecord {
                transport: TransportKind::Xhr,
                method: Some(method),
                url,
                body: body.cloned(),
            });
            Ok(())
        })
    };

    Capabilities {
        add_event_listener: Slot::new(add_event_listener),
        dispatch_event: Slot::new(dispatch_event),
        submit: Slot::new(submit),
        request_submit: features.request_submit.then(|| Slot::new(request_submit)),
        click: Slot::new(click),
        fetch: features.fetch.then(|| Slot::new(fetch)),
        send_beacon: features.send_beacon.then(|| Slot::new(send_beacon)),
        transport_open: Slot::new(transport_open),
        transport_send: Slot::new(transport_send),
    }
}

/// A single page lifetime: document, listener tables, capability table and
/// the side effects (navigations, network calls) the host performed.
#[derive(Clone)]
pub struct Page {
    location: Rc<Location>,
    host: Rc<HostState>,
    caps: Rc<RefCell<Capabilities>>,
}

/// Non-owning page handle for callbacks stored inside the page itself.
#[derive(Clone)]
pub struct WeakPage {
    location: Weak<Location>,
    host: Weak<HostState>,
    caps: Weak<RefCell<Capabilities>>,
}

impl WeakPage {
    pub fn upgrade(&self) -> Option<Page> {
        Some(Page {
            location: self.location.upgrade()?,
            host: self.host.upgrade()?,
            caps: self.caps.upgrade()?,
        })
    }
}

impl Page {
    /// A fully loaded page with every optional capability present.
    pub fn new(href: &str) -> Self {
        Self::with_features(href, ReadyState::Complete, HostFeatures::default())
    }

    /// A page whose document is still parsing; see [`Page::finish_loading`].
    pub fn loading(href: &str) -> Self {
        Self::with_features(href, ReadyState::Loading, HostFeatures::default())
    }

    pub fn with_features(href: &str, ready_state: ReadyState, features: HostFeatures) -> Self {
        let host = Rc::new(HostState {
            document: Document::new(ready_state),
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
            next_transport: Cell::new(0),
            next_request: Cell::new(0),
            navigations: RefCell::new(Vec::new()),
            network: RefCell::new(Vec::new()),
        });
        let caps = native_capabilities(&host, features);
        Self {
            location: Rc::new(Location::new(href)),
            host,
            caps: Rc::new(RefCell::new(caps)),
        }
    }

    pub fn downgrade(&self) -> WeakPage {
        WeakPage {
            location: Rc::downgrade(&self.location),
            host: Rc::downgrade(&self.host),
            caps: Rc::downgrade(&self.caps),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn document(&self) -> &Document {
        &self.host.document
    }

    /// Creates `<tag>` with the given attributes and appends it to `parent`.
    pub fn append(&self, parent: &Rc<Element>, tag: &str, attrs: &[(&str, &str)]) -> Rc<Element> {
        let el = self.host.document.create_element(tag);
        for (name, value) in attrs {
            el.set_attribute(name, value);
        }
        parent.append_child(Rc::clone(&el));
        el
    }

    pub fn capabilities(&self) -> Ref<'_, Capabilities> {
        self.caps.borrow()
    }

    pub fn capabilities_mut(&self) -> RefMut<'_, Capabilities> {
        self.caps.borrow_mut()
    }

    pub fn navigations(&self) -> Vec<Navigation> {
        self.host.navigations.borrow().clone()
    }

    pub fn network_log(&self) -> Vec<NetworkRecord> {
        self.host.network.borrow().clone()
    }

    /// Leaves the loading state and fires `DOMContentLoaded` on the document.
    pub fn finish_loading(&self) {
        if self.host.document.ready_state() != ReadyState::Loading {
            return;
        }
        self.host.document.set_ready_state(ReadyState::Interactive);
        self.host
            .dispatch(&Target::Document, &Event::new("DOMContentLoaded", true, false));
        self.host.document.set_ready_state(ReadyState::Complete);
    }

    // Host-facing entry points. Each one resolves the current slot first and
    // releases the table borrow before calling, so listeners may re-enter.

    pub fn add_event_listener(
        &self,
        target: &Target,
        event_type: &str,
        listener: Listener,
        options: impl Into<ListenerOptions>,
    ) -> Result<(), HostError> {
        let f = self.caps.borrow().add_event_listener.current();
        f(target, event_type, listener, options.into())
    }

    pub fn dispatch_event(&self, target: &Target, event: &Event) -> Result<bool, HostError> {
        let f = self.caps.borrow().dispatch_event.current();
        f(target, event)
    }

    pub fn submit(&self, form: &Rc<Element>) -> Result<(), HostError> {
        let f = self.caps.borrow().submit.current();
        f(form)
    }

    pub fn request_submit(&self, form: &Rc<Element>, submitter: Option<&Rc<Element>>) -> Result<(), HostError> {
        let f = self
            .caps
            .borrow()
            .request_submit
            .as_ref()
            .map(Slot::current)
            .ok_or_else(|| HostError::type_error("form.requestSubmit is not a function"))?;
        f(form, submitter)
    }

    pub fn click(&self, el: &Rc<Element>) -> Result<(), HostError> {
        let f = self.caps.borrow().click.current();
        f(el)
    }

    pub fn fetch(&self, input: &FetchInput, init: Option<&RequestInit>) -> Result<FetchResponse, HostError> {
        let f = self
            .caps
            .borrow()
            .fetch
            .as_ref()
            .map(Slot::current)
            .ok_or_else(|| HostError::type_error("fetch is not a function"))?;
        f(input, init)
    }

    pub fn send_beacon(&self, url: &str, data: Option<&Body>) -> Result<bool, HostError> {
        let f = self
            .caps
            .borrow()
            .send_beacon
            .as_ref()
            .map(Slot::current)
            .ok_or_else(|| HostError::type_error("navigator.sendBeacon is not a function"))?;
        f(url, data)
    }

    pub fn new_transport(&self) -> Rc<Transport> {
        let id = self.host.next_transport.get();
        self.host.next_transport.set(id + 1);
        Rc::new(Transport::new(TransportId(id)))
    }

    pub fn transport_open(&self, transport: &Rc<Transport>, method: &str, url: &str) -> Result<(), HostError> {
        let f = self.caps.borrow().transport_open.current();
        f(transport, method, url)
    }

    pub fn transport_send(&self, transport: &Rc<Transport>, body: Option<&Body>) -> Result<(), HostError> {
        let f = self.caps.borrow().transport_send.current();
        f(transport, body)
    }
}
