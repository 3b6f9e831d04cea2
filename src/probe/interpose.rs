//! The interposer set.
//!
//! Every wrapper follows the same shape: run the observation step inside
//! [`observe`], which absorbs any error or panic, then forward the original
//! arguments to the wrapped callable and hand back its result untouched,
//! including its `Err`. Nothing here may fail the host's call.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::classifier::is_submit_control;
use super::context::ProbeContext;
use super::event::{InterceptionKind, Payload, SubjectDescriptor};
use crate::error::ProbeError;
use crate::host::capabilities::{
    AddListenerFn, BeaconFn, ClickFn, DispatchFn, FetchFn, OpenFn, RequestSubmitFn, SendFn, SubmitFn,
};
use crate::host::{
    Body, Capabilities, Element, Event, FetchInput, FetchResponse, HostError, Listener, ListenerOptions,
    RequestInit, Target, Transport, TransportKind,
};

/// Runs an observation step, swallowing whatever goes wrong in it.
pub(crate) fn observe(what: &'static str, step: impl FnOnce() -> Result<(), ProbeError>) {
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!(target: "sb_sandbox", what, %err, "observation absorbed"),
        Err(_) => tracing::debug!(target: "sb_sandbox", what, "observation panicked; absorbed"),
    }
}

/// Which capabilities an `install` call actually substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub wrapped: Vec<&'static str>,
    pub already_wrapped: Vec<&'static str>,
    pub missing: Vec<&'static str>,
}

impl InstallReport {
    fn note(&mut self, name: &'static str, wrapped: Option<bool>) {
        match wrapped {
            Some(true) => self.wrapped.push(name),
            Some(false) => self.already_wrapped.push(name),
            None => self.missing.push(name),
        }
    }
}

/// Wraps every capability present in `caps`. Slots that are already wrapped
/// are left alone, so calling this twice never double-counts.
pub fn install(caps: &mut Capabilities, ctx: &Rc<ProbeContext>) -> InstallReport {
    let mut report = InstallReport::default();

    let c = Rc::clone(ctx);
    report.note(
        "addEventListener",
        Some(caps.add_event_listener.wrap(|orig| wrap_add_event_listener(orig, c))),
    );
    let c = Rc::clone(ctx);
    report.note(
        "dispatchEvent",
        Some(caps.dispatch_event.wrap(|orig| wrap_dispatch_event(orig, c))),
    );
    let c = Rc::clone(ctx);
    report.note("submit", Some(caps.submit.wrap(|orig| wrap_submit(orig, c))));
    let c = Rc::clone(ctx);
    report.note(
        "requestSubmit",
        caps.request_submit
            .as_mut()
            .map(|slot| slot.wrap(|orig| wrap_request_submit(orig, c))),
    );
    let c = Rc::clone(ctx);
    report.note("click", Some(caps.click.wrap(|orig| wrap_click(orig, c))));
    let c = Rc::clone(ctx);
    report.note(
        "fetch",
        caps.fetch.as_mut().map(|slot| slot.wrap(|orig| wrap_fetch(orig, c))),
    );
    let c = Rc::clone(ctx);
    report.note(
        "sendBeacon",
        caps.send_beacon
            .as_mut()
            .map(|slot| slot.wrap(|orig| wrap_send_beacon(orig, c))),
    );
    let c = Rc::clone(ctx);
    report.note(
        "transport.open",
        Some(caps.transport_open.wrap(|orig| wrap_transport_open(orig, c))),
    );
    let c = Rc::clone(ctx);
    report.note(
        "transport.send",
        Some(caps.transport_send.wrap(|orig| wrap_transport_send(orig, c))),
    );

    tracing::debug!(
        target: "sb_sandbox",
        wrapped = ?report.wrapped,
        already_wrapped = ?report.already_wrapped,
        missing = ?report.missing,
        "interposers installed"
    );
    report
}

pub fn wrap_add_event_listener(orig: AddListenerFn, ctx: Rc<ProbeContext>) -> AddListenerFn {
    Rc::new(
        move |target: &Target, event_type: &str, listener: Listener, options: ListenerOptions| -> Result<(), HostError> {
            observe("addEventListener", || {
                if event_type != ctx.config().submit_event_type {
                    return Ok(());
                }
                let form = target.as_element().filter(|el| el.is_form());
                ctx.record_listener(form, &listener, options)
            });
            orig(target, event_type, listener, options)
        },
    )
}

pub fn wrap_dispatch_event(orig: DispatchFn, ctx: Rc<ProbeContext>) -> DispatchFn {
    Rc::new(move |target: &Target, event: &Event| -> Result<bool, HostError> {
        observe("dispatchEvent", || {
            if event.event_type() != ctx.config().submit_event_type {
                return Ok(());
            }
            let subject = SubjectDescriptor::of_target(target, &ctx.config().role_attribute);
            ctx.record(
                InterceptionKind::EventDispatched,
                Some(subject),
                Payload::Dispatch {
                    cancelable: event.cancelable(),
                },
            )
        });
        orig(target, event)
    })
}

pub fn wrap_submit(orig: SubmitFn, ctx: Rc<ProbeContext>) -> SubmitFn {
    Rc::new(move |form: &Rc<Element>| -> Result<(), HostError> {
        observe("form.submit", || {
            ctx.record(
                InterceptionKind::NativeSubmitInvoked,
                Some(ctx.describe(form)),
                Payload::Submit,
            )
        });
        orig(form)
    })
}

pub fn wrap_request_submit(orig: RequestSubmitFn, ctx: Rc<ProbeContext>) -> RequestSubmitFn {
    Rc::new(
        move |form: &Rc<Element>, submitter: Option<&Rc<Element>>| -> Result<(), HostError> {
            observe("form.requestSubmit", || {
                let submitter = SubjectDescriptor::of_optional(submitter, &ctx.config().role_attribute);
                ctx.record(
                    InterceptionKind::RequestSubmitInvoked,
                    Some(ctx.describe(form)),
                    Payload::RequestSubmit { submitter },
                )
            });
            orig(form, submitter)
        },
    )
}

pub fn wrap_click(orig: ClickFn, ctx: Rc<ProbeContext>) -> ClickFn {
    Rc::new(move |el: &Rc<Element>| -> Result<(), HostError> {
        observe("click", || {
            if !is_submit_control(el) {
                return Ok(());
            }
            ctx.record(
                InterceptionKind::SubmitterClicked,
                Some(ctx.describe(el)),
                Payload::Click,
            )
        });
        orig(el)
    })
}

pub fn wrap_fetch(orig: FetchFn, ctx: Rc<ProbeContext>) -> FetchFn {
    Rc::new(
        move |input: &FetchInput, init: Option<&RequestInit>| -> Result<FetchResponse, HostError> {
            observe("fetch", || {
                let body = init.and_then(|i| i.body.as_ref());
                let method = init
                    .and_then(|i| i.method.clone())
                    .or_else(|| input.method().map(str::to_string))
                    .unwrap_or_else(|| "GET".to_string());
                observe_network(&ctx, TransportKind::Fetch, Some(method), input.url(), body)
            });
            orig(input, init)
        },
    )
}

pub fn wrap_send_beacon(orig: BeaconFn, ctx: Rc<ProbeContext>) -> BeaconFn {
    Rc::new(move |url: &str, data: Option<&Body>| -> Result<bool, HostError> {
        observe("sendBeacon", || {
            observe_network(&ctx, TransportKind::Beacon, None, url, data)
        });
        orig(url, data)
    })
}

/// `open` only remembers method and target; classification waits for `send`.
pub fn wrap_transport_open(orig: OpenFn, ctx: Rc<ProbeContext>) -> OpenFn {
    Rc::new(
        move |transport: &Rc<Transport>, method: &str, url: &str| -> Result<(), HostError> {
            observe("transport.open", || ctx.note_open(transport, method, url));
            let result = orig(transport, method, url);
            if result.is_err() {
                observe("transport.open", || ctx.forget_open(transport));
            }
            result
        },
    )
}

pub fn wrap_transport_send(orig: SendFn, ctx: Rc<ProbeContext>) -> SendFn {
    Rc::new(move |transport: &Rc<Transport>, body: Option<&Body>| -> Result<(), HostError> {
        observe("transport.send", || {
            let (method, url) = match ctx.take_open(transport)? {
                Some(open) => (Some(open.method), open.url),
                None => (None, String::new()),
            };
            observe_network(&ctx, TransportKind::Xhr, method, &url, body)
        });
        orig(transport, body)
    })
}

fn observe_network(
    ctx: &ProbeContext,
    transport: TransportKind,
    method: Option<String>,
    url: &str,
    body: Option<&Body>,
) -> Result<(), ProbeError> {
    let body_text = body.map(Body::to_text).unwrap_or_default();
    if !ctx.classifier().is_lead_relevant(url, &body_text) {
        return Ok(());
    }
    ctx.record(
        InterceptionKind::NetworkCallObserved,
        None,
        Payload::Network {
            transport,
            method,
            url: url.to_string(),
            has_body: body.is_some_and(|b| !b.is_empty()),
        },
    )
}
