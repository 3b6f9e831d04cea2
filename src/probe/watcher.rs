use std::rc::Rc;

use super::context::ProbeContext;
use super::event::{InterceptionKind, Payload, SubjectDescriptor};
use super::interpose::observe;
use super::reporter::ReportLevel;
use crate::host::{Element, Event, Listener, ListenerOptions, Page, ReadyState, Target};

/// Top-level submission watcher: one capture-phase submit listener on the
/// target form, registered through the native capability so it never shows
/// up in the listener ledger it reports on.
pub struct SubmitWatcher;

impl SubmitWatcher {
    /// Attaches immediately if the document is parsed, otherwise on `DOMContentLoaded`.
    pub fn arm(page: &Page, ctx: &Rc<ProbeContext>) {
        if page.document().ready_state() != ReadyState::Loading {
            Self::attach(page, ctx);
            return;
        }

        let weak_page = page.downgrade();
        let ctx = Rc::clone(ctx);
        let on_ready: Listener = Rc::new(move |_event: &Event| {
            if let Some(page) = weak_page.upgrade() {
                SubmitWatcher::attach(&page, &ctx);
            }
        });
        let add = page.capabilities().add_event_listener.original();
        let options = ListenerOptions {
            once: true,
            ..ListenerOptions::default()
        };
        if let Err(err) = add(&Target::Document, "DOMContentLoaded", on_ready, options) {
            tracing::debug!(target: "sb_sandbox", %err, "could not defer submit watcher");
        }
    }

    /// Locates the form (marker first, then the first `<form>`) and hooks it.
    pub fn attach(page: &Page, ctx: &Rc<ProbeContext>) -> Option<Rc<Element>> {
        let document = page.document();
        let marker = &ctx.config().form_marker;
        let form = document
            .first_form_with(&marker.attribute, &marker.value)
            .or_else(|| document.first_by_tag("form"));

        let Some(form) = form else {
            observe("submit watcher", || {
                ctx.notice(ReportLevel::Info, "no form found, submit watcher not attached".to_string())
            });
            return None;
        };

        let weak_form = Rc::downgrade(&form);
        let listener_ctx = Rc::clone(ctx);
        let on_submit: Listener = Rc::new(move |event: &Event| {
            observe("submit watcher", || {
                let Some(form) = weak_form.upgrade() else {
                    return Ok(());
                };
                let summary = listener_ctx.summarize(&form)?;
                let role = &listener_ctx.config().role_attribute;
                listener_ctx.record(
                    InterceptionKind::GateSubmitEventSeen,
                    Some(listener_ctx.describe(&form)),
                    Payload::GateSubmit {
                        default_prevented: event.default_prevented(),
                        submitter: SubjectDescriptor::of_optional(event.submitter(), role),
                        listener_count_tracked: summary.count,
                        by_phase: summary.by_phase,
                    },
                )
            });
        });

        let add = page.capabilities().add_event_listener.original();
        let event_type = ctx.config().submit_event_type.clone();
        if let Err(err) = add(&Target::Element(Rc::clone(&form)), &event_type, on_submit, ListenerOptions::from(true)) {
            tracing::debug!(target: "sb_sandbox", %err, "could not attach submit watcher");
            return None;
        }

        let descriptor = ctx.describe(&form);
        observe("submit watcher", || {
            ctx.notice(ReportLevel::Info, format!("watcher active, form found: {descriptor}"))
        });
        Some(form)
    }
}
