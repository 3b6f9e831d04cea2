//! The interception and observation engine.
//!
//! # TRANSPARENCY INVARIANT
//! An installed probe must never change what host code observes: same
//! arguments forwarded, same result or error returned. Observation failures
//! are absorbed inside the interposers and never reach the page.
//!
//! # PRIVACY INVARIANT
//! Network observations record method, URL and whether a body was present.
//! Body content is used for classification only and is never reported.

pub mod classifier;
pub mod context;
pub mod counters;
pub mod event;
pub mod interpose;
pub mod registry;
pub mod reporter;
pub mod stack;
pub mod watcher;

use std::rc::Rc;

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::gate::ActivationGate;
use crate::host::{Element, Page};

pub use classifier::{is_submit_control, LeadTrafficClassifier};
pub use context::ProbeContext;
pub use counters::CounterSet;
pub use event::{InterceptionEvent, InterceptionKind, Payload, SubjectDescriptor};
pub use interpose::InstallReport;
pub use registry::{ListenerRegistry, ListenerSummary, PhaseCounts};
pub use reporter::{IndicatorState, JsonLinesSink, MemorySink, Report, ReportLevel, ReportSink, TracingSink};
pub use stack::{OriginTrace, StackCapture};
pub use watcher::SubmitWatcher;

/// Handle on an active probe.
pub struct Probe {
    ctx: Rc<ProbeContext>,
    installed: InstallReport,
}

impl Probe {
    pub fn context(&self) -> &Rc<ProbeContext> {
        &self.ctx
    }

    pub fn installed(&self) -> &InstallReport {
        &self.installed
    }

    pub fn counters(&self) -> CounterSet {
        self.ctx.counters()
    }

    pub fn indicator(&self) -> IndicatorState {
        self.ctx.indicator()
    }

    pub fn summarize(&self, subject: &Element) -> Result<ListenerSummary, ProbeError> {
        self.ctx.summarize(subject)
    }
}

/// Evaluates the gate once. When it is closed nothing is allocated and no
/// capability is touched; otherwise every present capability is wrapped and
/// the submit watcher is armed. A page that already carries a probe gets
/// `None` as well, so activating twice never doubles the watcher.
pub fn activate(
    page: &Page,
    config: ProbeConfig,
    gate: &dyn ActivationGate,
    sink: impl ReportSink + 'static,
) -> Option<Probe> {
    if !gate.is_active(page.location()) {
        return None;
    }
    if page.capabilities().any_wrapped() {
        tracing::debug!(target: "sb_sandbox", "probe already active on this page");
        return None;
    }

    let ctx = Rc::new(ProbeContext::new(config, Box::new(sink)));
    let installed = interpose::install(&mut page.capabilities_mut(), &ctx);
    SubmitWatcher::arm(page, &ctx);
    tracing::info!(
        target: "sb_sandbox",
        location = page.location().href(),
        wrapped = installed.wrapped.len(),
        "probe activated"
    );
    Some(Probe { ctx, installed })
}
