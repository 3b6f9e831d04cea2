use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Instant;

use super::classifier::LeadTrafficClassifier;
use super::counters::CounterSet;
use super::event::{InterceptionEvent, InterceptionKind, Payload, SubjectDescriptor};
use super::registry::{HandlerRef, ListenerRegistration, ListenerRegistry, ListenerSummary};
use super::reporter::{IndicatorState, ReportLevel, ReportSink, Reporter};
use super::stack::StackCapture;
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::host::{Element, Listener, ListenerOptions, Transport, TransportId};

/// Method and target seen at `open`, waiting for the matching `send`.
#[derive(Debug, Clone)]
pub struct PendingOpen {
    transport: Weak<Transport>,
    pub method: String,
    pub url: String,
}

struct ProbeState {
    counters: CounterSet,
    registry: ListenerRegistry,
    reporter: Reporter,
    pending_opens: HashMap<TransportId, PendingOpen>,
}

/// All mutable observation state of one activation.
///
/// Owned by the installed interposers through `Rc`; nothing reads it from
/// globals, so a test can build a fresh context per case. Every borrow is
/// taken with `try_borrow_mut` and released before the sink or the wrapped
/// capability runs.
pub struct ProbeContext {
    config: ProbeConfig,
    started: Instant,
    stack: StackCapture,
    classifier: LeadTrafficClassifier,
    sink: Box<dyn ReportSink>,
    state: RefCell<ProbeState>,
}

impl ProbeContext {
    pub fn new(config: ProbeConfig, sink: Box<dyn ReportSink>) -> Self {
        let reporter = Reporter::new(config.dedupe_traces);
        Self {
            stack: StackCapture::new(config.max_stack_frames),
            classifier: LeadTrafficClassifier::from_config(&config),
            started: Instant::now(),
            sink,
            state: RefCell::new(ProbeState {
                counters: CounterSet::default(),
                registry: ListenerRegistry::new(),
                reporter,
                pending_opens: HashMap::new(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn classifier(&self) -> &LeadTrafficClassifier {
        &self.classifier
    }

    pub fn describe(&self, el: &Element) -> SubjectDescriptor {
        SubjectDescriptor::of(el, &self.config.role_attribute)
    }

    /// Bumps the kind's counter, then builds and emits one event.
    pub fn record(
        &self,
        kind: InterceptionKind,
        subject: Option<SubjectDescriptor>,
        payload: Payload,
    ) -> Result<(), ProbeError> {
        let trace = self.stack.capture(kind.trace_label());
        let report = {
            let mut state = self.state.try_borrow_mut()?;
            let seq = state.counters.bump(kind);
            let event = InterceptionEvent::new(kind, seq, self.started.elapsed(), subject, payload, trace);
            state.reporter.report(event)
        };
        self.sink.emit(&report)
    }

    /// Counts a submission-listener registration and files it under its form, if any.
    pub fn record_listener(
        &self,
        subject: Option<&Rc<Element>>,
        listener: &Listener,
        options: ListenerOptions,
    ) -> Result<(), ProbeError> {
        let trace = self.stack.capture(InterceptionKind::ListenerAdded.trace_label());
        let descriptor = subject.map(|s| self.describe(s));
        let mut guard = self.state.try_borrow_mut()?;
        let state = &mut *guard;
        if let Some(form) = subject {
            let registration = ListenerRegistration::new(form, options, trace.clone(), HandlerRef::of(listener));
            state.registry.record(Some(form), registration);
        }
        let seq = state.counters.bump(InterceptionKind::ListenerAdded);
        let payload = Payload::Listener {
            capture: options.capture,
            once: options.once,
            passive: options.passive,
            attributed: subject.is_some(),
        };
        let event = InterceptionEvent::new(
            InterceptionKind::ListenerAdded,
            seq,
            self.started.elapsed(),
            descriptor,
            payload,
            trace,
        );
        let report = state.reporter.report(event);
        drop(guard);
        self.sink.emit(&report)
    }

    pub fn notice(&self, level: ReportLevel, message: String) -> Result<(), ProbeError> {
        let report = self.state.try_borrow()?.reporter.notice(level, message);
        self.sink.emit(&report)
    }

    pub fn summarize(&self, subject: &Element) -> Result<ListenerSummary, ProbeError> {
        Ok(self.state.try_borrow()?.registry.summarize(subject))
    }

    pub fn counters(&self) -> CounterSet {
        self.state
            .try_borrow()
            .map(|s| s.counters)
            .unwrap_or_default()
    }

    pub fn indicator(&self) -> IndicatorState {
        match self.state.try_borrow() {
            Ok(state) => IndicatorState {
                counters: state.counters,
                last_label: state.reporter.last_label().map(str::to_string),
            },
            Err(_) => IndicatorState::default(),
        }
    }

    /// Remembers `open` arguments for the transport's next `send`.
    pub fn note_open(&self, transport: &Rc<Transport>, method: &str, url: &str) -> Result<(), ProbeError> {
        let mut state = self.state.try_borrow_mut()?;
        state.pending_opens.retain(|_, p| p.transport.strong_count() > 0);
        state.pending_opens.insert(
            transport.id(),
            PendingOpen {
                transport: Rc::downgrade(transport),
                method: method.to_string(),
                url: url.to_string(),
            },
        );
        Ok(())
    }

    pub fn forget_open(&self, transport: &Transport) -> Result<(), ProbeError> {
        self.state.try_borrow_mut()?.pending_opens.remove(&transport.id());
        Ok(())
    }

    /// Takes the correlated `open`, clearing it.
    pub fn take_open(&self, transport: &Transport) -> Result<Option<PendingOpen>, ProbeError> {
        Ok(self.state.try_borrow_mut()?.pending_opens.remove(&transport.id()))
    }

    pub fn pending_transports(&self) -> usize {
        self.state
            .try_borrow()
            .map(|s| s.pending_opens.len())
            .unwrap_or_default()
    }
}
