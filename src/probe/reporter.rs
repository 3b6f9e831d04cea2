use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use serde::Serialize;
use uuid::Uuid;

use super::counters::CounterSet;
use super::event::{InterceptionEvent, InterceptionKind};
use crate::error::ProbeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Info,
    Warn,
}

/// One self-contained unit handed to a sink.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub session: Uuid,
    pub level: ReportLevel,
    pub headline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<InterceptionEvent>,
    /// Set when the trace repeats the one reported under this earlier sequence number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_origin_as: Option<u64>,
}

impl Report {
    pub fn trace_text(&self) -> String {
        match (&self.event, self.same_origin_as) {
            (Some(_), Some(seq)) => format!("origin: same as #{seq}"),
            (Some(event), None) if !event.trace().is_empty() => event.trace().render(),
            (Some(event), None) => format!("origin: {} (no frames)", event.trace().label()),
            (None, _) => String::new(),
        }
    }
}

pub trait ReportSink {
    fn emit(&self, report: &Report) -> Result<(), ProbeError>;
}

impl<S: ReportSink + ?Sized> ReportSink for Rc<S> {
    fn emit(&self, report: &Report) -> Result<(), ProbeError> {
        (**self).emit(report)
    }
}

/// Emits each report as a single `tracing` event under the `sb_sandbox` target.
#[derive(Debug, Clone)]
pub struct TracingSink {
    prefix: String,
}

impl TracingSink {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl ReportSink for TracingSink {
    fn emit(&self, report: &Report) -> Result<(), ProbeError> {
        let prefix = &self.prefix;
        let headline = &report.headline;
        match (&report.event, report.level) {
            (Some(event), _) => {
                let subject = event.subject().map(ToString::to_string).unwrap_or_default();
                tracing::warn!(
                    target: "sb_sandbox",
                    session = %report.session,
                    kind = ?event.kind(),
                    seq = event.seq(),
                    at_ms = event.at().as_secs_f64() * 1000.0,
                    subject = %subject,
                    payload = ?event.payload(),
                    "{prefix} {headline}\n{}",
                    report.trace_text()
                );
            }
            (None, ReportLevel::Warn) => {
                tracing::warn!(target: "sb_sandbox", session = %report.session, "{prefix} {headline}");
            }
            (None, ReportLevel::Info) => {
                tracing::info!(target: "sb_sandbox", session = %report.session, "{prefix} {headline}");
            }
        }
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn emit(&self, report: &Report) -> Result<(), ProbeError> {
        let line = serde_json::to_string(report).map_err(|e| ProbeError::Sink(e.to_string()))?;
        let mut out = self.out.try_borrow_mut()?;
        writeln!(out, "{line}").map_err(|e| ProbeError::Sink(e.to_string()))
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: RefCell<Vec<Report>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }

    pub fn events_of(&self, kind: InterceptionKind) -> Vec<InterceptionEvent> {
        self.reports
            .borrow()
            .iter()
            .filter_map(|r| r.event.clone())
            .filter(|e| e.kind() == kind)
            .collect()
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, report: &Report) -> Result<(), ProbeError> {
        self.reports.try_borrow_mut()?.push(report.clone());
        Ok(())
    }
}

/// Read-only mirror for a visual badge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorState {
    pub counters: CounterSet,
    pub last_label: Option<String>,
}

/// Turns events into reports. Emitting is left to the caller so a sink never
/// runs while probe state is borrowed.
pub struct Reporter {
    session: Uuid,
    dedupe: bool,
    last_label: Option<String>,
    last_traces: HashMap<InterceptionKind, (u64, Vec<String>)>,
}

impl Reporter {
    pub fn new(dedupe: bool) -> Self {
        Self {
            session: Uuid::new_v4(),
            dedupe,
            last_label: None,
            last_traces: HashMap::new(),
        }
    }

    pub fn last_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    pub fn report(&mut self, event: InterceptionEvent) -> Report {
        let same_origin_as = self.dedupe_trace(&event);
        let headline = event.headline();
        self.last_label = Some(headline.clone());
        Report {
            session: self.session,
            level: ReportLevel::Warn,
            headline,
            event: Some(event),
            same_origin_as,
        }
    }

    /// Informational condition that is not an interception (watcher status).
    pub fn notice(&self, level: ReportLevel, message: String) -> Report {
        Report {
            session: self.session,
            level,
            headline: message,
            event: None,
            same_origin_as: None,
        }
    }

    fn dedupe_trace(&mut self, event: &InterceptionEvent) -> Option<u64> {
        if !self.dedupe || event.trace().is_empty() {
            return None;
        }
        let frames = event.trace().frames();
        let repeated = match self.last_traces.get(&event.kind()) {
            Some((seq, previous)) if previous.as_slice() == frames => Some(*seq),
            _ => None,
        };
        if repeated.is_none() {
            self.last_traces
                .insert(event.kind(), (event.seq(), frames.to_vec()));
        }
        repeated
    }
}
