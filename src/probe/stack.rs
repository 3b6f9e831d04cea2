use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use crate::error::ProbeError;

/// Frames belonging to the capture machinery itself.
const SKIPPED_PREFIXES: &[&str] = &[
    "std::backtrace",
    "std::panic",
    "std::panicking",
    "core::ops::function",
    "__rust",
    "sbprobe::probe::stack",
    "sbprobe::probe::interpose::observe",
];

/// A bounded, labelled call-origin trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OriginTrace {
    label: String,
    frames: Vec<String>,
}

impl OriginTrace {
    pub fn empty(label: &str) -> Self {
        Self {
            label: label.to_string(),
            frames: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = format!("origin: {}", self.label);
        for frame in &self.frames {
            out.push_str("\n    at ");
            out.push_str(frame);
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StackCapture {
    max_frames: usize,
}

impl StackCapture {
    pub fn new(max_frames: usize) -> Self {
        Self { max_frames }
    }

    /// Never fails: any error or panic while walking the stack yields an empty trace.
    pub fn capture(&self, label: &str) -> OriginTrace {
        if self.max_frames == 0 {
            return OriginTrace::empty(label);
        }
        let max = self.max_frames;
        match panic::catch_unwind(AssertUnwindSafe(|| collect_frames(max))) {
            Ok(Ok(frames)) => OriginTrace {
                label: label.to_string(),
                frames,
            },
            Ok(Err(err)) => {
                tracing::trace!(%err, label, "origin trace unavailable");
                OriginTrace::empty(label)
            }
            Err(_) => OriginTrace::empty(label),
        }
    }
}

fn collect_frames(max: usize) -> Result<Vec<String>, ProbeError> {
    let backtrace = Backtrace::force_capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Err(ProbeError::Trace("backtraces unsupported on this platform".to_string()));
    }
    Ok(parse_frames(&backtrace.to_string(), max))
}

/// Parses std's rendering: `N: symbol` lines optionally followed by `at file:line`.
pub fn parse_frames(rendered: &str, max: usize) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    let mut keep_location = false;
    for line in rendered.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if keep_location {
                if let Some(last) = frames.last_mut() {
                    last.push_str(" (");
                    last.push_str(location);
                    last.push(')');
                }
                keep_location = false;
            }
            continue;
        }
        let Some((index, symbol)) = line.split_once(": ") else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        keep_location = false;
        if SKIPPED_PREFIXES.iter().any(|p| symbol.starts_with(p)) {
            continue;
        }
        if frames.len() == max {
            break;
        }
        frames.push(symbol.to_string());
        keep_location = true;
    }
    frames
}
