use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::{Rc, Weak};

use sbprobe::gate::AlwaysOn;
use sbprobe::host::{Element, Page};
use sbprobe::probe::{InterceptionKind, JsonLinesSink, MemorySink, ProbeContext, Report, ReportLevel, ReportSink};
use sbprobe::{activate, ProbeConfig, ProbeError};

const HREF: &str = "https://example.com/schnellbewerbung/sb-sandbox";

fn page_with_form() -> (Page, Rc<Element>) {
    let page = Page::new(HREF);
    let form = page.append(&page.document().body(), "form", &[("id", "apply")]);
    (page, form)
}

/// Reads the probe's read-only surface from inside `emit`, like a badge would.
#[derive(Default)]
struct BadgeSink {
    ctx: RefCell<Weak<ProbeContext>>,
    seen: RefCell<Vec<(u64, Option<String>)>>,
}

impl ReportSink for BadgeSink {
    fn emit(&self, report: &Report) -> Result<(), ProbeError> {
        if report.event.is_none() {
            return Ok(());
        }
        if let Some(ctx) = self.ctx.borrow().upgrade() {
            let indicator = ctx.indicator();
            self.seen.borrow_mut().push((
                indicator.counters.get(InterceptionKind::NativeSubmitInvoked),
                indicator.last_label,
            ));
        }
        Ok(())
    }
}

#[test]
fn test_sink_reads_current_counters_during_emit() {
    let (page, form) = page_with_form();
    let sink = Rc::new(BadgeSink::default());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();
    *sink.ctx.borrow_mut() = Rc::downgrade(probe.context());

    page.submit(&form).unwrap();
    page.submit(&form).unwrap();

    assert_eq!(
        *sink.seen.borrow(),
        vec![
            (1, Some("HTMLFormElement.submit() call #1".to_string())),
            (2, Some("HTMLFormElement.submit() call #2".to_string())),
        ]
    );
    assert_eq!(probe.counters().get(InterceptionKind::NativeSubmitInvoked), 2);
}

#[test]
fn test_repeated_origin_is_back_referenced() {
    let (page, form) = page_with_form();
    let sink = Rc::new(MemorySink::new());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();

    for _ in 0..2 {
        page.submit(&form).unwrap();
    }

    let reports: Vec<Report> = sink.reports().into_iter().filter(|r| r.event.is_some()).collect();
    assert_eq!(reports.len(), 2, "deduplication never drops a report");
    assert!(!reports[0].event.as_ref().unwrap().trace().is_empty());
    assert_eq!(reports[0].same_origin_as, None);
    assert_eq!(reports[1].same_origin_as, Some(1));
    assert_eq!(reports[1].trace_text(), "origin: same as #1");
    assert_eq!(reports[1].event.as_ref().unwrap().seq(), 2);
    assert_eq!(probe.counters().get(InterceptionKind::NativeSubmitInvoked), 2);
}

#[test]
fn test_dedupe_disabled_repeats_traces() {
    let (page, form) = page_with_form();
    let sink = Rc::new(MemorySink::new());
    let config = ProbeConfig {
        dedupe_traces: false,
        ..ProbeConfig::default()
    };
    let _probe = activate(&page, config, &AlwaysOn, Rc::clone(&sink)).unwrap();

    for _ in 0..2 {
        page.submit(&form).unwrap();
    }

    let reports = sink.reports();
    assert!(reports.iter().all(|r| r.same_origin_as.is_none()));
}

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_json_lines_one_object_per_report() {
    let (page, form) = page_with_form();
    let buffer = SharedBuffer::default();
    let _probe = activate(&page, ProbeConfig::default(), &AlwaysOn, JsonLinesSink::new(buffer.clone())).unwrap();

    page.submit(&form).unwrap();

    let text = String::from_utf8(buffer.0.borrow().clone()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2, "watcher notice plus one submit report");

    assert_eq!(lines[0]["level"], "info");
    assert!(lines[0].get("event").is_none());

    assert_eq!(lines[1]["level"], "warn");
    assert_eq!(lines[1]["headline"], "HTMLFormElement.submit() call #1");
    assert_eq!(lines[1]["event"]["kind"], "NativeSubmitInvoked");
    assert_eq!(lines[1]["event"]["seq"], 1);
    assert_eq!(lines[1]["event"]["subject"]["id"], "apply");
    assert_eq!(lines[1]["event"]["payload"]["type"], "submit");
    assert_eq!(lines[0]["session"], lines[1]["session"]);
}

#[test]
fn test_notice_levels_reach_sink() {
    let page = Page::new(HREF);
    let sink = Rc::new(MemorySink::new());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();

    probe
        .context()
        .notice(ReportLevel::Warn, "sandbox reloaded".to_string())
        .unwrap();

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].level, ReportLevel::Warn);
    assert_eq!(reports[1].headline, "sandbox reloaded");
}
