use std::rc::Rc;

use sbprobe::gate::{AlwaysOn, PathGate};
use sbprobe::host::{Event, Listener, ListenerOptions, Page, Target};
use sbprobe::probe::{InterceptionKind, MemorySink, Payload, ReportLevel};
use sbprobe::{activate, ProbeConfig};

const ACTIVE_HREF: &str = "https://bewerbung.example.com/schnellbewerbung/sb-sandbox?step=2";

fn noop() -> Listener {
    Rc::new(|_e: &Event| {})
}

#[test]
fn test_closed_gate_installs_nothing() {
    let page = Page::new("https://bewerbung.example.com/karriere");
    let form = page.append(&page.document().body(), "form", &[("id", "apply")]);
    let sink = Rc::new(MemorySink::new());
    let config = ProbeConfig::default();
    let gate = PathGate::from_config(&config);

    let probe = activate(&page, config, &gate, Rc::clone(&sink));

    assert!(probe.is_none());
    assert!(!page.capabilities().any_wrapped());

    page.add_event_listener(&Target::from(&form), "submit", noop(), true).unwrap();
    page.request_submit(&form, None).unwrap();
    page.submit(&form).unwrap();

    assert!(sink.is_empty(), "no report may be emitted while the gate is closed");
    assert_eq!(page.navigations().len(), 2);
}

#[test]
fn test_native_submit_scenario() {
    let page = Page::new(ACTIVE_HREF);
    let form = page.append(&page.document().body(), "form", &[("id", "wf-form"), ("action", "/go")]);
    let sink = Rc::new(MemorySink::new());
    let config = ProbeConfig::default();
    let gate = PathGate::from_config(&config);

    let probe = activate(&page, config, &gate, Rc::clone(&sink)).expect("path matches");
    page.submit(&form).unwrap();

    assert_eq!(probe.counters().get(InterceptionKind::NativeSubmitInvoked), 1);
    let events = sink.events_of(InterceptionKind::NativeSubmitInvoked);
    assert_eq!(events.len(), 1);
    let subject = events[0].subject().expect("form descriptor");
    assert_eq!(subject.id.as_deref(), Some("wf-form"));
    assert_eq!(subject.action.as_deref(), Some("/go"));
    assert_eq!(page.navigations().len(), 1);
    // Native submit skips the submit event, so the watcher stays silent.
    assert_eq!(probe.counters().get(InterceptionKind::GateSubmitEventSeen), 0);
}

#[test]
fn test_watcher_reports_tracked_listener_count() {
    let page = Page::new(ACTIVE_HREF);
    let form = page.append(&page.document().body(), "form", &[("id", "apply")]);
    let sink = Rc::new(MemorySink::new());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();

    let options = ListenerOptions {
        capture: true,
        once: true,
        passive: false,
    };
    page.add_event_listener(&Target::from(&form), "submit", noop(), options).unwrap();

    let summary = probe.summarize(&form).unwrap();
    assert_eq!(summary.count, 1);
    assert!(summary.entries[0].capture);
    assert!(summary.entries[0].once);

    page.request_submit(&form, None).unwrap();

    let seen = sink.events_of(InterceptionKind::GateSubmitEventSeen);
    assert_eq!(seen.len(), 1);
    match seen[0].payload() {
        Payload::GateSubmit {
            listener_count_tracked,
            by_phase,
            default_prevented,
            submitter,
        } => {
            assert_eq!(*listener_count_tracked, 1);
            assert_eq!(by_phase.capture, 1);
            assert_eq!(by_phase.bubble, 0);
            assert!(!default_prevented);
            assert!(submitter.is_none());
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn test_watcher_runs_before_bubble_handlers() {
    let page = Page::new(ACTIVE_HREF);
    let form = page.append(&page.document().body(), "form", &[]);
    let button = page.append(&form, "button", &[("id", "send")]);
    let sink = Rc::new(MemorySink::new());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();

    let blocker: Listener = Rc::new(|e: &Event| e.prevent_default());
    page.add_event_listener(&Target::from(&form), "submit", blocker, false).unwrap();

    page.click(&button).unwrap();

    assert!(page.navigations().is_empty(), "host handler still cancels the submission");
    let seen = sink.events_of(InterceptionKind::GateSubmitEventSeen);
    match seen[0].payload() {
        Payload::GateSubmit {
            default_prevented,
            submitter,
            ..
        } => {
            assert!(!default_prevented, "capture-phase watcher observes before preventDefault");
            assert_eq!(submitter.as_ref().and_then(|s| s.id.as_deref()), Some("send"));
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(probe.counters().get(InterceptionKind::SubmitterClicked), 1);
}

#[test]
fn test_watcher_sees_prevention_from_earlier_capture_handler() {
    let page = Page::new(ACTIVE_HREF);
    let form = page.append(&page.document().body(), "form", &[]);
    let sink = Rc::new(MemorySink::new());
    let blocker: Listener = Rc::new(|e: &Event| e.prevent_default());
    page.add_event_listener(&Target::Document, "submit", blocker, true).unwrap();

    let _probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();
    page.request_submit(&form, None).unwrap();

    let seen = sink.events_of(InterceptionKind::GateSubmitEventSeen);
    assert!(matches!(
        seen[0].payload(),
        Payload::GateSubmit { default_prevented: true, .. }
    ));
}

#[test]
fn test_marker_form_preferred() {
    let page = Page::new(ACTIVE_HREF);
    let body = page.document().body();
    let search = page.append(&body, "form", &[("id", "search")]);
    let wizard = page.append(&body, "form", &[("id", "wizard"), ("data-form", "multistep")]);
    let sink = Rc::new(MemorySink::new());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();

    page.request_submit(&search, None).unwrap();
    assert_eq!(probe.counters().get(InterceptionKind::GateSubmitEventSeen), 0);

    page.request_submit(&wizard, None).unwrap();
    let seen = sink.events_of(InterceptionKind::GateSubmitEventSeen);
    assert_eq!(seen.len(), 1);
    let subject = seen[0].subject().unwrap();
    assert_eq!(subject.id.as_deref(), Some("wizard"));
    assert_eq!(subject.role.as_deref(), Some("multistep"));
}

#[test]
fn test_watcher_deferred_until_ready() {
    let page = Page::loading(ACTIVE_HREF);
    let sink = Rc::new(MemorySink::new());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();

    // The form only exists once parsing finishes.
    let form = page.append(&page.document().body(), "form", &[("id", "late")]);
    assert!(sink.is_empty());

    page.finish_loading();
    page.request_submit(&form, None).unwrap();

    assert_eq!(probe.counters().get(InterceptionKind::GateSubmitEventSeen), 1);
    let notices: Vec<_> = sink.reports().into_iter().filter(|r| r.event.is_none()).collect();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].headline.contains("form#late"));
}

#[test]
fn test_missing_form_reported_once_and_interposers_stay_active() {
    let page = Page::new(ACTIVE_HREF);
    let sink = Rc::new(MemorySink::new());
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, Rc::clone(&sink)).unwrap();

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].level, ReportLevel::Info);
    assert!(reports[0].headline.contains("no form found"));

    page.fetch(&"https://hooks.zapier.com/hooks/catch/9".into(), None).unwrap();
    assert_eq!(probe.counters().get(InterceptionKind::NetworkCallObserved), 1);
}

#[test]
fn test_watcher_listener_not_in_ledger() {
    let page = Page::new(ACTIVE_HREF);
    let form = page.append(&page.document().body(), "form", &[]);
    let probe = activate(&page, ProbeConfig::default(), &AlwaysOn, MemorySink::new()).unwrap();

    assert_eq!(probe.summarize(&form).unwrap().count, 0);
    assert_eq!(probe.counters().get(InterceptionKind::ListenerAdded), 0);
}
