use std::rc::Rc;

use sbprobe::host::{Event, Listener, ListenerOptions, Page};
use sbprobe::probe::registry::{HandlerRef, ListenerRegistration, ListenerRegistry};
use sbprobe::probe::OriginTrace;

fn registration(page_form: &Rc<sbprobe::host::Element>, capture: bool, listener: &Listener) -> ListenerRegistration {
    ListenerRegistration::new(
        page_form,
        ListenerOptions::from(capture),
        OriginTrace::empty("test"),
        HandlerRef::of(listener),
    )
}

fn listener() -> Listener {
    Rc::new(|_e: &Event| {})
}

#[test]
fn test_summary_partitions_by_phase() {
    let page = Page::new("https://example.com/");
    let form = page.append(&page.document().body(), "form", &[]);
    let mut registry = ListenerRegistry::new();
    let handler = listener();

    for capture in [true, false, false, true, false] {
        registry.record(Some(&form), registration(&form, capture, &handler));
    }

    let summary = registry.summarize(&form);
    assert_eq!(summary.count, 5);
    assert_eq!(summary.by_phase.capture, 2);
    assert_eq!(summary.by_phase.bubble, 3);
    assert_eq!(summary.by_phase.capture + summary.by_phase.bubble, summary.count);
    // Arrival order is preserved.
    let phases: Vec<bool> = summary.entries.iter().map(|e| e.capture).collect();
    assert_eq!(phases, vec![true, false, false, true, false]);
}

#[test]
fn test_identical_markup_tracked_independently() {
    let page = Page::new("https://example.com/");
    let body = page.document().body();
    let first = page.append(&body, "form", &[("name", "same")]);
    let second = page.append(&body, "form", &[("name", "same")]);
    let mut registry = ListenerRegistry::new();
    let handler = listener();

    registry.record(Some(&first), registration(&first, true, &handler));

    assert_eq!(registry.summarize(&first).count, 1);
    assert_eq!(registry.summarize(&second).count, 0);
    assert_eq!(registry.tracked_subjects(), 1);
}

#[test]
fn test_absent_subject_is_ignored() {
    let page = Page::new("https://example.com/");
    let form = page.append(&page.document().body(), "form", &[]);
    let mut registry = ListenerRegistry::new();
    let handler = listener();

    registry.record(None, registration(&form, false, &handler));

    assert_eq!(registry.tracked_subjects(), 0);
}

#[test]
fn test_registry_does_not_keep_subject_alive() {
    let page = Page::new("https://example.com/");
    let body = page.document().body();
    let form = page.append(&body, "form", &[]);
    let mut registry = ListenerRegistry::new();
    let handler = listener();
    registry.record(Some(&form), registration(&form, true, &handler));

    let weak = Rc::downgrade(&form);
    form.remove();
    drop(form);

    assert!(weak.upgrade().is_none(), "removed form must be reclaimable");
    assert_eq!(registry.prune(), 1);
    assert_eq!(registry.tracked_subjects(), 0);
}

#[test]
fn test_new_subject_prunes_dead_ledgers() {
    let page = Page::new("https://example.com/");
    let body = page.document().body();
    let old = page.append(&body, "form", &[]);
    let handler = listener();
    let mut registry = ListenerRegistry::new();
    registry.record(Some(&old), registration(&old, true, &handler));
    old.remove();
    drop(old);

    let fresh = page.append(&body, "form", &[]);
    registry.record(Some(&fresh), registration(&fresh, false, &handler));

    assert_eq!(registry.tracked_subjects(), 1);
}

#[test]
fn test_handler_ref_is_identity_only() {
    let page = Page::new("https://example.com/");
    let form = page.append(&page.document().body(), "form", &[]);
    let kept = listener();
    let other = listener();
    let entry = registration(&form, false, &kept);

    assert!(entry.handler.refers_to(&kept));
    assert!(!entry.handler.refers_to(&other));
    assert_eq!(Rc::strong_count(&kept), 1, "registry holds no strong handler reference");
    assert_eq!(entry.subject().map(|s| s.id()), Some(form.id()));
}
