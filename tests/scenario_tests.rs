use std::rc::Rc;

use sbprobe::gate::PathGate;
use sbprobe::probe::{InterceptionKind, MemorySink};
use sbprobe::scenario::{self, Scenario};
use sbprobe::{activate, ProbeConfig};

#[tokio::test]
async fn test_demo_scenario_replay() {
    let scenario = Scenario::demo().expect("bundled scenario parses");
    let page = scenario.build_page();
    let sink = Rc::new(MemorySink::new());
    let config = ProbeConfig::default();
    let gate = PathGate::from_config(&config);
    let probe = activate(&page, config, &gate, Rc::clone(&sink)).expect("demo runs on the sandbox path");

    let outcomes = scenario::replay(&page, &scenario.steps).await.unwrap();
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let counters = probe.counters();
    assert_eq!(counters.get(InterceptionKind::ListenerAdded), 3);
    assert_eq!(counters.get(InterceptionKind::EventDispatched), 0);
    assert_eq!(counters.get(InterceptionKind::SubmitterClicked), 1);
    assert_eq!(counters.get(InterceptionKind::NetworkCallObserved), 2);
    assert_eq!(counters.get(InterceptionKind::RequestSubmitInvoked), 1);
    assert_eq!(counters.get(InterceptionKind::GateSubmitEventSeen), 2);
    assert_eq!(counters.get(InterceptionKind::NativeSubmitInvoked), 1);

    // Both event-driven submissions were cancelled by the host; only form.submit() navigated.
    assert_eq!(page.navigations().len(), 1);
    assert_eq!(page.network_log().len(), 3);

    let form = page.document().get_element_by_id("wf-form-application").unwrap();
    assert_eq!(probe.summarize(&form).unwrap().count, 2);
    assert_eq!(probe.indicator().last_label.as_deref(), Some("HTMLFormElement.submit() call #1"));
}

#[tokio::test]
async fn test_unknown_element_is_a_replay_error() {
    let scenario = Scenario::from_json(r#"{ "steps": [ { "op": "click", "element": "missing" } ] }"#).unwrap();
    let page = scenario.build_page();

    let err = scenario::replay(&page, &scenario.steps).await.unwrap_err();

    assert!(err.to_string().contains("missing"));
}
