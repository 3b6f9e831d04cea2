use sbprobe::host::Page;
use sbprobe::probe::{is_submit_control, LeadTrafficClassifier};
use sbprobe::ProbeConfig;

#[test]
fn test_default_keywords() {
    let classifier = LeadTrafficClassifier::default();

    assert!(classifier.is_lead_relevant("https://hooks.zapier.com/x", ""));
    assert!(!classifier.is_lead_relevant("https://cdn.example.com/img.png", ""));
    assert!(classifier.is_lead_relevant("https://api.example.com/track", "applicationId=42"));
    assert!(classifier.is_lead_relevant("https://webflow.com/api/v1/form/abc", ""));
    assert!(classifier.is_lead_relevant("https://hook.eu1.make.com/xyz", ""));
}

#[test]
fn test_matching_is_case_insensitive() {
    let classifier = LeadTrafficClassifier::default();

    assert!(classifier.is_lead_relevant("https://example.com/SUBMIT", ""));
    assert!(classifier.is_lead_relevant("https://example.com/", "Bewerbung=ja"));
}

#[test]
fn test_threshold_and_extra_keywords() {
    let strict = LeadTrafficClassifier::new(["lead", "crm"], 2);
    assert!(!strict.is_lead_relevant("https://example.com/lead", ""));
    assert!(strict.is_lead_relevant("https://crm.example.com/lead", ""));

    let config = ProbeConfig {
        extra_lead_keywords: vec!["Typeform".to_string()],
        ..ProbeConfig::default()
    };
    let extended = LeadTrafficClassifier::from_config(&config);
    assert!(extended.is_lead_relevant("https://api.typeform.com/responses", ""));
}

#[test]
fn test_submit_control_classification() {
    let page = Page::new("https://example.com/");
    let body = page.document().body();

    let bare_button = page.append(&body, "button", &[]);
    let submit_button = page.append(&body, "button", &[("type", "Submit")]);
    let plain_button = page.append(&body, "button", &[("type", "button")]);
    let submit_input = page.append(&body, "input", &[("type", "submit")]);
    let text_input = page.append(&body, "input", &[("type", "text")]);
    let div = page.append(&body, "div", &[]);

    assert!(is_submit_control(&bare_button));
    assert!(is_submit_control(&submit_button));
    assert!(!is_submit_control(&plain_button));
    assert!(is_submit_control(&submit_input));
    assert!(!is_submit_control(&text_input));
    assert!(!is_submit_control(&div));
}
