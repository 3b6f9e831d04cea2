//! Scripted host activity for replaying a page session against the probe.

use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{Body, Event, FetchInput, HostError, Listener, ListenerOptions, Page, RequestInit, Target};

const DEMO_SCENARIO: &str = include_str!("../scenarios/demo.json");

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid scenario JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("step {step}: no element with id '{id}'")]
    UnknownElement { step: usize, id: String },
}

fn default_location() -> String {
    "https://example.com/".to_string()
}

fn default_tag() -> String {
    "button".to_string()
}

fn submit_type() -> String {
    "submit".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSpec {
    pub id: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// Carries the multi-step marker attribute.
    #[serde(default)]
    pub multistep: bool,
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    AddListener {
        target: String,
        #[serde(default = "submit_type")]
        event: String,
        #[serde(default)]
        capture: bool,
        #[serde(default)]
        once: bool,
        #[serde(default)]
        passive: bool,
        #[serde(default)]
        prevent_default: bool,
    },
    Dispatch {
        target: String,
        #[serde(default = "submit_type")]
        event: String,
    },
    Submit {
        form: String,
    },
    RequestSubmit {
        form: String,
        #[serde(default)]
        submitter: Option<String>,
    },
    Click {
        element: String,
    },
    Fetch {
        url: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        body: Option<String>,
    },
    Beacon {
        url: String,
        #[serde(default)]
        data: Option<String>,
    },
    Xhr {
        method: String,
        url: String,
        #[serde(default)]
        body: Option<String>,
    },
    RemoveElement {
        element: String,
    },
    FinishLoading,
    Wait {
        ms: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub forms: Vec<FormSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Result of one replayed step. Host failures are outcomes, not replay errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: usize,
    pub result: Result<(), HostError>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn demo() -> Result<Self, ScenarioError> {
        Self::from_json(DEMO_SCENARIO)
    }

    pub fn build_page(&self) -> Page {
        let page = if self.loading {
            Page::loading(&self.location)
        } else {
            Page::new(&self.location)
        };
        let body = page.document().body();
        for spec in &self.forms {
            let mut attrs: Vec<(&str, &str)> = vec![("id", spec.id.as_str())];
            if let Some(name) = &spec.name {
                attrs.push(("name", name.as_str()));
            }
            if let Some(action) = &spec.action {
                attrs.push(("action", action.as_str()));
            }
            if let Some(method) = &spec.method {
                attrs.push(("method", method.as_str()));
            }
            if spec.multistep {
                attrs.push(("data-form", "multistep"));
            }
            let form = page.append(&body, "form", &attrs);
            for control in &spec.controls {
                let mut attrs: Vec<(&str, &str)> = vec![("id", control.id.as_str())];
                if let Some(kind) = &control.kind {
                    attrs.push(("type", kind.as_str()));
                }
                page.append(&form, &control.tag, &attrs);
            }
        }
        page
    }
}

fn element(page: &Page, step: usize, id: &str) -> Result<Rc<crate::host::Element>, ScenarioError> {
    page.document()
        .get_element_by_id(id)
        .ok_or_else(|| ScenarioError::UnknownElement {
            step,
            id: id.to_string(),
        })
}

fn target(page: &Page, step: usize, name: &str) -> Result<Target, ScenarioError> {
    match name {
        "window" => Ok(Target::Window),
        "document" => Ok(Target::Document),
        id => Ok(Target::Element(element(page, step, id)?)),
    }
}

/// Replays `steps` in order through the page's host-facing entry points.
pub async fn replay(page: &Page, steps: &[Step]) -> Result<Vec<StepOutcome>, ScenarioError> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let result = match step {
            Step::AddListener {
                target: name,
                event,
                capture,
                once,
                passive,
                prevent_default,
            } => {
                let prevent = *prevent_default;
                let listener: Listener = Rc::new(move |e: &Event| {
                    if prevent {
                        e.prevent_default();
                    }
                });
                let options = ListenerOptions {
                    capture: *capture,
                    once: *once,
                    passive: *passive,
                };
                page.add_event_listener(&target(page, index, name)?, event, listener, options)
            }
            Step::Dispatch { target: name, event } => page
                .dispatch_event(&target(page, index, name)?, &Event::new(event, true, true))
                .map(|_| ()),
            Step::Submit { form } => page.submit(&element(page, index, form)?),
            Step::RequestSubmit { form, submitter } => {
                let submitter = submitter
                    .as_deref()
                    .map(|id| element(page, index, id))
                    .transpose()?;
                page.request_submit(&element(page, index, form)?, submitter.as_ref())
            }
            Step::Click { element: id } => page.click(&element(page, index, id)?),
            Step::Fetch { url, method, body } => {
                let init = RequestInit {
                    method: method.clone(),
                    body: body.clone().map(Body::Text),
                };
                page.fetch(&FetchInput::from(url.as_str()), Some(&init)).map(|_| ())
            }
            Step::Beacon { url, data } => {
                let data = data.clone().map(Body::Text);
                page.send_beacon(url, data.as_ref()).map(|_| ())
            }
            Step::Xhr { method, url, body } => {
                let transport = page.new_transport();
                let body = body.clone().map(Body::Text);
                page.transport_open(&transport, method, url)
                    .and_then(|()| page.transport_send(&transport, body.as_ref()))
            }
            Step::RemoveElement { element: id } => {
                element(page, index, id)?.remove();
                Ok(())
            }
            Step::FinishLoading => {
                page.finish_loading();
                Ok(())
            }
            Step::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
        };
        if let Err(err) = &result {
            tracing::debug!(step = index, %err, "host call failed");
        }
        outcomes.push(StepOutcome { step: index, result });
    }
    Ok(outcomes)
}
