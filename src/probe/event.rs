use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::registry::PhaseCounts;
use super::stack::OriginTrace;
use crate::host::{Element, Target, TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InterceptionKind {
    ListenerAdded,
    EventDispatched,
    NativeSubmitInvoked,
    RequestSubmitInvoked,
    SubmitterClicked,
    NetworkCallObserved,
    GateSubmitEventSeen,
}

impl InterceptionKind {
    pub const ALL: [InterceptionKind; 7] = [
        InterceptionKind::ListenerAdded,
        InterceptionKind::EventDispatched,
        InterceptionKind::NativeSubmitInvoked,
        InterceptionKind::RequestSubmitInvoked,
        InterceptionKind::SubmitterClicked,
        InterceptionKind::NetworkCallObserved,
        InterceptionKind::GateSubmitEventSeen,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Short name used as the origin-trace label.
    pub fn trace_label(self) -> &'static str {
        match self {
            InterceptionKind::ListenerAdded => "addEventListener(submit)",
            InterceptionKind::EventDispatched => "dispatchEvent(submit)",
            InterceptionKind::NativeSubmitInvoked => "form.submit()",
            InterceptionKind::RequestSubmitInvoked => "form.requestSubmit()",
            InterceptionKind::SubmitterClicked => "submit button click()",
            InterceptionKind::NetworkCallObserved => "lead request",
            InterceptionKind::GateSubmitEventSeen => "submit event",
        }
    }
}

/// Identifying attributes of a node, copied out at observation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectDescriptor {
    pub tag: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub action: Option<String>,
    pub role: Option<String>,
}

impl SubjectDescriptor {
    pub fn of(el: &Element, role_attribute: &str) -> Self {
        Self {
            tag: el.tag().to_string(),
            id: el.attribute("id"),
            name: el.attribute("name"),
            action: el.attribute("action"),
            role: el.attribute(role_attribute),
        }
    }

    pub fn of_target(target: &Target, role_attribute: &str) -> Self {
        match target {
            Target::Window => Self {
                tag: "#window".to_string(),
                ..Self::default()
            },
            Target::Document => Self {
                tag: "#document".to_string(),
                ..Self::default()
            },
            Target::Element(el) => Self::of(el, role_attribute),
        }
    }

    pub(crate) fn of_optional(el: Option<&Rc<Element>>, role_attribute: &str) -> Option<Self> {
        el.map(|el| Self::of(el, role_attribute))
    }
}

impl fmt::Display for SubjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag.to_ascii_lowercase())?;
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        if let Some(name) = &self.name {
            write!(f, "[name={name}]")?;
        }
        if let Some(action) = &self.action {
            write!(f, "[action={action}]")?;
        }
        if let Some(role) = &self.role {
            write!(f, "[role={role}]")?;
        }
        Ok(())
    }
}

/// Kind-specific context. Network payloads record presence only, never content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Listener {
        capture: bool,
        once: bool,
        passive: bool,
        /// False when the target was not a form and the entry stayed unattributed.
        attributed: bool,
    },
    Dispatch {
        cancelable: bool,
    },
    Submit,
    RequestSubmit {
        submitter: Option<SubjectDescriptor>,
    },
    Click,
    Network {
        transport: TransportKind,
        method: Option<String>,
        url: String,
        has_body: bool,
    },
    GateSubmit {
        default_prevented: bool,
        submitter: Option<SubjectDescriptor>,
        listener_count_tracked: usize,
        by_phase: PhaseCounts,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct InterceptionEvent {
    kind: InterceptionKind,
    seq: u64,
    /// Time since activation.
    at: Duration,
    subject: Option<SubjectDescriptor>,
    payload: Payload,
    trace: OriginTrace,
}

impl InterceptionEvent {
    pub(crate) fn new(
        kind: InterceptionKind,
        seq: u64,
        at: Duration,
        subject: Option<SubjectDescriptor>,
        payload: Payload,
        trace: OriginTrace,
    ) -> Self {
        Self {
            kind,
            seq,
            at,
            subject,
            payload,
            trace,
        }
    }

    pub fn kind(&self) -> InterceptionKind {
        self.kind
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn at(&self) -> Duration {
        self.at
    }

    pub fn subject(&self) -> Option<&SubjectDescriptor> {
        self.subject.as_ref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn trace(&self) -> &OriginTrace {
        &self.trace
    }

    /// Operator-facing headline, e.g. `LEAD XHR #3`.
    pub fn headline(&self) -> String {
        let n = self.seq;
        match (&self.kind, &self.payload) {
            (InterceptionKind::ListenerAdded, _) => format!("addEventListener(\"submit\") #{n}"),
            (InterceptionKind::EventDispatched, _) => format!("dispatchEvent('submit') #{n}"),
            (InterceptionKind::NativeSubmitInvoked, _) => format!("HTMLFormElement.submit() call #{n}"),
            (InterceptionKind::RequestSubmitInvoked, _) => {
                format!("HTMLFormElement.requestSubmit() call #{n}")
            }
            (InterceptionKind::SubmitterClicked, _) => format!("submitter.click() #{n}"),
            (InterceptionKind::NetworkCallObserved, Payload::Network { transport, .. }) => {
                let via = match transport {
                    TransportKind::Fetch => "fetch",
                    TransportKind::Beacon => "beacon",
                    TransportKind::Xhr => "XHR",
                };
                format!("LEAD {via} #{n}")
            }
            (InterceptionKind::NetworkCallObserved, _) => format!("LEAD request #{n}"),
            (InterceptionKind::GateSubmitEventSeen, _) => format!("SUBMIT event #{n}"),
        }
    }
}
