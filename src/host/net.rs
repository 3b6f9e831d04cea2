use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use super::HostError;

/// First argument of a fetch-style request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchInput {
    Url(String),
    Request { url: String, method: String },
}

impl FetchInput {
    pub fn url(&self) -> &str {
        match self {
            FetchInput::Url(url) => url,
            FetchInput::Request { url, .. } => url,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            FetchInput::Url(_) => None,
            FetchInput::Request { method, .. } => Some(method),
        }
    }
}

impl From<&str> for FetchInput {
    fn from(url: &str) -> Self {
        FetchInput::Url(url.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInit {
    pub method: Option<String>,
    pub body: Option<Body>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Body {
    Text(String),
    Form(Vec<(String, String)>),
    Bytes(Vec<u8>),
}

impl Body {
    /// Flat text rendering, urlencoded-style for form pairs.
    pub fn to_text(&self) -> String {
        match self {
            Body::Text(text) => text.clone(),
            Body::Form(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
            Body::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Body::Text(text) => text.len(),
            Body::Form(_) => self.to_text().len(),
            Body::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Fetch,
    Beacon,
    Xhr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
enum TransportState {
    Unsent,
    Opened { method: String, url: String },
    Sent,
}

/// A request/response transport instance: opened with method and target,
/// then sent with an optional payload, as two separate calls.
#[derive(Debug)]
pub struct Transport {
    id: TransportId,
    state: RefCell<TransportState>,
}

impl Transport {
    pub(crate) fn new(id: TransportId) -> Self {
        Self {
            id,
            state: RefCell::new(TransportState::Unsent),
        }
    }

    pub fn id(&self) -> TransportId {
        self.id
    }

    pub fn is_sent(&self) -> bool {
        *self.state.borrow() == TransportState::Sent
    }

    pub(crate) fn open(&self, method: &str, url: &str) -> Result<(), HostError> {
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(HostError::syntax(format!("'{method}' is not a valid HTTP method")));
        }
        *self.state.borrow_mut() = TransportState::Opened {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        };
        Ok(())
    }

    /// Consumes the opened state; the transport must be re-opened before the next send.
    pub(crate) fn begin_send(&self) -> Result<(String, String), HostError> {
        let mut state = self.state.borrow_mut();
        match std::mem::replace(&mut *state, TransportState::Sent) {
            TransportState::Opened { method, url } => Ok((method, url)),
            previous => {
                *state = previous;
                Err(HostError::invalid_state("the object's state must be OPENED"))
            }
        }
    }
}

/// Response handle returned by the fetch-style capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchResponse {
    pub request_id: u64,
}

/// One outbound call actually initiated by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub transport: TransportKind,
    pub method: Option<String>,
    pub url: String,
    pub body: Option<Body>,
}
