use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LEAD_KEYWORDS: &[&str] = &[
    "webflow.com/api/v1/form/",
    "webhook",
    "make.com",
    "zapier",
    "formly",
    "lead",
    "application",
    "bewerbung",
    "submit",
    "crm",
    "hook",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Marker identifying the multi-step form the watcher attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormMarker {
    pub attribute: String,
    pub value: String,
}

impl Default for FormMarker {
    fn default() -> Self {
        Self {
            attribute: "data-form".to_string(),
            value: "multistep".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Frames kept per origin trace. Zero disables capture entirely.
    pub max_stack_frames: usize,
    /// Report a trace identical to the previous one of the same kind as a back-reference.
    pub dedupe_traces: bool,
    pub lead_keywords: Vec<String>,
    pub extra_lead_keywords: Vec<String>,
    pub min_keyword_matches: usize,
    pub form_marker: FormMarker,
    pub role_attribute: String,
    pub submit_event_type: String,
    /// Pathname fragment the default activation gate looks for.
    pub activation_path: String,
    pub log_prefix: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_stack_frames: 12,
            dedupe_traces: true,
            lead_keywords: DEFAULT_LEAD_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            extra_lead_keywords: Vec::new(),
            min_keyword_matches: 1,
            form_marker: FormMarker::default(),
            role_attribute: "data-form".to_string(),
            submit_event_type: "submit".to_string(),
            activation_path: "/schnellbewerbung/sb-sandbox".to_string(),
            log_prefix: "[SB SANDBOX]".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ProbeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_json_str(&json)
    }

    /// Every keyword the classifier should test, lower-cased and without blanks.
    pub fn all_lead_keywords(&self) -> Vec<String> {
        self.lead_keywords
            .iter()
            .chain(&self.extra_lead_keywords)
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.submit_event_type.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "submit_event_type",
                reason: "must not be empty".to_string(),
            });
        }
        if self.form_marker.attribute.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "form_marker.attribute",
                reason: "must not be empty".to_string(),
            });
        }
        let keywords = self.all_lead_keywords().len();
        if self.min_keyword_matches == 0 || self.min_keyword_matches > keywords {
            return Err(ConfigError::Invalid {
                field: "min_keyword_matches",
                reason: format!("must be between 1 and {keywords}"),
            });
        }
        Ok(())
    }
}
