//! Activation gate: the one predicate deciding whether the probe installs at all.

use crate::config::ProbeConfig;
use crate::host::Location;

pub trait ActivationGate {
    fn is_active(&self, location: &Location) -> bool;
}

/// Active when the page path contains a configured fragment.
#[derive(Debug, Clone)]
pub struct PathGate {
    needle: String,
}

impl PathGate {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(&config.activation_path)
    }
}

impl ActivationGate for PathGate {
    fn is_active(&self, location: &Location) -> bool {
        !self.needle.is_empty() && location.pathname().contains(&self.needle)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlwaysOn;

impl ActivationGate for AlwaysOn {
    fn is_active(&self, _location: &Location) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlwaysOff;

impl ActivationGate for AlwaysOff {
    fn is_active(&self, _location: &Location) -> bool {
        false
    }
}
