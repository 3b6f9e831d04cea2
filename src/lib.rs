pub mod config;
pub mod error;
pub mod gate;
pub mod host;
pub mod probe;
pub mod scenario;

// Re-export the activation surface for convenient access
pub use config::ProbeConfig;
pub use error::ProbeError;
pub use probe::{activate, Probe};
