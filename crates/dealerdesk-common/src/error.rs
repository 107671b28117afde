//! Error types for Dealerdesk configuration
//!
//! Path validation errors live next to the validators in [`crate::types`].

use thiserror::Error;

/// Common result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A required configuration value is missing or unusable.
///
/// Messages name the variable but never include its value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration value {name}")]
    Missing { name: String },

    #[error("configuration value {name} is empty")]
    Empty { name: String },

    #[error("configuration value {name} is not a PEM private key: {hint}")]
    InvalidPrivateKey { name: String, hint: &'static str },

    #[error("invalid configuration value {name}: {reason}")]
    Invalid { name: String, reason: String },
}

impl ConfigError {
    /// Name of the offending configuration value
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Missing { name }
            | Self::Empty { name }
            | Self::InvalidPrivateKey { name, .. }
            | Self::Invalid { name, .. } => name,
        }
    }
}
