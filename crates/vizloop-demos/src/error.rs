//! Error types for the demo simulations.

use vizloop_core::config::ConfigError;

/// Errors raised while building a demo simulation.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// A demo setting is out of range.
    #[error("invalid {name}: {reason}")]
    InvalidSetting {
        /// Name of the offending setting.
        name: &'static str,
        /// Explanation of what is wrong with it.
        reason: String,
    },

    /// No demo is registered under this name.
    #[error("unknown demo: {name} (expected life, mpc, or attention)")]
    UnknownDemo {
        /// The name that was requested.
        name: String,
    },

    /// The scheduler configuration was rejected.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },
}

impl DemoError {
    /// Shorthand for [`DemoError::InvalidSetting`].
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name,
            reason: reason.into(),
        }
    }
}
