//! Error types for the runner binary.

/// Error from mounting and running a demo.
///
/// `main` converts this into [`anyhow::Error`] at the process boundary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The selected demo rejected its settings.
    #[error("demo error: {source}")]
    Demo {
        /// The underlying demo error.
        #[from]
        source: vizloop_demos::error::DemoError,
    },

    /// The scheduler could not be constructed.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying config error.
        #[from]
        source: vizloop_core::config::ConfigError,
    },

    /// The run summary could not be serialized.
    #[error("failed to serialize run summary: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
