//! Error types for the orchestrator
//!
//! `EngineError` is what the container engine client returns; it never
//! escapes as a panic. `WardenError` is the orchestrator-level taxonomy
//! that callers branch on.

use thiserror::Error;

/// Errors raised by the container engine API client
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Network or HTTP transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The engine answered with a non-success status code
    #[error("engine returned {code}: {message}")]
    Status { code: u16, message: String },

    /// The engine answered with a body we could not understand
    #[error("malformed engine response: {0}")]
    Malformed(String),

    /// The request could not be built from the given input
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The engine accepted the call but reported a failure in the body
    #[error("engine rejected request: {0}")]
    Rejected(String),
}

impl EngineError {
    /// HTTP status code, if the engine produced one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EngineError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport(_) => true,
            EngineError::Status { code, .. } => *code >= 500,
            EngineError::Malformed(_)
            | EngineError::InvalidRequest(_)
            | EngineError::Rejected(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Malformed(err.to_string())
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

/// Orchestrator error taxonomy
#[derive(Debug, Error)]
pub enum WardenError {
    /// Network failure against the engine API or the health endpoint
    #[error("transport error: {0}")]
    Transport(String),

    /// Missing or invalid setting
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Daily recovery attempt cap reached for a container
    #[error("recovery exhausted for {container}: {attempts}/{cap} attempts used today")]
    RecoveryExhausted {
        container: String,
        attempts: u32,
        cap: u32,
    },

    /// `deploy_all` stopped before completing the chain
    #[error("deployment stopped at {failed} after {succeeded:?}: {error}")]
    PartialDeployment {
        succeeded: Vec<String>,
        failed: String,
        error: String,
    },

    /// A single-container deploy or recreate did not complete
    #[error("deployment of {container} failed: {error}")]
    DeployFailed { container: String, error: String },

    /// Name does not match any configured container
    #[error("unknown container: {0}")]
    UnknownContainer(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WardenError {
    /// Whether the failure is transient
    pub fn is_retryable(&self) -> bool {
        match self {
            WardenError::Transport(_) => true,
            WardenError::Engine(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<config::ConfigError> for WardenError {
    fn from(err: config::ConfigError) -> Self {
        WardenError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
