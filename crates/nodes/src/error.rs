//! Error types shared by node processors and their collaborators.

use thiserror::Error;

/// Errors returned by a processor's `process` method.
///
/// The variant tells the orchestrator what kind of failure happened:
/// - `InvalidConfig` — bad node configuration, detected before any I/O.
/// - `Repository`    — a lookup or persistence call failed.
/// - `ProviderConstruction` / `External` — an adapter or vendor call failed.
/// - `Cancelled`     — the run was stopped; not a service failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Missing or malformed node configuration.
    #[error("invalid node config: {0}")]
    InvalidConfig(String),

    /// A repository call failed.
    #[error("repository operation '{operation}' failed: {message}")]
    Repository {
        operation: &'static str,
        message: String,
    },

    /// A pluggable provider could not be built from its configuration.
    #[error("failed to construct {kind} provider '{provider}': {message}")]
    ProviderConstruction {
        kind: &'static str,
        provider: String,
        message: String,
    },

    /// A call into an external service (ACME, vendor SDK, notify transport) failed.
    #[error("external call '{call}' failed: {message}")]
    External { call: String, message: String },

    /// Certificate material could not be parsed.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// A notify channel could not be resolved from stored settings.
    #[error("failed to resolve notify channel '{channel}': {message}")]
    ChannelResolution { channel: String, message: String },

    /// The run's cancellation signal fired.
    #[error("workflow run cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn repository(operation: &'static str, err: RepositoryError) -> Self {
        Self::Repository {
            operation,
            message: err.to_string(),
        }
    }

    /// Map a provider error raised during a vendor call. Cancellation keeps
    /// its own variant so the orchestrator can tell "stopped" from "failed".
    pub fn external(call: impl Into<String>, err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => Self::Cancelled,
            other => Self::External {
                call: call.into(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors surfaced by repository collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by pluggable providers (DNS, deploy targets, uploaders,
/// notify channels, the ACME client).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider config: {0}")]
    InvalidConfig(String),

    #[error("request '{call}' failed: {message}")]
    Request { call: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    pub fn request(call: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            call: call.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by the node dispatcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unimplemented node type: '{0}'")]
    UnimplementedType(String),
}
