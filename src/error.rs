//! Error types for the synchronization engine.
//!
//! Errors are layered by boundary: the registry and control-plane adapters
//! each have their own error enum, and `SyncError` wraps everything the
//! orchestrator can surface. Per-record application failures never travel
//! through these types; they are reported as [`crate::sync::ApplyOutcome`]
//! so one bad record cannot abort a reconciliation pass.

use thiserror::Error;

/// Errors from the registry (KV store) boundary.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transport-level failure talking to the store.
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered but the response could not be interpreted.
    #[error("unexpected registry response: {0}")]
    UnexpectedResponse(String),

    /// The watch stream broke and cannot be resumed. Fatal.
    #[error("watch stream failed: {0}")]
    WatchFailed(String),
}

/// Errors from the control-plane (SDN API) boundary.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Transport-level failure talking to the control plane.
    #[error("control-plane request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API rejected a request (non-success status).
    #[error("control-plane rejected {operation}: {status}")]
    Rejected {
        operation: &'static str,
        status: reqwest::StatusCode,
    },

    /// The API answered but the response could not be interpreted.
    #[error("unexpected control-plane response: {0}")]
    UnexpectedResponse(String),
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error surfaced by the orchestrator. Anything that reaches this
/// type is fatal to the process.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
