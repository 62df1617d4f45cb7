use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Represents the errors that can occur while provisioning and serving a workspace.
#[derive(Error, Debug)]
pub enum ChartsError {
    /// The requested chart library is not in the catalog.
    ///
    /// Carries the valid ids so callers can show them to the user.
    #[error("Unsupported chart library: {requested}. Supported: {}", .supported.join(", "))]
    UnsupportedLibrary {
        requested: String,
        supported: Vec<String>,
    },

    /// The listening socket could not be bound (port in use, permission denied).
    #[error("Failed to bind to {addr}: {source}")]
    PortBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The file watcher could not be set up for a directory.
    ///
    /// Serving continues without live reload when this happens.
    #[error("Failed to watch {path}: {reason}")]
    WatchInit { path: PathBuf, reason: String },

    /// Represents an error in the server configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Creating or writing the workspace directory failed.
    #[error("Workspace error: {0}")]
    WorkspaceError(String),

    /// No workspace has been initialized yet.
    #[error("No workspace initialized. Call initialize_wk first.")]
    WorkspaceNotInitialized,

    /// Indicates a failure in serializing or deserializing data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Tool arguments did not meet expected criteria.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A tool name that the dispatcher does not know.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Registering or encoding metrics failed.
    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ChartsError {
    fn from(err: serde_json::Error) -> Self {
        ChartsError::SerializationError(err.to_string())
    }
}

impl From<prometheus::Error> for ChartsError {
    fn from(err: prometheus::Error) -> Self {
        ChartsError::MetricsError(err.to_string())
    }
}
