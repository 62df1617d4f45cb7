// src/server/mod.rs
pub mod client;
pub mod handler;
pub mod health;
mod listener;
pub mod message;
pub mod session;
pub mod stream;
pub mod watcher;

// Re-export public components
pub use client::{Client, ClientManager};
pub use health::{HealthMetrics, HealthReport};
pub use message::ServerMessage;
pub use session::{PreviewServer, ServerStatus, SessionPhase};
pub use stream::SubscriberStream;
pub use watcher::{DebounceSettings, FileChange, WatchSession};

// Import internal dependencies
use std::path::PathBuf;
use std::sync::Arc;
use crate::config::ServerConfig;

/// State shared by the request handlers of one serving session.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    /// Broadcaster of this session only.
    pub clients: ClientManager,
    pub metrics: HealthMetrics,
    /// Directory served at the root path.
    pub workspace: PathBuf,
}
