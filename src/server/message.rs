use std::fmt;

use axum::response::sse::Event;

/// Represents messages that the server pushes to live-reload subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMessage {
    /// Handshake written as soon as a subscriber attaches.
    Connected,

    /// Tells the page to reload itself.
    Reload,
}

impl ServerMessage {
    /// The `data:` payload carried by this message.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMessage::Connected => "connected",
            ServerMessage::Reload => "reload",
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a `ServerMessage` into an axum SSE `Event` with a single data line.
impl From<ServerMessage> for Event {
    fn from(msg: ServerMessage) -> Self {
        Event::default().data(msg.as_str())
    }
}
