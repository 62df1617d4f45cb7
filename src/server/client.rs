use std::sync::Arc;
use parking_lot::Mutex;
use uuid::Uuid;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::server::message::ServerMessage;
use crate::server::stream::SubscriberStream;

/// Represents one open live-reload connection.
///
/// The HTTP side holds the receiving half of the channel; dropping it is what
/// makes [`Client::send`] fail.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the client.
    pub id: Uuid,
    /// Channel sender feeding the client's event stream.
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Client {
    /// Creates a new `Client` together with the receiving end of its stream.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let client = Client {
            id: Uuid::new_v4(),
            sender,
        };
        (client, receiver)
    }

    /// Queues a message for the client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SendFailed` if the connection has gone away.
    pub fn send(&self, message: ServerMessage) -> Result<(), ClientError> {
        self.sender.send(message).map_err(|_| ClientError::SendFailed)
    }
}

#[derive(Debug, Default)]
struct ClientSet {
    clients: Vec<Client>,
    closed: bool,
}

/// The reload broadcaster of one serving session: an ordered set of open
/// connections.
///
/// Insertion order is connection order. Clones share the same set. Once
/// [`ClientManager::close_all`] has run the set stays empty for good.
#[derive(Clone, Default)]
pub struct ClientManager {
    inner: Arc<Mutex<ClientSet>>,
}

impl ClientManager {
    /// Creates a new, empty `ClientManager`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a new subscriber.
    ///
    /// The `connected` handshake is queued before the client joins the set, so
    /// it is always the first frame on the stream. Dropping the returned stream
    /// removes the client again. After `close_all` the returned stream is
    /// already finished and carries no handshake.
    pub fn subscribe(&self) -> SubscriberStream {
        let (client, receiver) = Client::new();
        let id = client.id;

        let mut set = self.inner.lock();
        if set.closed {
            drop(set);
            debug!("[HTTP] Refused subscriber {} on a closed session", id);
            return SubscriberStream::new(id, receiver, self.clone());
        }
        // The receiver is alive, so the handshake cannot fail here.
        let _ = client.send(ServerMessage::Connected);
        set.clients.push(client);
        let total = set.clients.len();
        drop(set);

        info!("[HTTP] Client connected ({} total)", total);
        SubscriberStream::new(id, receiver, self.clone())
    }

    /// Appends a client to the set and returns the new connection count.
    ///
    /// Returns `None`, dropping the client, once the set has been closed.
    pub fn add(&self, client: Client) -> Option<usize> {
        let mut set = self.inner.lock();
        if set.closed {
            return None;
        }
        set.clients.push(client);
        Some(set.clients.len())
    }

    /// Removes a client by identity. Returns `false` if it was already gone.
    pub fn remove(&self, id: &Uuid) -> bool {
        let mut set = self.inner.lock();
        let before = set.clients.len();
        set.clients.retain(|client| client.id != *id);
        let removed = set.clients.len() != before;
        if removed {
            info!("[HTTP] Client disconnected ({} remaining)", set.clients.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().clients.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Identifiers of the connected clients, in connection order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.inner.lock().clients.iter().map(|client| client.id).collect()
    }

    /// Sends a message to every connected client and returns how many got it.
    ///
    /// Works on a snapshot of the set: a failed client never stops delivery to
    /// the ones after it, and failed clients are pruned only once the pass is
    /// over. Clients that connect mid-broadcast may miss it.
    #[instrument(skip(self))]
    pub fn broadcast(&self, message: ServerMessage) -> usize {
        let snapshot: Vec<Client> = self.inner.lock().clients.clone();

        if snapshot.is_empty() {
            debug!("[HTTP] No clients connected to broadcast {}", message);
            return 0;
        }

        info!("[HTTP] Broadcasting {} to {} client(s)", message, snapshot.len());

        let mut failed = Vec::new();
        for (index, client) in snapshot.iter().enumerate() {
            if let Err(e) = client.send(message) {
                warn!("[HTTP] Error sending to client {} ({}): {}", index, client.id, e);
                failed.push(client.id);
            }
        }

        if !failed.is_empty() {
            self.inner
                .lock()
                .clients
                .retain(|client| !failed.contains(&client.id));
        }

        snapshot.len() - failed.len()
    }

    /// Tells every connected page to reload.
    pub fn broadcast_reload(&self) -> usize {
        self.broadcast(ServerMessage::Reload)
    }

    /// Ends every connection, empties the set and refuses later subscribers.
    ///
    /// Dropping the senders finishes each client's event stream.
    pub fn close_all(&self) -> usize {
        let closed = {
            let mut set = self.inner.lock();
            set.closed = true;
            std::mem::take(&mut set.clients)
        };
        if !closed.is_empty() {
            info!("[HTTP] Closed {} client connection(s)", closed.len());
        }
        closed.len()
    }
}

/// Represents errors that may occur in client operations.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Failed to send message")]
    SendFailed,
}
