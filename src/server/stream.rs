use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::server::client::ClientManager;
use crate::server::message::ServerMessage;

/// The event stream of a single live-reload subscriber.
///
/// Yields every message queued for the client and ends once the broadcaster
/// drops the client. Dropping the stream (the HTTP connection went away) takes
/// the client out of the broadcaster's set.
#[derive(Debug)]
pub struct SubscriberStream {
    inner: UnboundedReceiverStream<ServerMessage>,
    guard: DisconnectGuard,
}

impl SubscriberStream {
    pub(crate) fn new(
        id: Uuid,
        receiver: mpsc::UnboundedReceiver<ServerMessage>,
        clients: ClientManager,
    ) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(receiver),
            guard: DisconnectGuard { id, clients },
        }
    }

    /// Identifier of the client this stream belongs to.
    pub fn id(&self) -> Uuid {
        self.guard.id
    }
}

impl Stream for SubscriberStream {
    type Item = ServerMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Delegate to the channel-backed stream
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Removes the client from the set when its stream is dropped.
struct DisconnectGuard {
    id: Uuid,
    clients: ClientManager,
}

impl std::fmt::Debug for DisconnectGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisconnectGuard").field("id", &self.id).finish()
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.clients.remove(&self.id);
    }
}
