//! Accept loop of one serving session.
//!
//! Every connection task lives in the loop's `JoinSet`. Aborting the task
//! running [`serve`] drops the set, which aborts every connection with it, so
//! no connection of a stopped session keeps running against its state.

use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Serves `app` on `listener` until `shutdown` fires or its sender is dropped.
///
/// On shutdown the listener is closed first, then every open connection is
/// asked to finish its current request, and the call returns once all of
/// them are done.
pub(crate) async fn serve(listener: TcpListener, app: Router, mut shutdown: oneshot::Receiver<()>) {
    let mut connections = JoinSet::new();
    let (closing_tx, closing_rx) = watch::channel(false);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("[HTTP] Connection from {}", peer);
                    connections.spawn(serve_connection(stream, app.clone(), closing_rx.clone()));
                }
                Err(e) => {
                    // Usually descriptor exhaustion; give connections time to drain
                    warn!("[HTTP] Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    error!("[HTTP] Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);
    let _ = closing_tx.send(true);
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            error!("[HTTP] Connection task failed: {}", e);
        }
    }
}

async fn serve_connection(stream: TcpStream, app: Router, mut closing: watch::Receiver<bool>) {
    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new());
    let connection = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(app));
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                debug!("[HTTP] Connection ended with error: {}", e);
            }
            return;
        }
        _ = closing.changed() => {}
    }

    connection.as_mut().graceful_shutdown();
    if let Err(e) = connection.await {
        debug!("[HTTP] Connection ended with error: {}", e);
    }
}
