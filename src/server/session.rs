//! The serving core: one HTTP listener plus one watcher for the active workspace.
//!
//! Sessions move through `Stopped -> Starting -> Listening -> Stopping -> Stopped`.
//! Every `start`/`stop` runs under a FIFO lock, so calls queue up instead of
//! racing on the port, and a new session is only built once the previous one
//! is completely gone. Each session gets its own broadcaster, so a connection
//! left over from an old session can never join the clients of a new one.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::server::{handler, listener, ClientManager, HealthMetrics, ServerState, WatchSession};
use crate::utils::error::ChartsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

/// Snapshot returned by [`PreviewServer::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub phase: SessionPhase,
    pub listening: bool,
    /// Bound port while listening, configured port otherwise.
    pub port: u16,
    pub url: Option<String>,
    pub clients: usize,
    pub workspace: Option<PathBuf>,
}

#[derive(Clone)]
struct SessionInfo {
    workspace: PathBuf,
    addr: SocketAddr,
    clients: ClientManager,
}

/// Everything owned by one running session.
struct ActiveSession {
    watcher: Option<WatchSession>,
    forwarder: Option<JoinHandle<()>>,
    clients: ClientManager,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

/// Serves one workspace at a time with live reload.
pub struct PreviewServer {
    config: Arc<ServerConfig>,
    metrics: HealthMetrics,
    session: Mutex<Option<ActiveSession>>,
    phase: RwLock<SessionPhase>,
    current: RwLock<Option<SessionInfo>>,
}

impl PreviewServer {
    /// # Errors
    /// Returns `ChartsError::MetricsError` if the metrics registry cannot be built.
    pub fn new(config: ServerConfig) -> Result<Self, ChartsError> {
        Ok(Self {
            config: Arc::new(config),
            metrics: HealthMetrics::new()?,
            session: Mutex::new(None),
            phase: RwLock::new(SessionPhase::Stopped),
            current: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts serving `workspace`, stopping any previous session first.
    ///
    /// Returns once the socket is listening. A watcher that fails to start is
    /// logged and the session runs without live reload.
    ///
    /// # Errors
    ///
    /// Returns `ChartsError::PortBind` if the listener cannot be bound. No part
    /// of the new session is kept in that case.
    #[instrument(skip(self, workspace), fields(workspace = %workspace.as_ref().display()))]
    pub async fn start(&self, workspace: impl AsRef<Path>) -> Result<SocketAddr, ChartsError> {
        let mut session = self.session.lock().await;

        if let Some(previous) = session.take() {
            self.teardown(previous).await;
        }

        self.set_phase(SessionPhase::Starting);
        let workspace = workspace.as_ref().to_path_buf();

        let socket = match self.bind().await {
            Ok(socket) => socket,
            Err(e) => {
                self.set_phase(SessionPhase::Stopped);
                return Err(e);
            }
        };
        let addr = match socket.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                self.set_phase(SessionPhase::Stopped);
                return Err(ChartsError::PortBind {
                    addr: self.config.socket_addr()?,
                    source,
                });
            }
        };

        let clients = ClientManager::new();
        let state = Arc::new(ServerState {
            config: self.config.clone(),
            clients: clients.clone(),
            metrics: self.metrics.clone(),
            workspace: workspace.clone(),
        });
        let app = handler::router(state);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(listener::serve(socket, app, shutdown_rx));

        info!("[HTTP] Server started on http://{}", addr);
        info!("[HTTP] Serving workspace: {}", workspace.display());

        let (watcher, forwarder) = self.spawn_watcher(&workspace, &clients);

        *session = Some(ActiveSession {
            watcher,
            forwarder,
            clients: clients.clone(),
            shutdown,
            server,
        });
        *self.current.write() = Some(SessionInfo {
            workspace,
            addr,
            clients,
        });
        self.set_phase(SessionPhase::Listening);

        Ok(addr)
    }

    /// Stops the running session, if any. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        match session.take() {
            Some(active) => self.teardown(active).await,
            None => debug!("[HTTP] Stop requested while already stopped"),
        }
    }

    /// Tells every connected page to reload, independent of file changes.
    ///
    /// Returns the number of clients the message was queued for, zero while
    /// stopped.
    pub fn broadcast_reload(&self) -> usize {
        let clients = self.current.read().as_ref().map(|info| info.clients.clone());
        match clients {
            Some(clients) => deliver_reload(&clients, &self.metrics),
            None => {
                debug!("[HTTP] Reload requested while stopped");
                0
            }
        }
    }

    pub fn status(&self) -> ServerStatus {
        let phase = *self.phase.read();
        let current = self.current.read().clone();
        let port = current
            .as_ref()
            .map(|info| info.addr.port())
            .unwrap_or(self.config.port);

        ServerStatus {
            phase,
            listening: phase == SessionPhase::Listening,
            port,
            url: current.as_ref().map(|info| format!("http://localhost:{}", info.addr.port())),
            clients: current.as_ref().map_or(0, |info| info.clients.len()),
            workspace: current.map(|info| info.workspace),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.phase.read() == SessionPhase::Listening
    }

    fn set_phase(&self, phase: SessionPhase) {
        *self.phase.write() = phase;
    }

    async fn bind(&self) -> Result<TcpListener, ChartsError> {
        let addr = self.config.socket_addr()?;
        TcpListener::bind(addr).await.map_err(|source| {
            error!("[HTTP] Server error: failed to bind {}: {}", addr, source);
            ChartsError::PortBind { addr, source }
        })
    }

    fn spawn_watcher(
        &self,
        workspace: &Path,
        clients: &ClientManager,
    ) -> (Option<WatchSession>, Option<JoinHandle<()>>) {
        match WatchSession::start(workspace, self.config.debounce_settings()) {
            Ok((watcher, mut changes)) => {
                let clients = clients.clone();
                let metrics = self.metrics.clone();
                let forwarder = tokio::spawn(async move {
                    while let Some(change) = changes.recv().await {
                        info!("[Watcher] File changed: {}", change.file_name());
                        metrics.file_changes.inc();
                        deliver_reload(&clients, &metrics);
                    }
                });
                (Some(watcher), Some(forwarder))
            }
            Err(e) => {
                warn!("[Watcher] {}; serving without live reload", e);
                (None, None)
            }
        }
    }

    /// Watcher first, then client connections, then the listening socket.
    async fn teardown(&self, active: ActiveSession) {
        self.set_phase(SessionPhase::Stopping);
        let ActiveSession {
            watcher,
            forwarder,
            clients,
            shutdown,
            mut server,
        } = active;

        if let Some(watcher) = watcher {
            watcher.close().await;
        }
        if let Some(forwarder) = forwarder {
            if let Err(e) = forwarder.await {
                warn!("[Watcher] Change forwarder ended abnormally: {}", e);
            }
        }

        // Closed before the listener: requests still in flight get a finished
        // stream instead of a subscription.
        clients.close_all();

        let _ = shutdown.send(());
        match tokio::time::timeout(self.config.shutdown_grace(), &mut server).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("[HTTP] Server task failed: {}", e),
            Err(_) => {
                warn!("[HTTP] Connections still open after grace period; aborting them");
                server.abort();
                let _ = server.await;
            }
        }
        info!("[HTTP] Server stopped");

        *self.current.write() = None;
        self.set_phase(SessionPhase::Stopped);
    }
}

fn deliver_reload(clients: &ClientManager, metrics: &HealthMetrics) -> usize {
    let delivered = clients.broadcast_reload();
    metrics.record_reload(delivered);
    delivered
}
