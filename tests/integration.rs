use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use charts_mcp::config::ServerConfig;
use charts_mcp::server::{DebounceSettings, FileChange, PreviewServer, SessionPhase, WatchSession};
use charts_mcp::utils::ChartsError;
use charts_mcp::workspace::WorkspaceProvisioner;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Instant};

fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        debounce_ms: 150,
        poll_interval_ms: 25,
        ..ServerConfig::default()
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

async fn health(addr: SocketAddr) -> serde_json::Value {
    let response = http_get(addr, "/health").await;
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

/// An open `/events` connection read with the raw socket.
struct EventClient {
    stream: TcpStream,
    received: String,
}

impl EventClient {
    async fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
            .await
            .unwrap();
        let mut client = Self {
            stream,
            received: String::new(),
        };
        assert!(client.wait_for("data: connected\n\n", Duration::from_secs(5)).await);
        client
    }

    /// Reads until `needle` shows up or the time runs out.
    async fn wait_for(&mut self, needle: &str, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while !self.received.contains(needle) {
            let now = Instant::now();
            if now >= deadline || !self.read_some(deadline - now).await {
                return self.received.contains(needle);
            }
        }
        true
    }

    /// Collects everything that arrives during `window`.
    async fn drain_for(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        loop {
            let now = Instant::now();
            if now >= deadline || !self.read_some(deadline - now).await {
                return;
            }
        }
    }

    /// Returns `false` on timeout or end of stream.
    async fn read_some(&mut self, within: Duration) -> bool {
        let mut buf = [0u8; 1024];
        match timeout(within, self.stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => false,
            Ok(Ok(n)) => {
                self.received.push_str(&String::from_utf8_lossy(&buf[..n]));
                true
            }
        }
    }

    async fn closed_within(&mut self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        let mut buf = [0u8; 1024];
        loop {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match timeout(deadline - now, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }

    fn reloads(&self) -> usize {
        self.received.matches("data: reload\n\n").count()
    }
}

async fn wait_for_clients(server: &PreviewServer, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while server.status().clients != expected {
        assert!(Instant::now() < deadline, "expected {expected} clients");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn chartjs_workspace_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let provisioner = WorkspaceProvisioner::new(root.path(), "http://localhost:3000");
    let server = PreviewServer::new(test_config()).unwrap();

    let workspace = provisioner.provision("chartjs").await.unwrap();
    for name in ["index.html", "chart.js", "README.md"] {
        assert!(workspace.join(name).is_file());
    }

    let addr = server.start(&workspace).await.unwrap();

    let report = health(addr).await;
    assert_eq!(report["status"], "ok");
    assert_eq!(report["clients"], 0);
    assert_eq!(report["workspace"], workspace.to_str().unwrap());

    let index = http_get(addr, "/").await;
    assert!(index.contains("new EventSource('/events')"));

    let mut client = EventClient::connect(addr).await;
    wait_for_clients(&server, 1).await;
    assert!(client.received.contains("Access-Control-Allow-Origin: *")
        || client.received.contains("access-control-allow-origin: *"));

    assert_eq!(server.broadcast_reload(), 1);
    assert!(client.wait_for("data: reload\n\n", Duration::from_secs(5)).await);

    server.stop().await;
    assert!(client.closed_within(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn unknown_library_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let provisioner = WorkspaceProvisioner::new(root.path(), "http://localhost:3000");

    let err = provisioner.provision("unknown-lib").await.unwrap_err();
    match err {
        ChartsError::UnsupportedLibrary { supported, .. } => {
            assert_eq!(supported, vec!["amcharts", "chartjs"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn switching_workspaces_tears_down_the_previous_session() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let server = PreviewServer::new(test_config()).unwrap();

    let first_addr = server.start(first.path()).await.unwrap();
    let mut old_client = EventClient::connect(first_addr).await;
    wait_for_clients(&server, 1).await;

    let second_addr = server.start(second.path()).await.unwrap();

    assert!(old_client.closed_within(Duration::from_secs(5)).await);
    let status = server.status();
    assert_eq!(status.phase, SessionPhase::Listening);
    assert_eq!(status.clients, 0);
    assert_eq!(status.workspace.as_deref(), Some(second.path()));

    let report = health(second_addr).await;
    assert_eq!(report["workspace"], second.path().to_str().unwrap());

    server.stop().await;
}

#[tokio::test]
async fn request_straddling_a_switch_never_joins_the_new_session() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let server = PreviewServer::new(ServerConfig {
        shutdown_grace_ms: 200,
        ..test_config()
    })
    .unwrap();

    let first_addr = server.start(first.path()).await.unwrap();
    let mut straggler = TcpStream::connect(first_addr).await.unwrap();
    straggler
        .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second_addr = server.start(second.path()).await.unwrap();
    // The old connection may already be gone, so the write can fail
    let _ = straggler.write_all(b"\r\n").await;

    let mut leftover = Vec::new();
    let closed = timeout(Duration::from_secs(5), straggler.read_to_end(&mut leftover)).await;
    assert!(closed.is_ok(), "old connection stayed open");
    assert!(!String::from_utf8_lossy(&leftover).contains("data: connected"));

    assert_eq!(server.status().clients, 0);
    assert_eq!(server.broadcast_reload(), 0);

    let mut client = EventClient::connect(second_addr).await;
    wait_for_clients(&server, 1).await;
    assert_eq!(server.broadcast_reload(), 1);
    assert!(client.wait_for("data: reload\n\n", Duration::from_secs(5)).await);

    server.stop().await;
}

#[tokio::test]
async fn repeated_switches_keep_one_session() {
    let dirs: Vec<_> = (0..3).map(|_| tempfile::tempdir().unwrap()).collect();
    let server = PreviewServer::new(test_config()).unwrap();

    for dir in &dirs {
        let addr = server.start(dir.path()).await.unwrap();
        let report = health(addr).await;
        assert_eq!(report["workspace"], dir.path().to_str().unwrap());
    }
    assert_eq!(server.status().workspace.as_deref(), Some(dirs[2].path()));

    server.stop().await;
    server.stop().await;
    let status = server.status();
    assert_eq!(status.phase, SessionPhase::Stopped);
    assert_eq!(status.workspace, None);
}

#[tokio::test]
async fn occupied_port_fails_without_partial_state() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();
    let server = PreviewServer::new(ServerConfig {
        port,
        ..test_config()
    })
    .unwrap();

    let err = server.start(dir.path()).await.unwrap_err();
    assert!(matches!(err, ChartsError::PortBind { .. }));

    let status = server.status();
    assert_eq!(status.phase, SessionPhase::Stopped);
    assert!(!status.listening);
    assert_eq!(status.workspace, None);

    drop(blocker);
    server.start(dir.path()).await.unwrap();
    assert!(server.is_running());
    server.stop().await;
}

#[tokio::test]
async fn concurrent_starts_are_serialized() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let server = PreviewServer::new(test_config()).unwrap();

    let (a, b) = tokio::join!(server.start(first.path()), server.start(second.path()));
    a.unwrap();
    b.unwrap();

    let status = server.status();
    assert_eq!(status.phase, SessionPhase::Listening);
    assert!(status.workspace.is_some());

    server.stop().await;
}

#[tokio::test]
async fn burst_of_writes_yields_one_reload() {
    let dir = tempfile::tempdir().unwrap();
    let chart = dir.path().join("chart.js");
    std::fs::write(&chart, "// v0").unwrap();
    let server = PreviewServer::new(test_config()).unwrap();
    let addr = server.start(dir.path()).await.unwrap();

    let mut client = EventClient::connect(addr).await;
    wait_for_clients(&server, 1).await;

    for version in 1..=5 {
        std::fs::write(&chart, format!("// v{version}\nconsole.log({version});")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(client.wait_for("data: reload\n\n", Duration::from_secs(5)).await);
    client.drain_for(Duration::from_millis(600)).await;
    assert_eq!(client.reloads(), 1);

    server.stop().await;
}

#[tokio::test]
async fn new_chart_file_reloads_once() {
    let dir = tempfile::tempdir().unwrap();
    let server = PreviewServer::new(test_config()).unwrap();
    let addr = server.start(dir.path()).await.unwrap();

    let mut client = EventClient::connect(addr).await;
    wait_for_clients(&server, 1).await;

    std::fs::write(dir.path().join("extra.js"), "console.log('second chart');").unwrap();

    assert!(client.wait_for("data: reload\n\n", Duration::from_secs(5)).await);
    client.drain_for(Duration::from_millis(600)).await;
    assert_eq!(client.reloads(), 1);

    server.stop().await;
}

#[tokio::test]
async fn removing_a_chart_file_does_not_reload() {
    let dir = tempfile::tempdir().unwrap();
    let chart = dir.path().join("chart.js");
    std::fs::write(&chart, "// seed").unwrap();
    let server = PreviewServer::new(test_config()).unwrap();
    let addr = server.start(dir.path()).await.unwrap();

    let mut client = EventClient::connect(addr).await;
    wait_for_clients(&server, 1).await;

    std::fs::remove_file(&chart).unwrap();
    client.drain_for(Duration::from_millis(800)).await;
    assert_eq!(client.reloads(), 0);

    server.stop().await;
}

#[tokio::test]
async fn unwatched_files_do_not_reload() {
    let dir = tempfile::tempdir().unwrap();
    let server = PreviewServer::new(test_config()).unwrap();
    let addr = server.start(dir.path()).await.unwrap();

    let mut client = EventClient::connect(addr).await;
    wait_for_clients(&server, 1).await;

    std::fs::write(dir.path().join("notes.txt"), "not a chart").unwrap();
    std::fs::write(dir.path().join("README.md"), "# readme").unwrap();
    client.drain_for(Duration::from_millis(800)).await;
    assert_eq!(client.reloads(), 0);

    server.stop().await;
}

async fn expect_no_change(changes: &mut UnboundedReceiver<FileChange>, window: Duration) {
    match timeout(window, changes.recv()).await {
        Err(_) => {}
        Ok(change) => panic!("unexpected change: {change:?}"),
    }
}

fn fast_settings() -> DebounceSettings {
    DebounceSettings {
        stability_threshold: Duration::from_millis(150),
        poll_interval: Duration::from_millis(25),
    }
}

fn seed(dir: &Path) {
    std::fs::write(dir.join("index.html"), "<h1>seed</h1>").unwrap();
    std::fs::write(dir.join("chart.js"), "// seed").unwrap();
}

#[tokio::test]
async fn watcher_ignores_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let (watcher, mut changes) = WatchSession::start(dir.path(), fast_settings()).unwrap();
    expect_no_change(&mut changes, Duration::from_millis(500)).await;

    watcher.close().await;
}

#[tokio::test]
async fn watcher_reports_base_name_once() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let (watcher, mut changes) = WatchSession::start(dir.path(), fast_settings()).unwrap();

    let style = dir.path().join("style.css");
    std::fs::write(&style, "body {}").unwrap();
    std::fs::write(&style, "body { color: red; }").unwrap();

    let change = timeout(Duration::from_secs(5), changes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change.file_name(), "style.css");
    expect_no_change(&mut changes, Duration::from_millis(500)).await;

    watcher.close().await;
}

#[tokio::test]
async fn closing_the_watcher_ends_the_change_stream() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut changes) = WatchSession::start(dir.path(), fast_settings()).unwrap();

    watcher.close().await;

    let end = timeout(Duration::from_secs(5), changes.recv()).await.unwrap();
    assert!(end.is_none());
    drop(dir);
}
