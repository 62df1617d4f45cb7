//! File system watcher with write-settling debounce.
//!
//! Watches the top level of a workspace for `*.js`, `*.html` and `*.css`
//! files. A burst of events for one file (truncate, write, close, metadata)
//! turns into a single [`FileChange`] once the file's size and mtime have held
//! still for the stability threshold.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::utils::error::ChartsError;

/// Extensions of the files whose edits trigger a reload.
pub const WATCHED_EXTENSIONS: [&str; 3] = ["js", "html", "css"];

/// Timing of the write-settling debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceSettings {
    /// How long a file must stay unchanged before it is reported.
    pub stability_threshold: Duration,
    /// How often pending files are re-checked.
    pub poll_interval: Duration,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            stability_threshold: Duration::from_millis(300),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A watched file that finished changing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
}

impl FileChange {
    /// Base name of the changed file, for logging.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub modified: SystemTime,
    pub len: u64,
}

/// Outcome of re-checking a pending file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Still changing, or not quiet for long enough yet.
    Waiting,
    /// Unchanged for the whole stability threshold.
    Ready,
    /// The file no longer exists.
    Vanished,
}

/// A file that has seen events but has not settled yet.
#[derive(Debug, Clone, Copy)]
pub struct PendingWrite {
    fingerprint: Option<FileFingerprint>,
    stable_since: Instant,
}

impl PendingWrite {
    pub fn new(fingerprint: Option<FileFingerprint>, now: Instant) -> Self {
        Self {
            fingerprint,
            stable_since: now,
        }
    }

    /// Another event arrived for the file: restart the quiet period.
    pub fn touch(&mut self, fingerprint: Option<FileFingerprint>, now: Instant) {
        self.fingerprint = fingerprint;
        self.stable_since = now;
    }

    /// Compares a fresh fingerprint against the last one seen.
    pub fn observe(
        &mut self,
        current: Option<FileFingerprint>,
        now: Instant,
        threshold: Duration,
    ) -> Settle {
        let Some(current) = current else {
            return Settle::Vanished;
        };

        if self.fingerprint != Some(current) {
            self.touch(Some(current), now);
            return Settle::Waiting;
        }

        if now.duration_since(self.stable_since) >= threshold {
            Settle::Ready
        } else {
            Settle::Waiting
        }
    }
}

/// Event kinds that can leave new content behind.
///
/// New files count as well as edits: editors that save by writing a
/// temporary file and renaming it over the target, and charts added next to
/// the starter files, must both reach the browser. Removals and plain reads
/// never do.
pub fn is_content_event(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Whether a path is a top-level content file of the watched directory.
pub fn is_watched(path: &Path, root: &Path) -> bool {
    if path.parent() != Some(root) {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WATCHED_EXTENSIONS.contains(&ext))
}

async fn fingerprint(path: &Path) -> Option<FileFingerprint> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(FileFingerprint {
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        len: metadata.len(),
    })
}

/// A live watch on one directory.
///
/// Only changes made after [`WatchSession::start`] returns are reported.
/// [`WatchSession::close`] must be awaited before the directory is watched
/// again or removed.
pub struct WatchSession {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchSession {
    /// Starts watching `root`.
    ///
    /// # Returns
    ///
    /// Tuple of (WatchSession, receiver for settled changes). The receiver
    /// closes once the session is closed.
    ///
    /// # Errors
    ///
    /// Returns `ChartsError::WatchInit` if the directory cannot be resolved or
    /// the watcher backend fails to start.
    pub fn start(
        root: &Path,
        settings: DebounceSettings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FileChange>), ChartsError> {
        let watch_init = |reason: String| ChartsError::WatchInit {
            path: root.to_path_buf(),
            reason,
        };

        // Backends report canonical paths on some platforms.
        let root = root.canonicalize().map_err(|e| watch_init(e.to_string()))?;
        if !root.is_dir() {
            return Err(watch_init("not a directory".into()));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let filter_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if !is_content_event(&event.kind) {
                        return;
                    }
                    for path in event.paths {
                        if is_watched(&path, &filter_root) {
                            let _ = raw_tx.send(path);
                        }
                    }
                }
                Err(e) => warn!("[Watcher] Error: {}", e),
            }
        })
        .map_err(|e| watch_init(e.to_string()))?;

        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|e| watch_init(e.to_string()))?;

        let task = tokio::spawn(debounce_loop(raw_rx, changes_tx, settings, shutdown_rx));

        info!("[Watcher] File watching started: {}", root.display());

        Ok((
            Self {
                root,
                watcher: Some(watcher),
                shutdown: Some(shutdown_tx),
                task: Some(task),
            },
            changes_rx,
        ))
    }

    /// Stops the backend and waits for the debounce task to finish.
    pub async fn close(mut self) {
        drop(self.watcher.take());
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("[Watcher] Debounce task ended abnormally: {}", e);
            }
        }
        info!("[Watcher] File watching stopped: {}", self.root.display());
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn debounce_loop(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    changes: mpsc::UnboundedSender<FileChange>,
    settings: DebounceSettings,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut pending: HashMap<PathBuf, PendingWrite> = HashMap::new();
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = raw.recv() => {
                let Some(path) = received else { break };
                let current = fingerprint(&path).await;
                let now = Instant::now();
                pending
                    .entry(path)
                    .and_modify(|write| write.touch(current, now))
                    .or_insert_with(|| PendingWrite::new(current, now));
            }
            _ = ticker.tick(), if !pending.is_empty() => {
                let paths: Vec<PathBuf> = pending.keys().cloned().collect();
                for path in paths {
                    let current = fingerprint(&path).await;
                    let Some(write) = pending.get_mut(&path) else { continue };
                    match write.observe(current, Instant::now(), settings.stability_threshold) {
                        Settle::Waiting => {}
                        Settle::Vanished => {
                            debug!("[Watcher] {} disappeared before settling", path.display());
                            pending.remove(&path);
                        }
                        Settle::Ready => {
                            pending.remove(&path);
                            if changes.send(FileChange { path }).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print(len: u64) -> Option<FileFingerprint> {
        Some(FileFingerprint {
            modified: SystemTime::UNIX_EPOCH,
            len,
        })
    }

    #[test]
    fn only_top_level_content_files_are_watched() {
        let root = PathBuf::from("/workspace");
        assert!(is_watched(&root.join("chart.js"), &root));
        assert!(is_watched(&root.join("index.html"), &root));
        assert!(is_watched(&root.join("style.css"), &root));
        assert!(!is_watched(&root.join("notes.txt"), &root));
        assert!(!is_watched(&root.join("README.md"), &root));
        assert!(!is_watched(&root.join("nested/chart.js"), &root));
        assert!(!is_watched(Path::new("/other/chart.js"), &root));
    }

    #[test]
    fn creates_and_modifies_count_removals_do_not() {
        use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};

        assert!(is_content_event(&EventKind::Create(CreateKind::File)));
        assert!(is_content_event(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_content_event(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(!is_content_event(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_content_event(&EventKind::Access(AccessKind::Read)));
        assert!(!is_content_event(&EventKind::Any));
    }

    #[test]
    fn file_change_reports_base_name() {
        let change = FileChange {
            path: PathBuf::from("/workspace/chart.js"),
        };
        assert_eq!(change.file_name(), "chart.js");
    }

    #[test]
    fn settles_after_quiet_period() {
        let threshold = Duration::from_millis(300);
        let start = Instant::now();
        let mut write = PendingWrite::new(print(10), start);

        assert_eq!(
            write.observe(print(10), start + Duration::from_millis(100), threshold),
            Settle::Waiting
        );
        assert_eq!(
            write.observe(print(10), start + Duration::from_millis(300), threshold),
            Settle::Ready
        );
    }

    #[test]
    fn growing_file_restarts_quiet_period() {
        let threshold = Duration::from_millis(300);
        let start = Instant::now();
        let mut write = PendingWrite::new(print(10), start);

        assert_eq!(
            write.observe(print(20), start + Duration::from_millis(250), threshold),
            Settle::Waiting
        );
        assert_eq!(
            write.observe(print(20), start + Duration::from_millis(400), threshold),
            Settle::Waiting
        );
        assert_eq!(
            write.observe(print(20), start + Duration::from_millis(550), threshold),
            Settle::Ready
        );
    }

    #[test]
    fn removed_file_vanishes() {
        let start = Instant::now();
        let mut write = PendingWrite::new(print(10), start);
        assert_eq!(
            write.observe(None, start, Duration::from_millis(300)),
            Settle::Vanished
        );
    }

    #[test]
    fn missing_directory_is_a_watch_init_error() {
        let result = WatchSession::start(
            Path::new("/definitely/not/here"),
            DebounceSettings::default(),
        );
        assert!(matches!(result, Err(ChartsError::WatchInit { .. })));
    }
}
