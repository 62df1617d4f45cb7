//! Workspace provisioning: turns a library id into a directory of starter files.

pub mod library;
pub mod templates;

pub use library::{supported_libraries, ChartLibrary};

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::info;

use crate::utils::error::ChartsError;

/// Creates workspaces under a root directory and remembers the latest one.
pub struct WorkspaceProvisioner {
    root: PathBuf,
    /// Base URL written into generated READMEs.
    url: String,
    current: RwLock<Option<PathBuf>>,
}

impl WorkspaceProvisioner {
    pub fn new(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
            current: RwLock::new(None),
        }
    }

    /// Libraries a workspace can be created for.
    pub fn list_supported(&self) -> &'static [ChartLibrary] {
        supported_libraries()
    }

    /// Writes `index.html`, `chart.js` and `README.md` into a fresh
    /// `<root>/<id>-<millis>` directory and returns its absolute path.
    ///
    /// # Errors
    ///
    /// Returns `ChartsError::UnsupportedLibrary` for an unknown id and
    /// `ChartsError::WorkspaceError` if the files cannot be written.
    pub async fn provision(&self, library_id: &str) -> Result<PathBuf, ChartsError> {
        let library = ChartLibrary::find(library_id).ok_or_else(|| {
            ChartsError::UnsupportedLibrary {
                requested: library_id.to_string(),
                supported: ChartLibrary::ids(),
            }
        })?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let dir = self.root.join(format!("{}-{}", library.id, millis));

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| workspace_error("create", &dir, e))?;
        let dir = tokio::fs::canonicalize(&dir)
            .await
            .map_err(|e| workspace_error("resolve", &dir, e))?;

        let files = [
            ("index.html", templates::index_html(library)),
            ("chart.js", templates::chart_js(library)),
            ("README.md", templates::readme(library, &dir, &self.url)),
        ];
        for (name, content) in files {
            let path = dir.join(name);
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| workspace_error("write", &path, e))?;
        }

        info!("Workspace for {} created at {}", library.name, dir.display());
        *self.current.write() = Some(dir.clone());
        Ok(dir)
    }

    /// Path of the most recently provisioned workspace.
    pub fn current_workspace(&self) -> Option<PathBuf> {
        self.current.read().clone()
    }
}

fn workspace_error(action: &str, path: &Path, err: std::io::Error) -> ChartsError {
    ChartsError::WorkspaceError(format!("failed to {} {}: {}", action, path.display(), err))
}
