use std::path::Path;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::archive::unpacker::files_in;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::paths::remove_dir_if_exists;

pub const DEFAULT_COPY_CONCURRENCY: usize = 8;

/// What landed in the installation directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub copied: Vec<String>,
}

/// Copies a flattened working tree over the live installation directory.
pub struct Reconciler {
    /// Maximum number of files copied at once.
    concurrency: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            concurrency: DEFAULT_COPY_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Copy every top-level file of `working_dir` into `install_dir`,
    /// overwriting same-name files, then delete `working_dir`.
    ///
    /// One failing file never stops the others; all failures come back
    /// together as `PartialCopy`. Files already copied stay in place.
    pub async fn reconcile(
        &self,
        working_dir: &Path,
        install_dir: &Path,
    ) -> UpdaterResult<ReconcileReport> {
        let result = self.copy_all(working_dir, install_dir).await;

        if let Err(e) = remove_dir_if_exists(working_dir).await {
            warn!("Could not remove working directory {:?}: {}", working_dir, e);
        }

        result
    }

    async fn copy_all(
        &self,
        working_dir: &Path,
        install_dir: &Path,
    ) -> UpdaterResult<ReconcileReport> {
        tokio::fs::create_dir_all(install_dir)
            .await
            .map_err(|source| UpdaterError::Io {
                path: install_dir.to_path_buf(),
                source,
            })?;

        let sources = files_in(working_dir)?;
        info!(
            "Reconciling {} file(s) into {:?}, concurrency={}",
            sources.len(),
            install_dir,
            self.concurrency
        );

        let results: Vec<_> = stream::iter(sources)
            .map(|src| async move { copy_into(&src, install_dir).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut copied = Vec::new();
        let mut failed = Vec::new();
        for result in results {
            match result {
                Ok(name) => copied.push(name),
                Err((name, error)) => {
                    warn!("Failed to install {}: {}", name, error);
                    failed.push(name);
                }
            }
        }
        copied.sort();
        failed.sort();

        if !failed.is_empty() {
            return Err(UpdaterError::PartialCopy { failed });
        }
        Ok(ReconcileReport { copied })
    }
}

/// Land one file all-or-nothing: copy beside the destination under a
/// hidden name, then rename over it.
async fn copy_into(src: &Path, install_dir: &Path) -> Result<String, (String, UpdaterError)> {
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let dest = install_dir.join(&name);
    let staged = install_dir.join(format!(".{}.{}.partial", name, Uuid::new_v4().simple()));

    let outcome = async {
        tokio::fs::copy(src, &staged)
            .await
            .map_err(|source| UpdaterError::io(staged.clone(), source))?;
        tokio::fs::rename(&staged, &dest)
            .await
            .map_err(|source| UpdaterError::io(dest.clone(), source))
    }
    .await;

    match outcome {
        Ok(()) => {
            debug!("Installed {:?}", dest);
            Ok(name)
        }
        Err(error) => {
            let _ = tokio::fs::remove_file(&staged).await;
            Err((name, error))
        }
    }
}
