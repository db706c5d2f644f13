use std::path::PathBuf;

use crate::core::error::UpdaterError;

/// Where a pipeline run currently is. Any stage after `Idle` can end the
/// run as a failure, reported as `PipelineError { stage, .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStage {
    Idle,
    CheckingVersion,
    Downloading,
    Extracting,
    Reconciling,
    Triggering,
    Done,
}

impl std::fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStage::Idle => write!(f, "idle"),
            UpdateStage::CheckingVersion => write!(f, "checking version"),
            UpdateStage::Downloading => write!(f, "downloading"),
            UpdateStage::Extracting => write!(f, "extracting"),
            UpdateStage::Reconciling => write!(f, "reconciling"),
            UpdateStage::Triggering => write!(f, "triggering"),
            UpdateStage::Done => write!(f, "done"),
        }
    }
}

/// Result of a run that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The installed tag already matches the latest release.
    UpToDate { tag: String },
    /// A new release was installed and the marker now records it.
    Updated {
        previous: Option<String>,
        tag: String,
        /// Post-install hook that was started, if any.
        hook: Option<PathBuf>,
    },
}

impl UpdateOutcome {
    pub fn tag(&self) -> &str {
        match self {
            UpdateOutcome::UpToDate { tag } | UpdateOutcome::Updated { tag, .. } => tag,
        }
    }

    pub fn was_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// Synchronous notifications for each lifecycle point of a run. The host
/// attaches whatever it wants here: a dialog, a log line, nothing.
pub trait UpdateObserver: Send + Sync {
    fn on_stage(&self, _stage: UpdateStage) {}

    fn on_failed(&self, _stage: UpdateStage, _error: &UpdaterError) {}
}
