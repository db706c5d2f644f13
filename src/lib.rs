pub mod core;
pub mod host;
pub mod logging;

pub use crate::core::error::{ErrorKind, PipelineError, UpdaterError, UpdaterResult};
pub use crate::core::state::{SettingsStore, UpdaterConfig};
pub use crate::core::update::{UpdateObserver, UpdateOutcome, UpdatePipeline, UpdateStage};
pub use host::{on_shutdown, on_shutdown_with_observer, on_startup, HostContext};
