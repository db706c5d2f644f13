// ─── Host Lifecycle Entry Points ───
// Plain synchronous calls for the host's lifecycle dispatcher. The host is
// shutting down when `on_shutdown` runs, so it simply blocks until the
// pipeline is finished.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::core::error::{PipelineError, UpdaterError, UpdaterResult};
use crate::core::paths;
use crate::core::state::{SettingsStore, UpdaterConfig};
use crate::core::update::{UpdateObserver, UpdateOutcome, UpdatePipeline, UpdateStage};

/// What the host hands to every lifecycle call.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// The appSettings store holding the marker and configuration keys.
    pub settings_path: PathBuf,
    /// Directory for rolling logs; forwarded to the helper process too.
    pub log_dir: Option<PathBuf>,
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            settings_path: paths::default_settings_path(),
            log_dir: Some(paths::default_log_dir()),
        }
    }
}

impl HostContext {
    fn load(&self) -> UpdaterResult<(UpdaterConfig, SettingsStore)> {
        let store = SettingsStore::load(&self.settings_path)?;
        let mut config = UpdaterConfig::from_settings(&store)?;
        config.log_dir = self.log_dir.clone();
        Ok((config, store))
    }
}

/// Host started: validate the settings so a broken store shows up in the
/// log now rather than at shutdown.
pub fn on_startup(ctx: &HostContext) -> UpdaterResult<()> {
    let (config, store) = ctx.load()?;
    info!(
        "Add-in updater ready: {}/{} installed={} target={:?}",
        config.owner,
        config.repo,
        store.installed_version().unwrap_or("<none>"),
        config.install_dir
    );
    Ok(())
}

/// Host is shutting down: run the whole update pipeline and block until it
/// finishes.
///
/// Must not be called from inside an async runtime.
pub fn on_shutdown(ctx: &HostContext) -> Result<UpdateOutcome, PipelineError> {
    run_update(ctx, None)
}

pub fn on_shutdown_with_observer(
    ctx: &HostContext,
    observer: Arc<dyn UpdateObserver>,
) -> Result<UpdateOutcome, PipelineError> {
    run_update(ctx, Some(observer))
}

fn run_update(
    ctx: &HostContext,
    observer: Option<Arc<dyn UpdateObserver>>,
) -> Result<UpdateOutcome, PipelineError> {
    let prepare = || -> UpdaterResult<(UpdatePipeline, tokio::runtime::Runtime)> {
        let (config, store) = ctx.load()?;
        let mut pipeline = UpdatePipeline::new(config, store)?;
        if let Some(observer) = observer {
            pipeline = pipeline.with_observer(observer);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| UpdaterError::Other(format!("cannot start async runtime: {e}")))?;
        Ok((pipeline, runtime))
    };

    let (mut pipeline, runtime) = prepare().map_err(|e| {
        error!("Update could not start: {}", e);
        PipelineError::new(UpdateStage::CheckingVersion, e)
    })?;

    let result = runtime.block_on(pipeline.run());
    match &result {
        Ok(outcome) => info!("Update check finished: {:?}", outcome),
        Err(e) => error!("{}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn startup_accepts_missing_store() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = HostContext {
            settings_path: tmp.path().join("none.config"),
            log_dir: None,
        };
        on_startup(&ctx).unwrap();
    }

    #[test]
    fn broken_store_fails_before_any_network_call() {
        let tmp = tempfile::tempdir().unwrap();
        let settings_path = tmp.path().join("broken.config");
        std::fs::write(
            &settings_path,
            r#"<configuration><appSettings><add key="CopyConcurrency" value="many"/></appSettings></configuration>"#,
        )
        .unwrap();
        let ctx = HostContext {
            settings_path,
            log_dir: None,
        };

        assert!(on_startup(&ctx).is_err());
        let err = on_shutdown(&ctx).unwrap_err();
        assert_eq!(err.stage, UpdateStage::CheckingVersion);
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
