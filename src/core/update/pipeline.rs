// ─── Update Pipeline ───
// CheckingVersion → Downloading → Extracting → Reconciling → Triggering → Done.
// The installed-version marker moves only after reconciliation fully succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::core::archive::{extract_and_flatten, is_zip_file};
use crate::core::downloader::Downloader;
use crate::core::error::{PipelineError, UpdaterError, UpdaterResult};
use crate::core::http::build_http_client;
use crate::core::paths::{remove_dir_if_exists, working_dir_for};
use crate::core::reconcile::{
    run_post_install_hook_if_present, HelperInvocation, HelperOperation, Reconciler,
};
use crate::core::release::{GitHubReleaseResolver, Release, ReleaseSource};
use crate::core::state::{keys, ReconcileStrategy, SettingsStore, UpdaterConfig};

use super::stage::{UpdateObserver, UpdateOutcome, UpdateStage};

/// One installation's self-update pipeline.
pub struct UpdatePipeline {
    config: UpdaterConfig,
    settings: SettingsStore,
    source: Arc<dyn ReleaseSource>,
    downloader: Downloader,
    reconciler: Reconciler,
    observer: Option<Arc<dyn UpdateObserver>>,
    stage: UpdateStage,
}

impl UpdatePipeline {
    pub fn new(config: UpdaterConfig, settings: SettingsStore) -> UpdaterResult<Self> {
        let client = build_http_client(config.connect_timeout, config.request_timeout)?;
        let source = Arc::new(GitHubReleaseResolver::new(
            client.clone(),
            config.api_base.clone(),
        ));
        let downloader = Downloader::new(client).with_min_free_bytes(config.min_free_disk_bytes);
        let reconciler = Reconciler::new().with_concurrency(config.copy_concurrency);

        Ok(Self {
            config,
            settings,
            source,
            downloader,
            reconciler,
            observer: None,
            stage: UpdateStage::Idle,
        })
    }

    pub fn with_release_source(mut self, source: Arc<dyn ReleaseSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn UpdateObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn stage(&self) -> UpdateStage {
        self.stage
    }

    /// Run the pipeline to completion.
    ///
    /// On failure the working directory is removed, the marker keeps its
    /// previous value and the stage that failed is returned with the cause.
    pub async fn run(&mut self) -> Result<UpdateOutcome, PipelineError> {
        let mut working_dir = None;
        match self.run_stages(&mut working_dir).await {
            Ok(outcome) => {
                self.enter(UpdateStage::Done);
                Ok(outcome)
            }
            Err(error) => {
                let stage = self.stage;
                if let Some(dir) = working_dir {
                    if let Err(e) = remove_dir_if_exists(&dir).await {
                        warn!("Could not remove working directory {:?}: {}", dir, e);
                    }
                }
                warn!("Update failed while {}: {}", stage, error);
                if let Some(observer) = &self.observer {
                    observer.on_failed(stage, &error);
                }
                Err(PipelineError::new(stage, error))
            }
        }
    }

    async fn run_stages(
        &mut self,
        working_dir: &mut Option<PathBuf>,
    ) -> UpdaterResult<UpdateOutcome> {
        // ── Checking version ────────────────────────────
        self.enter(UpdateStage::CheckingVersion);
        let previous = self.settings.installed_version().map(str::to_string);
        let release = self
            .source
            .get_latest(&self.config.owner, &self.config.repo)
            .await?;
        self.record_check(&release);

        if previous.as_deref() == Some(release.tag.as_str()) {
            info!("Installed version {} is current", release.tag);
            return Ok(UpdateOutcome::UpToDate { tag: release.tag });
        }
        info!(
            "Update available: {} -> {}",
            previous.as_deref().unwrap_or("<none>"),
            release.tag
        );

        // ── Downloading ─────────────────────────────────
        self.enter(UpdateStage::Downloading);
        let work = working_dir_for(&self.config.staging_root, &self.config.repo, &release.tag);
        // Anything left here by an interrupted run is untrusted.
        remove_dir_if_exists(&work).await?;
        *working_dir = Some(work.clone());

        let downloaded = self
            .downloader
            .download_release(&release, &work, self.config.asset_filter.as_deref())
            .await?;

        // ── Extracting ──────────────────────────────────
        self.enter(UpdateStage::Extracting);
        let archive = self.select_archive(&release, &downloaded)?;
        self.record_paths(&work, &archive);
        extract_and_flatten(&archive, &work).await?;

        // ── Reconciling ─────────────────────────────────
        self.enter(UpdateStage::Reconciling);
        self.reconcile(&work, &archive).await?;
        self.commit_marker(&release.tag, previous.as_deref())?;

        // ── Triggering ──────────────────────────────────
        self.enter(UpdateStage::Triggering);
        let hook = run_post_install_hook_if_present(&self.config.install_dir);

        info!("Installed {} into {:?}", release.tag, self.config.install_dir);
        Ok(UpdateOutcome::Updated {
            previous,
            tag: release.tag,
            hook,
        })
    }

    async fn reconcile(&self, work: &Path, archive: &Path) -> UpdaterResult<()> {
        match &self.config.strategy {
            ReconcileStrategy::InProcess => {
                self.reconciler
                    .reconcile(work, &self.config.install_dir)
                    .await?;
            }
            ReconcileStrategy::Helper { program } => {
                let invocation = HelperInvocation {
                    program: program.clone(),
                    source_dir: work.to_path_buf(),
                    archive_path: archive.to_path_buf(),
                    destination_dir: self.config.install_dir.clone(),
                    operation: HelperOperation::CopyAndDelete,
                    log_dir: self.config.log_dir.clone(),
                };
                invocation.run().await?;
                // The helper deletes its source; make sure nothing is left.
                remove_dir_if_exists(work).await?;
            }
        }
        Ok(())
    }

    /// Record the new tag. The in-memory marker is rolled back if it
    /// cannot be persisted, so the store never claims an unsaved version.
    fn commit_marker(&mut self, tag: &str, previous: Option<&str>) -> UpdaterResult<()> {
        self.settings.set_installed_version(tag);
        if let Err(e) = self.settings.save() {
            self.settings.set_installed_version(previous.unwrap_or_default());
            return Err(e);
        }
        Ok(())
    }

    /// The configured archive asset, or the first downloaded zip.
    fn select_archive(&self, release: &Release, downloaded: &[PathBuf]) -> UpdaterResult<PathBuf> {
        let found = match self.config.archive_name_for(&release.tag) {
            Some(name) => downloaded
                .iter()
                .find(|p| p.file_name().map(|n| n == name.as_str()).unwrap_or(false)),
            None => downloaded.iter().find(|p| is_zip_file(p)),
        };
        found.cloned().ok_or_else(|| UpdaterError::NoArchiveAsset {
            tag: release.tag.clone(),
        })
    }

    // ── Diagnostics ─────────────────────────────────────

    fn record_check(&mut self, release: &Release) {
        self.settings
            .set(keys::LAST_CHECKED, Utc::now().to_rfc3339());
        self.settings
            .set(keys::LATEST_AVAILABLE_VERSION, release.tag.as_str());
        self.save_diagnostics();
    }

    fn record_paths(&mut self, work: &Path, archive: &Path) {
        self.settings
            .set(keys::DOWNLOAD_FOLDER_PATH, work.to_string_lossy());
        self.settings
            .set(keys::ZIP_FILE_PATH, archive.to_string_lossy());
        self.settings.set(
            keys::DESTINATION_PATH,
            self.config.install_dir.to_string_lossy(),
        );
        self.save_diagnostics();
    }

    fn save_diagnostics(&self) {
        if let Err(e) = self.settings.save() {
            warn!("Could not save update diagnostics: {}", e);
        }
    }

    fn enter(&mut self, stage: UpdateStage) {
        self.stage = stage;
        info!("Update stage: {}", stage);
        if let Some(observer) = &self.observer {
            observer.on_stage(stage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedRelease(Release);

    #[async_trait]
    impl ReleaseSource for FixedRelease {
        async fn get_latest(&self, _owner: &str, _repo: &str) -> UpdaterResult<Release> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ReleaseSource for Unreachable {
        async fn get_latest(&self, owner: &str, repo: &str) -> UpdaterResult<Release> {
            Err(UpdaterError::HttpStatus {
                url: format!("https://registry/{owner}/{repo}"),
                status: 502,
            })
        }
    }

    #[derive(Default)]
    struct Stages(Mutex<Vec<UpdateStage>>);

    impl UpdateObserver for Stages {
        fn on_stage(&self, stage: UpdateStage) {
            self.0.lock().unwrap().push(stage);
        }
    }

    fn pipeline(tmp: &Path, marker: Option<&str>) -> UpdatePipeline {
        let mut settings = SettingsStore::empty(&tmp.join("settings.config"));
        if let Some(tag) = marker {
            settings.set_installed_version(tag);
        }
        let mut config = UpdaterConfig::new("owner", "addin", tmp.join("install"));
        config.staging_root = tmp.join("staging");
        config.min_free_disk_bytes = 0;
        UpdatePipeline::new(config, settings).unwrap()
    }

    #[tokio::test]
    async fn matching_tag_goes_straight_to_done() {
        let tmp = tempfile::tempdir().unwrap();
        let stages = Arc::new(Stages::default());
        let mut p = pipeline(tmp.path(), Some("v1"))
            .with_release_source(Arc::new(FixedRelease(Release {
                tag: "v1".into(),
                assets: vec![],
            })))
            .with_observer(stages.clone());

        let outcome = p.run().await.unwrap();

        assert_eq!(outcome, UpdateOutcome::UpToDate { tag: "v1".into() });
        assert_eq!(
            *stages.0.lock().unwrap(),
            vec![UpdateStage::CheckingVersion, UpdateStage::Done]
        );
        assert!(!tmp.path().join("staging").exists());
        assert_eq!(p.settings().installed_version(), Some("v1"));
    }

    #[tokio::test]
    async fn release_without_archive_fails_extracting_and_keeps_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = pipeline(tmp.path(), Some("v1")).with_release_source(Arc::new(
            FixedRelease(Release {
                tag: "v2".into(),
                assets: vec![],
            }),
        ));

        let err = p.run().await.unwrap_err();

        assert_eq!(err.stage, UpdateStage::Extracting);
        assert!(matches!(err.error, UpdaterError::NoArchiveAsset { .. }));
        assert_eq!(p.settings().installed_version(), Some("v1"));
        assert!(!tmp.path().join("staging").join("addin-v2").exists());
        let persisted = SettingsStore::load(&tmp.path().join("settings.config")).unwrap();
        assert_eq!(persisted.get(keys::LATEST_AVAILABLE_VERSION), Some("v2"));
        assert_eq!(persisted.installed_version(), Some("v1"));
    }

    #[tokio::test]
    async fn registry_failure_is_reported_at_checking_version() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = pipeline(tmp.path(), None).with_release_source(Arc::new(Unreachable));

        let err = p.run().await.unwrap_err();

        assert_eq!(err.stage, UpdateStage::CheckingVersion);
        assert_eq!(p.stage(), UpdateStage::CheckingVersion);
        assert_eq!(p.settings().installed_version(), None);
    }

    #[test]
    fn configured_archive_name_wins_over_first_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = pipeline(tmp.path(), None);
        let release = Release {
            tag: "v3".into(),
            assets: vec![],
        };
        let downloaded = vec![
            PathBuf::from("/w/other.zip"),
            PathBuf::from("/w/addin-v3.zip"),
            PathBuf::from("/w/readme.txt"),
        ];

        assert_eq!(
            p.select_archive(&release, &downloaded).unwrap(),
            PathBuf::from("/w/other.zip")
        );

        p.config.archive_name = Some("addin-{tag}.zip".into());
        assert_eq!(
            p.select_archive(&release, &downloaded).unwrap(),
            PathBuf::from("/w/addin-v3.zip")
        );
    }
}
