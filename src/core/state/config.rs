use std::path::PathBuf;
use std::time::Duration;

use crate::core::downloader::DEFAULT_MIN_FREE_DISK_BYTES;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::core::paths;
use crate::core::reconcile::helper::resolve_helper_path;
use crate::core::reconcile::DEFAULT_COPY_CONCURRENCY;
use crate::core::release::DEFAULT_API_BASE;

use super::settings_store::{keys, SettingsStore};

pub const DEFAULT_OWNER: &str = "DarickBrokaw";
pub const DEFAULT_REPO: &str = "DTO_ML_RevitAddin";

/// How the staged tree reaches the installation directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStrategy {
    /// Concurrent copy inside this process; failures name each file.
    InProcess,
    /// Delegate to the file-manager helper and wait for its exit code.
    Helper { program: PathBuf },
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub owner: String,
    pub repo: String,
    pub api_base: String,
    pub install_dir: PathBuf,
    pub staging_root: PathBuf,
    /// Only these assets are downloaded when set.
    pub asset_filter: Option<Vec<String>>,
    /// Asset to extract; `{tag}` is replaced by the release tag.
    pub archive_name: Option<String>,
    pub strategy: ReconcileStrategy,
    pub copy_concurrency: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub min_free_disk_bytes: u64,
    /// Passed to the helper so it can write its own log.
    pub log_dir: Option<PathBuf>,
}

impl UpdaterConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, install_dir: PathBuf) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            install_dir,
            staging_root: paths::default_staging_root(),
            asset_filter: None,
            archive_name: None,
            strategy: ReconcileStrategy::InProcess,
            copy_concurrency: DEFAULT_COPY_CONCURRENCY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            min_free_disk_bytes: DEFAULT_MIN_FREE_DISK_BYTES,
            log_dir: None,
        }
    }

    /// Build the run configuration from the settings store, falling back
    /// to defaults for every missing key.
    pub fn from_settings(store: &SettingsStore) -> UpdaterResult<Self> {
        let install_dir = store
            .get_non_empty(keys::INSTALL_DIRECTORY)
            .map(PathBuf::from)
            .unwrap_or_else(paths::default_install_dir);

        let mut config = Self::new(
            store
                .get_non_empty(keys::REPOSITORY_OWNER)
                .unwrap_or(DEFAULT_OWNER),
            store
                .get_non_empty(keys::REPOSITORY_NAME)
                .unwrap_or(DEFAULT_REPO),
            install_dir,
        );

        if let Some(base) = store.get_non_empty(keys::REGISTRY_BASE_URL) {
            config.api_base = base.to_string();
        }
        if let Some(staging) = store.get_non_empty(keys::STAGING_DIRECTORY) {
            config.staging_root = PathBuf::from(staging);
        }
        config.asset_filter = store
            .get_non_empty(keys::ASSET_FILTER)
            .map(parse_name_list)
            .filter(|names| !names.is_empty());
        config.archive_name = store.get_non_empty(keys::ARCHIVE_NAME).map(str::to_string);

        if let Some(helper) = store.get_non_empty(keys::RECONCILE_HELPER_PATH) {
            config.strategy = ReconcileStrategy::Helper {
                program: resolve_helper_path(&config.install_dir, std::path::Path::new(helper)),
            };
        }
        if let Some(raw) = store.get_non_empty(keys::COPY_CONCURRENCY) {
            config.copy_concurrency = raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    UpdaterError::Config(format!(
                        "{} must be a positive integer, got {raw:?}",
                        keys::COPY_CONCURRENCY
                    ))
                })?;
        }

        Ok(config)
    }

    /// Archive asset name for `tag`, if one is configured.
    pub fn archive_name_for(&self, tag: &str) -> Option<String> {
        self.archive_name
            .as_ref()
            .map(|pattern| pattern.replace("{tag}", tag))
    }
}

fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn store_with(pairs: &[(&str, &str)]) -> SettingsStore {
        let mut store = SettingsStore::empty(Path::new("unused.config"));
        for (k, v) in pairs {
            store.set(k, *v);
        }
        store
    }

    #[test]
    fn empty_store_uses_defaults() {
        let config = UpdaterConfig::from_settings(&store_with(&[])).unwrap();
        assert_eq!(config.owner, DEFAULT_OWNER);
        assert_eq!(config.repo, DEFAULT_REPO);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.install_dir, paths::default_install_dir());
        assert_eq!(config.strategy, ReconcileStrategy::InProcess);
        assert_eq!(config.copy_concurrency, DEFAULT_COPY_CONCURRENCY);
        assert!(config.asset_filter.is_none());
    }

    #[test]
    fn keys_override_defaults() {
        let config = UpdaterConfig::from_settings(&store_with(&[
            (keys::REPOSITORY_OWNER, "acme"),
            (keys::REPOSITORY_NAME, "widgets"),
            (keys::INSTALL_DIRECTORY, "/opt/addins"),
            (keys::ASSET_FILTER, " widgets.zip , , extra.dll"),
            (keys::ARCHIVE_NAME, "widgets-{tag}.zip"),
            (keys::RECONCILE_HELPER_PATH, "DTOFileManager.exe"),
            (keys::COPY_CONCURRENCY, "3"),
        ]))
        .unwrap();

        assert_eq!(config.owner, "acme");
        assert_eq!(config.repo, "widgets");
        assert_eq!(
            config.asset_filter,
            Some(vec!["widgets.zip".to_string(), "extra.dll".to_string()])
        );
        assert_eq!(
            config.archive_name_for("v9").as_deref(),
            Some("widgets-v9.zip")
        );
        assert_eq!(
            config.strategy,
            ReconcileStrategy::Helper {
                program: PathBuf::from("/opt/addins").join("DTOFileManager.exe")
            }
        );
        assert_eq!(config.copy_concurrency, 3);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = UpdaterConfig::from_settings(&store_with(&[(keys::COPY_CONCURRENCY, "0")]))
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Config(_)));
    }
}
