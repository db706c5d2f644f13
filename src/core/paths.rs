use std::path::{Path, PathBuf};

use crate::core::error::{UpdaterError, UpdaterResult};

const APP_DIR_NAME: &str = "DTO_Updater";
const SETTINGS_FILE: &str = "DTO.updater.config";
const HOST_ADDINS_YEAR: &str = "2023";

/// Per-user directory holding the settings store and rolling logs.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn default_settings_path() -> PathBuf {
    default_data_dir().join(SETTINGS_FILE)
}

pub fn default_log_dir() -> PathBuf {
    default_data_dir().join("logs")
}

/// Where the host loads per-user add-ins from.
pub fn default_install_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Autodesk")
        .join("Revit")
        .join("Addins")
        .join(HOST_ADDINS_YEAR)
}

/// Parent of every per-run working directory.
pub fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join(APP_DIR_NAME)
}

/// Working directory for one run: `<staging_root>/<repo>-<tag>`.
pub fn working_dir_for(staging_root: &Path, repo: &str, tag: &str) -> PathBuf {
    let sanitized: String = tag
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    staging_root.join(format!("{repo}-{sanitized}"))
}

/// Remove a directory tree, treating "already gone" as success.
pub async fn remove_dir_if_exists(path: &Path) -> UpdaterResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UpdaterError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
