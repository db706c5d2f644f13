use std::path::{Component, Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::release::resolver::check_status;
use crate::core::release::{Asset, Release};

pub const DEFAULT_MIN_FREE_DISK_BYTES: u64 = 256 * 1024 * 1024;

/// Sequential, streaming release-asset downloader.
pub struct Downloader {
    client: Client,
    /// Free space required on the destination volume before anything is fetched.
    min_free_bytes: u64,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            min_free_bytes: DEFAULT_MIN_FREE_DISK_BYTES,
        }
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    // ── Release assets ──────────────────────────────────

    /// Download the release's assets (or only those named in `filter`)
    /// into `dest_dir`, one after another, returning the written paths in
    /// release order.
    ///
    /// A failure mid-stream leaves a truncated file behind. Callers must
    /// discard `dest_dir` rather than reuse it.
    pub async fn download_release(
        &self,
        release: &Release,
        dest_dir: &Path,
        filter: Option<&[String]>,
    ) -> UpdaterResult<Vec<PathBuf>> {
        let selected = release.select_assets(filter);
        // Names come from the registry; reject any that would land outside
        // `dest_dir` before the first request goes out.
        for asset in &selected {
            plain_file_name(&asset.name)?;
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| UpdaterError::Io {
                path: dest_dir.to_path_buf(),
                source,
            })?;

        info!(
            "Downloading {} of {} asset(s) for release {}",
            selected.len(),
            release.assets.len(),
            release.tag
        );

        if self.min_free_bytes > 0 {
            ensure_min_disk_space(dest_dir, self.min_free_bytes)?;
        }

        let mut written = Vec::with_capacity(selected.len());
        for asset in selected {
            let dest = dest_dir.join(plain_file_name(&asset.name)?);
            self.download_asset(asset, &dest).await?;
            written.push(dest);
        }
        Ok(written)
    }

    // ── Single asset ────────────────────────────────────

    /// Stream one asset to `dest` chunk by chunk, verifying the published
    /// SHA-256 when there is one.
    pub async fn download_asset(&self, asset: &Asset, dest: &Path) -> UpdaterResult<()> {
        let url = asset.download_url.as_str();
        let response = self.client.get(url).send().await?;
        check_status(url, response.status())?;

        let mut hasher = Sha256::new();
        let mut downloaded = 0_u64;

        // Write inside a block so the handle is closed before anyone
        // moves or extracts the file.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|source| UpdaterError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                hasher.update(&chunk);
                file.write_all(&chunk)
                    .await
                    .map_err(|source| UpdaterError::Io {
                        path: dest.to_path_buf(),
                        source,
                    })?;
                downloaded = downloaded.saturating_add(chunk.len() as u64);
            }

            file.flush().await.map_err(|source| UpdaterError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        }

        if let Some(expected) = asset.expected_sha256() {
            let actual = hex::encode(hasher.finalize());
            if actual != expected {
                return Err(UpdaterError::DigestMismatch {
                    asset: asset.name.clone(),
                    expected,
                    actual,
                });
            }
        }

        debug!("Downloaded {} ({} bytes) -> {:?}", url, downloaded, dest);
        Ok(())
    }
}

/// `name` as a single normal path component, or `UnsafeAssetName`.
fn plain_file_name(name: &str) -> UpdaterResult<&Path> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(UpdaterError::UnsafeAssetName {
            name: name.to_string(),
        }),
    }
}

/// Refuse to start when the volume holding `path` is nearly full.
/// Unknown volumes pass.
pub fn ensure_min_disk_space(path: &Path, minimum_bytes: u64) -> UpdaterResult<()> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut best_len = 0usize;
    let mut available = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if canonical.starts_with(mount) {
            let len = mount.as_os_str().len();
            if len >= best_len {
                best_len = len;
                available = Some(disk.available_space());
            }
        }
    }
    match available {
        Some(bytes) if bytes < minimum_bytes => Err(UpdaterError::InsufficientDiskSpace {
            path: path.to_path_buf(),
            available: bytes,
            required: minimum_bytes,
        }),
        _ => Ok(()),
    }
}
