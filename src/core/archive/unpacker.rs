// ─── Archive Unpacker ───
// Expands a release archive into the working directory and flattens it so
// every deployable file sits at the top level.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::error::{UpdaterError, UpdaterResult};

/// Extensions of files that are archives themselves and never deployed.
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "7z", "rar", "tar", "gz", "tgz"];

pub fn is_archive_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

pub fn is_zip_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Expand `archive_path` into `working_dir`, then flatten:
///
/// 1. files directly inside each first-level subdirectory move up into
///    `working_dir` under their base name (same-name files overwrite),
/// 2. every first-level subdirectory is removed recursively,
/// 3. archive files left at the top level are deleted, including
///    `archive_path` itself when it lives in `working_dir`.
pub async fn extract_and_flatten(archive_path: &Path, working_dir: &Path) -> UpdaterResult<()> {
    let archive = archive_path.to_path_buf();
    let working = working_dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> UpdaterResult<()> {
        extract_zip_file(&archive, &working)?;
        flatten_first_level(&working)?;
        remove_residual_archives(&working)?;
        Ok(())
    })
    .await
    .map_err(|e| UpdaterError::Other(format!("Task join error: {e}")))?
}

// ── Extraction ──────────────────────────────────────────

/// Expand a zip archive into `dest`, preserving entry paths.
pub fn extract_zip_file(zip_path: &Path, dest: &Path) -> UpdaterResult<usize> {
    let zip_file = std::fs::File::open(zip_path).map_err(|source| UpdaterError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(zip_file).map_err(|source| corrupt(zip_path, source))?;

    std::fs::create_dir_all(dest).map_err(|source| UpdaterError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    let mut files = 0usize;
    for index in 0..archive.len() {
        let mut zipped = archive
            .by_index(index)
            .map_err(|source| corrupt(zip_path, source))?;

        let rel_path = zipped
            .enclosed_name()
            .ok_or_else(|| UpdaterError::UnsafeArchiveEntry {
                archive: zip_path.to_path_buf(),
                entry: zipped.name().to_string(),
            })?;
        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(rel_path);
        if zipped.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|source| UpdaterError::Io {
                path: out_path,
                source,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| UpdaterError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut out = std::fs::File::create(&out_path).map_err(|source| UpdaterError::Io {
            path: out_path.clone(),
            source,
        })?;
        std::io::copy(&mut zipped, &mut out).map_err(|source| {
            // Decompression and CRC failures surface as InvalidData.
            if source.kind() == std::io::ErrorKind::InvalidData {
                corrupt(zip_path, zip::result::ZipError::Io(source))
            } else {
                UpdaterError::Io {
                    path: out_path.clone(),
                    source,
                }
            }
        })?;
        files += 1;
    }

    info!("Extracted {} file(s) from {:?}", files, zip_path);
    Ok(files)
}

fn corrupt(path: &Path, source: zip::result::ZipError) -> UpdaterError {
    UpdaterError::CorruptArchive {
        path: path.to_path_buf(),
        source,
    }
}

// ── Flattening ──────────────────────────────────────────

/// Move files from first-level subdirectories up into `root` and drop the
/// subdirectories. Returns how many files were moved.
pub fn flatten_first_level(root: &Path) -> UpdaterResult<usize> {
    let subdirs = first_level_dirs(root)?;
    let mut moved = 0usize;

    for subdir in &subdirs {
        for file in files_in(subdir)? {
            let Some(name) = file.file_name() else {
                continue;
            };
            let target = root.join(name);
            if target.is_file() {
                warn!("Flatten overwrites {:?} with {:?}", target, file);
            }
            std::fs::rename(&file, &target).map_err(|source| UpdaterError::Io {
                path: file.clone(),
                source,
            })?;
            moved += 1;
        }
    }

    for subdir in &subdirs {
        std::fs::remove_dir_all(subdir).map_err(|source| UpdaterError::Io {
            path: subdir.clone(),
            source,
        })?;
    }

    debug!(
        "Flattened {} file(s) from {} folder(s) into {:?}",
        moved,
        subdirs.len(),
        root
    );
    Ok(moved)
}

/// Delete archives sitting directly in `root`.
pub fn remove_residual_archives(root: &Path) -> UpdaterResult<usize> {
    let mut removed = 0usize;
    for file in files_in(root)? {
        if is_archive_file(&file) {
            std::fs::remove_file(&file).map_err(|source| UpdaterError::Io {
                path: file.clone(),
                source,
            })?;
            debug!("Removed residual archive {:?}", file);
            removed += 1;
        }
    }
    Ok(removed)
}

/// First-level subdirectories, sorted so collisions resolve the same way
/// on every run.
fn first_level_dirs(root: &Path) -> UpdaterResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in read_dir(root)? {
        let entry = entry.map_err(|source| UpdaterError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub(crate) fn files_in(dir: &Path) -> UpdaterResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in read_dir(dir)? {
        let entry = entry.map_err(|source| UpdaterError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_dir(dir: &Path) -> UpdaterResult<std::fs::ReadDir> {
    std::fs::read_dir(dir).map_err(|source| UpdaterError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
