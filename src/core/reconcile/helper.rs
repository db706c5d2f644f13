// ─── Reconciliation Helper Boundary ───
// The file-manager helper runs reconciliation in its own process. Its CLI is
// positional: `<source_dir> <archive_path> <destination_dir> <operation> [log_dir]`.
// Exit code 0 means success; the reason for a failure stays in the helper's log.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{info, warn};

use crate::core::error::{UpdaterError, UpdaterResult};

pub const HELPER_EXIT_OK: i32 = 0;
pub const HELPER_EXIT_FAILED: i32 = 1;
pub const HELPER_EXIT_USAGE: i32 = 2;

/// What the helper should do with its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HelperOperation {
    /// Extract the archive into the source dir, flatten it, then reconcile.
    #[value(name = "ExtractAndMove")]
    ExtractAndMove,
    /// Reconcile an already flattened source dir.
    #[value(name = "CopyAndDelete")]
    CopyAndDelete,
}

impl std::fmt::Display for HelperOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HelperOperation::ExtractAndMove => write!(f, "ExtractAndMove"),
            HelperOperation::CopyAndDelete => write!(f, "CopyAndDelete"),
        }
    }
}

/// One helper invocation.
#[derive(Debug, Clone)]
pub struct HelperInvocation {
    pub program: PathBuf,
    pub source_dir: PathBuf,
    pub archive_path: PathBuf,
    pub destination_dir: PathBuf,
    pub operation: HelperOperation,
    pub log_dir: Option<PathBuf>,
}

impl HelperInvocation {
    pub fn args(&self) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            self.source_dir.clone().into(),
            self.archive_path.clone().into(),
            self.destination_dir.clone().into(),
            self.operation.to_string().into(),
        ];
        if let Some(log_dir) = &self.log_dir {
            args.push(log_dir.clone().into());
        }
        args
    }

    /// Run the helper and block until it exits.
    pub async fn run(&self) -> UpdaterResult<()> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        configure_hidden_spawn(&mut cmd);

        info!(
            "Running helper {:?} ({}) {:?} -> {:?}",
            self.program, self.operation, self.source_dir, self.destination_dir
        );
        let status = cmd.status().await.map_err(|source| UpdaterError::Io {
            path: self.program.clone(),
            source,
        })?;

        if status.success() {
            return Ok(());
        }
        warn!("Helper {:?} failed with {:?}", self.program, status.code());
        Err(UpdaterError::HelperFailed {
            program: self.program.clone(),
            code: status.code(),
        })
    }
}

fn configure_hidden_spawn(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Resolve a relative helper path against the installation directory,
/// where the helper ships alongside the add-in.
pub fn resolve_helper_path(install_dir: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        install_dir.join(configured)
    }
}
