// ─── DTO File Manager ───
// Out-of-process reconciliation helper. Launched by the updater with
// positional arguments and judged only by its exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use dto_updater::core::archive::extract_and_flatten;
use dto_updater::core::error::UpdaterResult;
use dto_updater::core::reconcile::helper::{HELPER_EXIT_FAILED, HELPER_EXIT_OK};
use dto_updater::core::reconcile::{HelperOperation, ReconcileReport, Reconciler};
use dto_updater::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "dto-file-manager", version, about = "Move a staged add-in release into place")]
struct Cli {
    /// Working directory holding the staged release.
    source_dir: PathBuf,

    /// Release archive; only read by ExtractAndMove.
    archive_path: PathBuf,

    /// Live installation directory.
    destination_dir: PathBuf,

    #[arg(value_enum)]
    operation: HelperOperation,

    /// Where to write the helper's own log.
    log_dir: Option<PathBuf>,
}

async fn execute(cli: &Cli) -> UpdaterResult<ReconcileReport> {
    if cli.operation == HelperOperation::ExtractAndMove {
        extract_and_flatten(&cli.archive_path, &cli.source_dir).await?;
    }
    Reconciler::new()
        .reconcile(&cli.source_dir, &cli.destination_dir)
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_dir.as_deref());

    info!(
        "{} {:?} -> {:?}",
        cli.operation, cli.source_dir, cli.destination_dir
    );
    match execute(&cli).await {
        Ok(report) => {
            info!("Placed {} file(s)", report.copied.len());
            ExitCode::from(HELPER_EXIT_OK as u8)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(HELPER_EXIT_FAILED as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_contract() {
        let cli = Cli::try_parse_from([
            "dto-file-manager",
            "/tmp/stage",
            "/tmp/stage/v2.zip",
            "/opt/addins",
            "ExtractAndMove",
            "/var/log/dto",
        ])
        .unwrap();
        assert_eq!(cli.operation, HelperOperation::ExtractAndMove);
        assert_eq!(cli.destination_dir, PathBuf::from("/opt/addins"));
        assert_eq!(cli.log_dir, Some(PathBuf::from("/var/log/dto")));
    }

    #[test]
    fn log_dir_is_optional() {
        let cli = Cli::try_parse_from(["x", "a", "b", "c", "CopyAndDelete"]).unwrap();
        assert_eq!(cli.operation, HelperOperation::CopyAndDelete);
        assert!(cli.log_dir.is_none());
    }

    #[test]
    fn unknown_operation_is_a_usage_error() {
        let err = Cli::try_parse_from(["x", "a", "b", "c", "Shuffle"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn copy_and_delete_moves_files_and_clears_source() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("stage");
        let dest = tmp.path().join("install");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("Addin.dll"), b"new").unwrap();

        let cli = Cli {
            source_dir: source.clone(),
            archive_path: source.join("unused.zip"),
            destination_dir: dest.clone(),
            operation: HelperOperation::CopyAndDelete,
            log_dir: None,
        };
        let report = execute(&cli).await.unwrap();

        assert_eq!(report.copied, vec!["Addin.dll".to_string()]);
        assert_eq!(std::fs::read(dest.join("Addin.dll")).unwrap(), b"new");
        assert!(!source.exists());
    }
}
