// ─── Post-Install Hook ───
// Optional `DTOPostAction.*` shipped inside a release, launched once the new
// files are in place. Fire-and-forget: nobody waits on it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tracing::{info, warn};

pub const HOOK_BASE_NAME: &str = "DTOPostAction";

/// Checked in this order; first match wins.
pub const HOOK_EXTENSIONS: &[&str] = &["exe", "py", "bat"];

/// Locate the hook in `install_dir`, if the release shipped one.
pub fn find_post_install_hook(install_dir: &Path) -> Option<PathBuf> {
    HOOK_EXTENSIONS
        .iter()
        .map(|ext| install_dir.join(format!("{HOOK_BASE_NAME}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Launch the hook without a window and without waiting for it.
///
/// Returns the hook that was started. A missing hook or a failed spawn
/// yields `None`; neither is an error for the update.
pub fn run_post_install_hook_if_present(install_dir: &Path) -> Option<PathBuf> {
    let hook = find_post_install_hook(install_dir)?;
    let mut cmd = hook_command(&hook);
    cmd.current_dir(install_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    configure_hidden_spawn(&mut cmd);

    match cmd.spawn() {
        Ok(child) => {
            info!("Started post-install hook {:?} (pid {})", hook, child.id());
            // Dropping the handle leaves the process running on its own.
            drop(child);
            Some(hook)
        }
        Err(e) => {
            warn!("Could not start post-install hook {:?}: {}", hook, e);
            None
        }
    }
}

fn hook_command(hook: &Path) -> Command {
    let ext = hook
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "py" => {
            let mut cmd = Command::new(python_launcher());
            cmd.arg(hook);
            cmd
        }
        "bat" if cfg!(target_os = "windows") => {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(hook);
            cmd
        }
        "bat" => {
            let mut cmd = Command::new("sh");
            cmd.arg(hook);
            cmd
        }
        _ => Command::new(hook),
    }
}

fn python_launcher() -> &'static str {
    if cfg!(target_os = "windows") {
        "py"
    } else {
        "python3"
    }
}

fn configure_hidden_spawn(cmd: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_hook_means_no_launch() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("DTO.dll"), b"x").unwrap();
        assert_eq!(find_post_install_hook(tmp.path()), None);
        assert_eq!(run_post_install_hook_if_present(tmp.path()), None);
    }

    #[test]
    fn executable_wins_over_script_and_batch() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("DTOPostAction.bat"), b"@echo off").unwrap();
        std::fs::write(tmp.path().join("DTOPostAction.py"), b"print()").unwrap();
        assert_eq!(
            find_post_install_hook(tmp.path()),
            Some(tmp.path().join("DTOPostAction.py"))
        );

        std::fs::write(tmp.path().join("DTOPostAction.exe"), b"MZ").unwrap();
        assert_eq!(
            find_post_install_hook(tmp.path()),
            Some(tmp.path().join("DTOPostAction.exe"))
        );
    }

    #[test]
    fn directory_named_like_the_hook_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("DTOPostAction.exe")).unwrap();
        std::fs::write(tmp.path().join("DTOPostAction.bat"), b"@echo off").unwrap();
        assert_eq!(
            find_post_install_hook(tmp.path()),
            Some(tmp.path().join("DTOPostAction.bat"))
        );
    }

    #[test]
    fn python_hooks_go_through_the_launcher() {
        let cmd = hook_command(Path::new("/opt/addin/DTOPostAction.py"));
        assert_eq!(cmd.get_program(), python_launcher());
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, vec![std::ffi::OsStr::new("/opt/addin/DTOPostAction.py")]);
    }
}
