//! Host filesystem and mount operations.
//!
//! Bind mounts and unmounts go through the system `mount`/`umount` commands
//! so their output can be reported verbatim when they fail.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::FlexError;

/// OS-level operations the executor performs outside the dataset backend.
pub trait HostOps {
    /// Whether `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<(), FlexError>;

    /// Bind-mount `source` onto `target`.
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<(), FlexError>;

    /// Unmount whatever is mounted at `target`.
    fn unmount(&self, target: &Path) -> Result<(), FlexError>;
}

/// [`HostOps`] backed by the real filesystem and mount utilities.
#[derive(Debug, Clone)]
pub struct SystemHost {
    mount_bin: PathBuf,
    umount_bin: PathBuf,
}

impl SystemHost {
    pub fn new(mount_bin: impl Into<PathBuf>, umount_bin: impl Into<PathBuf>) -> Self {
        Self {
            mount_bin: mount_bin.into(),
            umount_bin: umount_bin.into(),
        }
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new("mount", "umount")
    }
}

/// Run `program args...`, capturing combined output on failure.
fn run_command(context: &str, program: &Path, args: &[&str]) -> Result<(), FlexError> {
    debug!(program = %program.display(), ?args, "running command");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| FlexError::io(format!("{context}: failed to run {}", program.display()), e))?;

    if output.status.success() {
        return Ok(());
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(FlexError::OsCommand {
        context: context.to_owned(),
        program: program.display().to_string(),
        args: args.join(" "),
        status: output.status.to_string(),
        output: combined.trim().to_owned(),
    })
}

fn path_str<'a>(path: &'a Path, what: &str) -> Result<&'a str, FlexError> {
    path.to_str()
        .ok_or_else(|| FlexError::validation(format!("non-UTF8 {what} path: {}", path.display())))
}

impl HostOps for SystemHost {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), FlexError> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(path)
            .map_err(|e| FlexError::io(format!("failed to create mount point {}", path.display()), e))
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<(), FlexError> {
        let src = path_str(source, "source")?;
        let dst = path_str(target, "target")?;
        run_command(
            "failed to mount dataset",
            &self.mount_bin,
            &["-o", "bind", src, dst],
        )?;
        info!(source = src, target = dst, "bind mount created");
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), FlexError> {
        let dst = path_str(target, "target")?;
        run_command("failed to unmount", &self.umount_bin, &[dst])?;
        info!(target = dst, "unmounted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_dir_all_makes_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a/b/c");
        let host = SystemHost::default();

        assert!(!host.is_dir(&target));
        host.create_dir_all(&target).unwrap();
        assert!(host.is_dir(&target));

        // Idempotent.
        host.create_dir_all(&target).unwrap();
    }

    #[test]
    fn failed_command_reports_output() {
        let host = SystemHost::new("false", "false");
        let err = host
            .unmount(Path::new("/definitely/not/mounted"))
            .unwrap_err();
        match err {
            FlexError::OsCommand {
                program, args, ..
            } => {
                assert_eq!(program, "false");
                assert_eq!(args, "/definitely/not/mounted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_io_error() {
        let host = SystemHost::new("/nonexistent/mount", "/nonexistent/umount");
        let err = host
            .bind_mount(Path::new("/a"), Path::new("/b"))
            .unwrap_err();
        assert!(matches!(err, FlexError::Io { .. }));
    }
}
