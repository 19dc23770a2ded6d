//! ZFS backend driven through the `zfs` command-line tool.

use std::path::PathBuf;
use std::process::{Command, Output};

use tracing::{debug, info, instrument};

use crate::backend::{DatasetBackend, Probe};
use crate::error::FlexError;
use crate::types::{CreateOptions, DatasetInfo, DatasetKind, Mountpoint};

/// Filesystem type ZFS mounts report in the mount table.
pub const ZFS_FS_TYPE: &str = "zfs";

/// Wraps the `zfs` executable.
#[derive(Debug, Clone)]
pub struct ZfsCli {
    binary: PathBuf,
}

impl ZfsCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[String]) -> Result<Output, FlexError> {
        debug!(binary = %self.binary.display(), ?args, "running zfs");
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| FlexError::backend(format!("failed to run {}: {e}", self.binary.display())))
    }
}

impl Default for ZfsCli {
    fn default() -> Self {
        Self::new("zfs")
    }
}

/// Arguments for `zfs list` returning one tab-separated row.
pub fn list_args(name: &str) -> Vec<String> {
    ["list", "-H", "-p", "-o", "name,type,mountpoint", name]
        .map(str::to_owned)
        .to_vec()
}

/// Arguments for `zfs create` with the requested properties.
pub fn create_args(name: &str, options: &CreateOptions) -> Vec<String> {
    let mut args = vec!["create".to_owned()];
    for (key, value) in options.properties() {
        args.push("-o".to_owned());
        args.push(format!("{key}={value}"));
    }
    args.push(name.to_owned());
    args
}

/// Whether `zfs` stderr says the dataset is missing.
///
/// The CLI has no distinct exit status for this; its message is the only
/// signal.  It becomes [`Probe::NotFound`] here.
pub fn is_not_found(stderr: &str) -> bool {
    stderr.contains("dataset does not exist")
}

/// Parse the single row printed by `zfs list -H -o name,type,mountpoint`.
pub fn parse_list_row(stdout: &str) -> Result<DatasetInfo, FlexError> {
    let row = stdout.trim_end_matches('\n');
    let fields: Vec<&str> = row.split('\t').collect();
    match fields.as_slice() {
        [name, kind, mountpoint] => Ok(DatasetInfo {
            name: (*name).to_owned(),
            kind: DatasetKind::from(*kind),
            mountpoint: Mountpoint::from(*mountpoint),
        }),
        _ => Err(FlexError::backend(format!(
            "unexpected output from zfs list: {row:?}"
        ))),
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_owned()
}

impl DatasetBackend for ZfsCli {
    fn fs_type(&self) -> &str {
        ZFS_FS_TYPE
    }

    #[instrument(skip(self))]
    fn probe(&self, name: &str) -> Result<Probe, FlexError> {
        let output = self.run(&list_args(name))?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if is_not_found(&stderr) {
                debug!(%name, "dataset not found");
                return Ok(Probe::NotFound);
            }
            return Err(FlexError::backend(format!(
                "failed to check for filesystem: {stderr}"
            )));
        }
        let info = parse_list_row(&String::from_utf8_lossy(&output.stdout))?;
        Ok(Probe::Found(info))
    }

    #[instrument(skip(self))]
    fn create(&self, name: &str, options: &CreateOptions) -> Result<(), FlexError> {
        let output = self.run(&create_args(name, options))?;
        if !output.status.success() {
            return Err(FlexError::backend(format!(
                "failed to create filesystem: {}",
                stderr_of(&output)
            )));
        }
        info!(%name, quota = options.quota, "filesystem created");
        Ok(())
    }

    #[instrument(skip(self))]
    fn mount(&self, name: &str) -> Result<(), FlexError> {
        let output = self.run(&["mount".to_owned(), name.to_owned()])?;
        if !output.status.success() {
            return Err(FlexError::backend(format!(
                "failed to mount dataset: {}",
                stderr_of(&output)
            )));
        }
        info!(%name, "dataset mounted");
        Ok(())
    }
}
