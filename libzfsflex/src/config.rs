//! Driver configuration.
//!
//! A [`DriverConfig`] is built once at process start and passed by reference
//! to every component that needs it.  Nothing reads configuration from
//! ambient or global state.

use std::path::PathBuf;

/// Default parent dataset under which volumes are created.
pub const DEFAULT_PARENT: &str = "rpool/k8s/volumes";
/// Default live mount table.
pub const DEFAULT_MOUNT_TABLE: &str = "/proc/mounts";

/// Explicit configuration for one driver invocation.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Parent dataset namespace, e.g. `rpool/k8s/volumes`.
    pub parent: String,
    /// Path of the mount table to read.
    pub mount_table: PathBuf,
    /// `zfs` executable.
    pub zfs_bin: PathBuf,
    /// `mount` executable used for bind mounts.
    pub mount_bin: PathBuf,
    /// `umount` executable.
    pub umount_bin: PathBuf,
    /// Overrides the OS hostname in generated volume names.
    pub node_name: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            parent: DEFAULT_PARENT.to_owned(),
            mount_table: PathBuf::from(DEFAULT_MOUNT_TABLE),
            zfs_bin: PathBuf::from("zfs"),
            mount_bin: PathBuf::from("mount"),
            umount_bin: PathBuf::from("umount"),
            node_name: None,
        }
    }
}

impl DriverConfig {
    /// Full dataset name for an identifier under the parent namespace.
    ///
    /// The identifier must already be validated by the request normalizer.
    pub fn dataset_path(&self, dataset: &str) -> String {
        let parent = self.parent.trim_end_matches('/');
        if parent.is_empty() {
            dataset.to_owned()
        } else {
            format!("{parent}/{dataset}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_path_joins_parent() {
        let cfg = DriverConfig::default();
        assert_eq!(cfg.dataset_path("pvc-1"), "rpool/k8s/volumes/pvc-1");
    }

    #[test]
    fn dataset_path_tolerates_trailing_slash() {
        let cfg = DriverConfig {
            parent: "tank/vols/".into(),
            ..Default::default()
        };
        assert_eq!(cfg.dataset_path("a/b"), "tank/vols/a/b");
    }
}
