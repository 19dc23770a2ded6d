//! RKZFS driver and logging configuration.
//!
//! Driver settings come from global flags, each with an environment variable
//! fallback, and are turned into an explicit [`DriverConfig`].
//!
//! Logging is opt-in because stdout/stderr belong to the result record:
//! - `RKZFS_LOG`: an `EnvFilter` directive (e.g. `debug`, `libzfsflex=trace`).
//!   Unset disables logging entirely.
//! - `RKZFS_LOG_FILE`: fallback log file when journald is not reachable.
//!   Defaults to `/var/log/rkzfs.log`.

use std::path::PathBuf;

use clap::Args;
use libzfsflex::DriverConfig;
use libzfsflex::config::{DEFAULT_MOUNT_TABLE, DEFAULT_PARENT};

const DEFAULT_LOG_FILE: &str = "/var/log/rkzfs.log";

/// Global driver flags.
#[derive(Args, Debug, Clone)]
pub struct DriverArgs {
    /// Parent dataset for volumes
    #[arg(long, env = "RKZFS_PARENT", default_value = DEFAULT_PARENT)]
    pub parent: String,

    /// Mount table to consult
    #[arg(long, env = "RKZFS_MOUNT_TABLE", default_value = DEFAULT_MOUNT_TABLE)]
    pub mount_table: PathBuf,

    /// zfs executable
    #[arg(long, env = "RKZFS_ZFS_BIN", default_value = "zfs")]
    pub zfs_bin: PathBuf,

    /// mount executable used for bind mounts
    #[arg(long, env = "RKZFS_MOUNT_BIN", default_value = "mount")]
    pub mount_bin: PathBuf,

    /// umount executable
    #[arg(long, env = "RKZFS_UMOUNT_BIN", default_value = "umount")]
    pub umount_bin: PathBuf,

    /// Node name used in volume names instead of the hostname
    #[arg(long, env = "RKZFS_NODE_NAME")]
    pub node_name: Option<String>,
}

impl From<DriverArgs> for DriverConfig {
    fn from(args: DriverArgs) -> Self {
        DriverConfig {
            parent: args.parent,
            mount_table: args.mount_table,
            zfs_bin: args.zfs_bin,
            mount_bin: args.mount_bin,
            umount_bin: args.umount_bin,
            node_name: args.node_name,
        }
    }
}

/// Diagnostic logging settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive; `None` disables logging.
    pub filter: Option<String>,
    /// File used when journald is unavailable.
    pub file: PathBuf,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            filter: std::env::var("RKZFS_LOG").ok().filter(|v| !v.is_empty()),
            file: std::env::var("RKZFS_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}
