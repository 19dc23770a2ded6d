//! Core driver types: requests, datasets and mount-table entries.
//!
//! These are the values passed between the request normalizer, the
//! reconciler and the executor.  Nothing here is persisted; every value is
//! derived fresh on each invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Raw parameters
// ---------------------------------------------------------------------------

/// Volume parameters as they arrive in the JSON payload.
///
/// Unknown keys (the orchestrator adds its own `kubernetes.io/*` entries)
/// are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeParams {
    /// Dataset identifier, relative to the parent namespace.
    #[serde(default)]
    pub dataset: String,
    /// Human-readable quota, e.g. `"10Gi"`.
    #[serde(default)]
    pub quota: String,
    /// Human-readable reservation; empty means `"0"`.
    #[serde(default)]
    pub reservation: String,
    /// Compression mode passed through to the backend untouched.
    #[serde(default)]
    pub compression: String,
}

// ---------------------------------------------------------------------------
// Normalized requests
// ---------------------------------------------------------------------------

/// A validated request to provision (or locate) a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRequest {
    /// Dataset identifier, relative to the parent namespace.
    pub dataset: String,
    /// Quota in bytes, always > 0.
    pub quota: u64,
    /// Reservation in bytes, always <= `quota`.
    pub reservation: u64,
    /// Optional compression mode.
    pub compression: Option<String>,
}

impl VolumeRequest {
    /// Backend creation options implied by this request.
    pub fn create_options(&self) -> CreateOptions {
        CreateOptions {
            quota: self.quota,
            reservation: (self.reservation > 0).then_some(self.reservation),
            compression: self.compression.clone(),
        }
    }
}

/// Options handed to the backend when a dataset is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    /// Quota in bytes.
    pub quota: u64,
    /// Reservation in bytes; `None` when the request asked for zero.
    pub reservation: Option<u64>,
    /// Compression mode, if requested.
    pub compression: Option<String>,
}

impl CreateOptions {
    /// Dataset properties to set at creation time, keyed by property name.
    pub fn properties(&self) -> BTreeMap<&'static str, String> {
        let mut props = BTreeMap::new();
        props.insert("quota", self.quota.to_string());
        if let Some(reservation) = self.reservation {
            props.insert("reservation", reservation.to_string());
        }
        if let Some(compression) = &self.compression {
            props.insert("compression", compression.clone());
        }
        props
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Dataset type as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetKind {
    /// A mountable filesystem; the only kind the driver accepts.
    Filesystem,
    /// Anything else (`volume`, `snapshot`, `bookmark`, ...).
    Other(String),
}

impl From<&str> for DatasetKind {
    fn from(s: &str) -> Self {
        match s {
            "filesystem" => Self::Filesystem,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem => f.write_str("filesystem"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Where the backend mounts a dataset natively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mountpoint {
    /// Mounted by the backend at this path.
    Path(PathBuf),
    /// Managed through the system mount table, not by the backend.
    Legacy,
    /// Not mountable.
    None,
}

impl From<&str> for Mountpoint {
    fn from(s: &str) -> Self {
        match s {
            "legacy" => Self::Legacy,
            "none" | "-" | "" => Self::None,
            path => Self::Path(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for Mountpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Legacy => f.write_str("legacy"),
            Self::None => f.write_str("none"),
        }
    }
}

/// Observed state of an existing dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    /// Full dataset name, `<parent>/<id>`.
    pub name: String,
    /// Dataset type.
    pub kind: DatasetKind,
    /// Backend-native mountpoint.
    pub mountpoint: Mountpoint,
}

// ---------------------------------------------------------------------------
// Mount table
// ---------------------------------------------------------------------------

/// One line of the live mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount source (a dataset name for ZFS mounts).
    pub device: String,
    /// Where it is mounted.
    pub mountpoint: PathBuf,
    /// Filesystem type.
    pub fs_type: String,
}

impl MountEntry {
    /// Whether this entry mounts `device` at `mountpoint`.
    pub fn matches(&self, device: &str, mountpoint: &Path) -> bool {
        self.device == device && self.mountpoint == mountpoint
    }
}
