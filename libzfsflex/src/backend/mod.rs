//! Dataset backends.
//!
//! The reconciler talks to the storage pool only through [`DatasetBackend`].
//! A probe reports "does not exist" as the typed [`Probe::NotFound`] value;
//! every other failure is an error.

pub mod zfs;

use crate::error::FlexError;
use crate::types::{CreateOptions, DatasetInfo};

pub use zfs::ZfsCli;

/// Outcome of probing a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The dataset exists.
    Found(DatasetInfo),
    /// The dataset does not exist.
    NotFound,
}

/// Narrow interface onto the storage pool.
pub trait DatasetBackend {
    /// Filesystem type the backend's real mounts carry in the mount table.
    fn fs_type(&self) -> &str;

    /// Look up a dataset by full name.
    fn probe(&self, name: &str) -> Result<Probe, FlexError>;

    /// Create a filesystem dataset with the given options.
    fn create(&self, name: &str, options: &CreateOptions) -> Result<(), FlexError>;

    /// Mount a dataset at its native mountpoint.
    fn mount(&self, name: &str) -> Result<(), FlexError>;
}
