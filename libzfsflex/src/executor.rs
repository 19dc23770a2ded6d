//! Backend executor.
//!
//! Carries out a reconciler decision against the dataset backend and the
//! host.  Failures are returned as-is; nothing is retried.

use std::path::Path;

use tracing::{info, instrument};

use crate::backend::DatasetBackend;
use crate::error::FlexError;
use crate::host::HostOps;
use crate::reconcile::{AttachAction, BindSource, MountAction, UnmountAction};

pub const MSG_FOUND_EXISTING: &str = "found existing filesystem";
pub const MSG_CREATED: &str = "created filesystem";
pub const MSG_ALREADY_MOUNTED: &str = "already mounted";
pub const MSG_ALREADY_UNMOUNTED: &str = "already unmounted";

/// Applies actions decided by the [`Reconciler`](crate::reconcile::Reconciler).
pub struct Executor<'a> {
    backend: &'a dyn DatasetBackend,
    host: &'a dyn HostOps,
}

impl<'a> Executor<'a> {
    pub fn new(backend: &'a dyn DatasetBackend, host: &'a dyn HostOps) -> Self {
        Self { backend, host }
    }

    /// Returns the result message for the orchestrator.
    #[instrument(skip_all)]
    pub fn attach(&self, action: &AttachAction) -> Result<&'static str, FlexError> {
        match action {
            AttachAction::NoOp(_) => Ok(MSG_FOUND_EXISTING),
            AttachAction::Create { dataset, options } => {
                self.backend.create(dataset, options)?;
                Ok(MSG_CREATED)
            }
        }
    }

    #[instrument(skip_all)]
    pub fn mount(&self, action: &MountAction, target: &Path) -> Result<&'static str, FlexError> {
        match action {
            MountAction::AlreadyMounted => Ok(MSG_ALREADY_MOUNTED),
            MountAction::DirectMount { dataset } => {
                self.backend.mount(dataset)?;
                Ok("")
            }
            MountAction::BindMount(source) => {
                self.bind(source, target)?;
                Ok("")
            }
            MountAction::MakeDirAndBindMount(source) => {
                self.host.create_dir_all(target)?;
                self.bind(source, target)?;
                Ok("")
            }
        }
    }

    fn bind(&self, source: &BindSource, target: &Path) -> Result<(), FlexError> {
        if source.needs_global_mount {
            info!(dataset = %source.dataset, "global mount missing, mounting dataset first");
            self.backend.mount(&source.dataset)?;
        }
        self.host.bind_mount(&source.path, target)
    }

    #[instrument(skip_all)]
    pub fn unmount(&self, action: &UnmountAction) -> Result<&'static str, FlexError> {
        match action {
            UnmountAction::AlreadyUnmounted => Ok(MSG_ALREADY_UNMOUNTED),
            UnmountAction::Unmount(target) => {
                self.host.unmount(target)?;
                Ok("")
            }
        }
    }
}
