//! # libzfsflex: ZFS-backed flexvolume driver for RK8s
//!
//! `libzfsflex` provisions ZFS filesystem datasets and mounts them for pods.
//! The orchestrator runs the driver once per lifecycle event (attach, wait,
//! mount, unmount, detach, naming); each run re-derives all state from the
//! storage pool and the live mount table, decides, acts, and exits.  Nothing
//! is cached or persisted between runs.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`request`] | Normalizer: positional args + JSON → typed requests. |
//! | [`size`] | Human-readable size strings (`"10Gi"`). |
//! | [`mounts`] | Lazy reader over the live mount table. |
//! | [`reconcile`] | [`Reconciler`]: decides create / mount / bind / unmount. |
//! | [`executor`] | [`Executor`]: carries out reconciler decisions. |
//! | [`backend`] | [`DatasetBackend`] trait and the `zfs` CLI adapter. |
//! | [`host`] | [`HostOps`]: mkdir, bind mount, unmount. |
//! | [`driver`] | [`Driver`]: one subcommand end to end. |
//! | [`output`] | Result record and exit code. |
//! | [`config`] | [`DriverConfig`] passed explicitly to every component. |
//! | [`error`] | [`FlexError`] covering all failure modes. |
//! | [`types`] | Data model: requests, datasets, mount entries. |

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod host;
pub mod mounts;
pub mod output;
pub mod reconcile;
pub mod request;
pub mod size;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use backend::{DatasetBackend, Probe, ZfsCli};
pub use config::DriverConfig;
pub use driver::Driver;
pub use error::FlexError;
pub use executor::Executor;
pub use host::{HostOps, SystemHost};
pub use output::{DriverStatus, Response, Status};
pub use reconcile::Reconciler;
pub use types::*;
