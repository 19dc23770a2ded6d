//! State reconciler.
//!
//! Given a normalized request, the reconciler observes the current state
//! (dataset probe, live mount table, target directory) and decides the
//! smallest action that reaches the desired state.  It never changes
//! anything itself; see [`crate::executor`] for that.
//!
//! Mount topology is two-stage: the backend owns exactly one real mount per
//! dataset, at the dataset's native mountpoint.  Every other consumer path
//! gets a bind mount of that native mountpoint.
//!
//! Same-volume concurrency is not coordinated here.  The orchestrator is
//! relied upon to have at most one lifecycle call in flight per volume.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::backend::{DatasetBackend, Probe};
use crate::config::DriverConfig;
use crate::error::FlexError;
use crate::host::HostOps;
use crate::mounts::MountTable;
use crate::request::{MountRequest, WaitRequest};
use crate::types::{CreateOptions, DatasetInfo, DatasetKind, Mountpoint, VolumeRequest};

/// Decision for `attach`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachAction {
    /// A filesystem with this name already exists.  Its properties are not
    /// compared with the request.
    NoOp(DatasetInfo),
    /// The dataset is absent and must be created.
    Create {
        dataset: String,
        options: CreateOptions,
    },
}

/// Decision for `mount`/`mountdevice`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountAction {
    /// The dataset is already mounted at the target.
    AlreadyMounted,
    /// The target is the dataset's native mountpoint; ask the backend to
    /// mount it there.
    DirectMount { dataset: String },
    /// Bind-mount the native mountpoint onto an existing target directory.
    BindMount(BindSource),
    /// Create the target directory, then bind-mount onto it.
    MakeDirAndBindMount(BindSource),
}

/// Source side of a bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindSource {
    pub dataset: String,
    /// The dataset's native mountpoint.
    pub path: PathBuf,
    /// The native mount is missing from the mount table and has to be
    /// mounted by the backend before binding.
    pub needs_global_mount: bool,
}

/// Decision for `unmount`/`unmountdevice`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmountAction {
    AlreadyUnmounted,
    Unmount(PathBuf),
}

/// Computes actions from observed state.
pub struct Reconciler<'a> {
    config: &'a DriverConfig,
    backend: &'a dyn DatasetBackend,
    host: &'a dyn HostOps,
    mounts: MountTable,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a DriverConfig,
        backend: &'a dyn DatasetBackend,
        host: &'a dyn HostOps,
    ) -> Self {
        Self {
            config,
            backend,
            host,
            mounts: MountTable::new(&config.mount_table),
        }
    }

    /// Full dataset name (the "device") for an identifier.
    pub fn device(&self, dataset: &str) -> String {
        self.config.dataset_path(dataset)
    }

    /// Probe a dataset that must already exist as a filesystem.
    fn existing_filesystem(&self, device: &str) -> Result<DatasetInfo, FlexError> {
        match self.backend.probe(device)? {
            Probe::Found(info) if info.kind == DatasetKind::Filesystem => Ok(info),
            Probe::Found(_) => Err(FlexError::conflict("existing dataset is not a filesystem")),
            Probe::NotFound => Err(FlexError::conflict(format!(
                "dataset does not exist: {device}"
            ))),
        }
    }

    #[instrument(skip(self, req), fields(dataset = %req.dataset))]
    pub fn resolve_attach(&self, req: &VolumeRequest) -> Result<AttachAction, FlexError> {
        let device = self.device(&req.dataset);
        match self.backend.probe(&device)? {
            Probe::Found(info) if info.kind == DatasetKind::Filesystem => {
                debug!(%device, "found existing filesystem");
                Ok(AttachAction::NoOp(info))
            }
            Probe::Found(info) => {
                debug!(%device, kind = %info.kind, "existing dataset has wrong type");
                Err(FlexError::conflict("existing dataset is not a filesystem"))
            }
            Probe::NotFound => Ok(AttachAction::Create {
                dataset: device,
                options: req.create_options(),
            }),
        }
    }

    /// Confirm that the device the orchestrator waits for is the one the
    /// parameters name, and that it is ready.
    #[instrument(skip(self, req), fields(device = %req.device))]
    pub fn resolve_wait(&self, req: &WaitRequest) -> Result<DatasetInfo, FlexError> {
        let device = self.device(&req.dataset);
        if device != req.device {
            return Err(FlexError::validation(format!(
                "devices do not match: {} != {device}",
                req.device
            )));
        }
        self.existing_filesystem(&device)
    }

    #[instrument(skip(self, req), fields(dataset = %req.dataset, target = %req.target.display()))]
    pub fn resolve_mount(&self, req: &MountRequest) -> Result<MountAction, FlexError> {
        let device = self.device(&req.dataset);
        let target = req.target.as_path();

        if self
            .mounts
            .is_mounted(&device, target, self.backend.fs_type())?
        {
            debug!(%device, "already mounted");
            return Ok(MountAction::AlreadyMounted);
        }

        let info = self.existing_filesystem(&device)?;
        let native = match info.mountpoint {
            Mountpoint::Path(path) => path,
            other => {
                return Err(FlexError::conflict(format!(
                    "dataset has no usable mountpoint: {device} (mountpoint={other})"
                )));
            }
        };

        if native == target {
            return Ok(MountAction::DirectMount { dataset: device });
        }

        let needs_global_mount = !self
            .mounts
            .is_mounted(&device, &native, self.backend.fs_type())?;
        let source = BindSource {
            dataset: device,
            path: native,
            needs_global_mount,
        };
        if self.host.is_dir(target) {
            Ok(MountAction::BindMount(source))
        } else {
            Ok(MountAction::MakeDirAndBindMount(source))
        }
    }

    #[instrument(skip(self))]
    pub fn resolve_unmount(&self, target: &Path) -> Result<UnmountAction, FlexError> {
        if self.mounts.has_mountpoint(target)? {
            Ok(UnmountAction::Unmount(target.to_path_buf()))
        } else {
            Ok(UnmountAction::AlreadyUnmounted)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[derive(Default)]
    struct StubBackend {
        datasets: HashMap<String, DatasetInfo>,
        probes: RefCell<Vec<String>>,
    }

    impl StubBackend {
        fn with(mut self, name: &str, kind: &str, mountpoint: &str) -> Self {
            self.datasets.insert(
                name.to_owned(),
                DatasetInfo {
                    name: name.to_owned(),
                    kind: DatasetKind::from(kind),
                    mountpoint: Mountpoint::from(mountpoint),
                },
            );
            self
        }
    }

    impl DatasetBackend for StubBackend {
        fn fs_type(&self) -> &str {
            "zfs"
        }

        fn probe(&self, name: &str) -> Result<Probe, FlexError> {
            self.probes.borrow_mut().push(name.to_owned());
            if name.ends_with("broken") {
                return Err(FlexError::backend("pool is suspended"));
            }
            Ok(self
                .datasets
                .get(name)
                .cloned()
                .map_or(Probe::NotFound, Probe::Found))
        }

        fn create(&self, _: &str, _: &CreateOptions) -> Result<(), FlexError> {
            unreachable!("reconciler never creates")
        }

        fn mount(&self, _: &str) -> Result<(), FlexError> {
            unreachable!("reconciler never mounts")
        }
    }

    struct StubHost {
        dirs: Vec<PathBuf>,
    }

    impl HostOps for StubHost {
        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.iter().any(|d| d == path)
        }

        fn create_dir_all(&self, _: &Path) -> Result<(), FlexError> {
            unreachable!()
        }

        fn bind_mount(&self, _: &Path, _: &Path) -> Result<(), FlexError> {
            unreachable!()
        }

        fn unmount(&self, _: &Path) -> Result<(), FlexError> {
            unreachable!()
        }
    }

    struct Fixture {
        _table: tempfile::NamedTempFile,
        config: DriverConfig,
        backend: StubBackend,
        host: StubHost,
    }

    impl Fixture {
        fn new(mounts: &str, backend: StubBackend) -> Self {
            let mut table = tempfile::NamedTempFile::new().unwrap();
            table.write_all(mounts.as_bytes()).unwrap();
            let config = DriverConfig {
                parent: "rpool/k8s/volumes".into(),
                mount_table: table.path().to_path_buf(),
                ..Default::default()
            };
            Self {
                _table: table,
                config,
                backend,
                host: StubHost { dirs: Vec::new() },
            }
        }

        fn reconciler(&self) -> Reconciler<'_> {
            Reconciler::new(&self.config, &self.backend, &self.host)
        }
    }

    fn volume(dataset: &str, reservation: u64) -> VolumeRequest {
        VolumeRequest {
            dataset: dataset.into(),
            quota: 1_073_741_824,
            reservation,
            compression: None,
        }
    }

    fn mount_req(dataset: &str, target: &str) -> MountRequest {
        MountRequest {
            target: target.into(),
            dataset: dataset.into(),
        }
    }

    #[test]
    fn attach_creates_missing_dataset() {
        let fx = Fixture::new("", StubBackend::default());
        let action = fx.reconciler().resolve_attach(&volume("pvc-1", 0)).unwrap();
        assert_eq!(
            action,
            AttachAction::Create {
                dataset: "rpool/k8s/volumes/pvc-1".into(),
                options: CreateOptions {
                    quota: 1_073_741_824,
                    reservation: None,
                    compression: None,
                },
            }
        );
    }

    #[test]
    fn attach_keeps_existing_filesystem_regardless_of_quota() {
        let fx = Fixture::new(
            "",
            StubBackend::default().with("rpool/k8s/volumes/pvc-1", "filesystem", "/rpool/k8s/volumes/pvc-1"),
        );
        let action = fx
            .reconciler()
            .resolve_attach(&volume("pvc-1", 512))
            .unwrap();
        assert!(matches!(action, AttachAction::NoOp(ref info) if info.name == "rpool/k8s/volumes/pvc-1"));
    }

    #[test]
    fn attach_rejects_non_filesystem() {
        let fx = Fixture::new(
            "",
            StubBackend::default().with("rpool/k8s/volumes/pvc-2", "volume", "-"),
        );
        let err = fx
            .reconciler()
            .resolve_attach(&volume("pvc-2", 0))
            .unwrap_err();
        assert!(matches!(err, FlexError::Conflict(ref m) if m == "existing dataset is not a filesystem"));
    }

    #[test]
    fn attach_propagates_probe_failure() {
        let fx = Fixture::new("", StubBackend::default());
        let err = fx
            .reconciler()
            .resolve_attach(&volume("broken", 0))
            .unwrap_err();
        assert!(matches!(err, FlexError::Backend(_)));
    }

    #[test]
    fn wait_checks_device_name() {
        let fx = Fixture::new(
            "",
            StubBackend::default().with("rpool/k8s/volumes/pvc-1", "filesystem", "/rpool/k8s/volumes/pvc-1"),
        );
        let err = fx
            .reconciler()
            .resolve_wait(&WaitRequest {
                device: "rpool/other/pvc-1".into(),
                dataset: "pvc-1".into(),
            })
            .unwrap_err();
        assert!(matches!(err, FlexError::Validation(ref m) if m.starts_with("devices do not match")));
        assert!(fx.backend.probes.borrow().is_empty());

        let info = fx
            .reconciler()
            .resolve_wait(&WaitRequest {
                device: "rpool/k8s/volumes/pvc-1".into(),
                dataset: "pvc-1".into(),
            })
            .unwrap();
        assert_eq!(info.kind, DatasetKind::Filesystem);
    }

    #[test]
    fn mount_already_mounted_skips_probe() {
        let fx = Fixture::new(
            "rpool/k8s/volumes/pvc-3 /var/lib/kubelet/pods/p/volumes/pvc-3 zfs rw 0 0\n",
            StubBackend::default(),
        );
        let action = fx
            .reconciler()
            .resolve_mount(&mount_req("pvc-3", "/var/lib/kubelet/pods/p/volumes/pvc-3"))
            .unwrap();
        assert_eq!(action, MountAction::AlreadyMounted);
        assert!(fx.backend.probes.borrow().is_empty());
    }

    #[test]
    fn mount_with_wrong_fs_type_is_conflict() {
        let fx = Fixture::new(
            "rpool/k8s/volumes/pvc-3 /mnt/pvc-3 ext4 rw 0 0\n",
            StubBackend::default(),
        );
        let err = fx
            .reconciler()
            .resolve_mount(&mount_req("pvc-3", "/mnt/pvc-3"))
            .unwrap_err();
        assert!(matches!(err, FlexError::Conflict(ref m) if m == "unexpected filesystem: ext4"));
    }

    #[test]
    fn mount_at_native_location_is_direct() {
        let fx = Fixture::new(
            "",
            StubBackend::default().with("rpool/k8s/volumes/pvc-4", "filesystem", "/rpool/k8s/volumes/pvc-4"),
        );
        let action = fx
            .reconciler()
            .resolve_mount(&mount_req("pvc-4", "/rpool/k8s/volumes/pvc-4"))
            .unwrap();
        assert_eq!(
            action,
            MountAction::DirectMount {
                dataset: "rpool/k8s/volumes/pvc-4".into()
            }
        );
    }

    #[test]
    fn mount_elsewhere_binds_native_mountpoint() {
        let mut fx = Fixture::new(
            "rpool/k8s/volumes/pvc-5 /rpool/k8s/volumes/pvc-5 zfs rw 0 0\n",
            StubBackend::default().with("rpool/k8s/volumes/pvc-5", "filesystem", "/rpool/k8s/volumes/pvc-5"),
        );
        let source = BindSource {
            dataset: "rpool/k8s/volumes/pvc-5".into(),
            path: "/rpool/k8s/volumes/pvc-5".into(),
            needs_global_mount: false,
        };

        let action = fx
            .reconciler()
            .resolve_mount(&mount_req("pvc-5", "/pods/a/pvc-5"))
            .unwrap();
        assert_eq!(action, MountAction::MakeDirAndBindMount(source.clone()));

        fx.host.dirs.push("/pods/a/pvc-5".into());
        let action = fx
            .reconciler()
            .resolve_mount(&mount_req("pvc-5", "/pods/a/pvc-5"))
            .unwrap();
        assert_eq!(action, MountAction::BindMount(source));
    }

    #[test]
    fn bind_requests_global_mount_when_native_is_unmounted() {
        let fx = Fixture::new(
            "",
            StubBackend::default().with("rpool/k8s/volumes/pvc-6", "filesystem", "/rpool/k8s/volumes/pvc-6"),
        );
        let action = fx
            .reconciler()
            .resolve_mount(&mount_req("pvc-6", "/pods/b/pvc-6"))
            .unwrap();
        assert!(matches!(
            action,
            MountAction::MakeDirAndBindMount(BindSource {
                needs_global_mount: true,
                ..
            })
        ));
    }

    #[test]
    fn mount_requires_existing_filesystem() {
        let fx = Fixture::new(
            "",
            StubBackend::default().with("rpool/k8s/volumes/legacy", "filesystem", "legacy"),
        );
        let r = fx.reconciler();
        assert!(matches!(
            r.resolve_mount(&mount_req("missing", "/pods/x")),
            Err(FlexError::Conflict(_))
        ));
        assert!(matches!(
            r.resolve_mount(&mount_req("legacy", "/pods/x")),
            Err(FlexError::Conflict(ref m)) if m.starts_with("dataset has no usable mountpoint")
        ));
        assert!(matches!(
            r.resolve_mount(&mount_req("broken", "/pods/x")),
            Err(FlexError::Backend(_))
        ));
    }

    #[test]
    fn unmount_is_permissive_about_device() {
        let fx = Fixture::new(
            "/dev/sda1 /pods/c/pvc-7 ext4 rw 0 0\n",
            StubBackend::default(),
        );
        let r = fx.reconciler();
        assert_eq!(
            r.resolve_unmount(Path::new("/pods/c/pvc-7")).unwrap(),
            UnmountAction::Unmount("/pods/c/pvc-7".into())
        );
        assert_eq!(
            r.resolve_unmount(Path::new("/pods/d/pvc-8")).unwrap(),
            UnmountAction::AlreadyUnmounted
        );
    }
}
