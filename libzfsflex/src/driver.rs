//! Per-invocation pipeline.
//!
//! Every subcommand runs the same sequence: normalize the positional
//! arguments, let the [`Reconciler`] decide, let the [`Executor`] act, and
//! fold the outcome into one [`Response`].  All entry points share the same
//! reconciler, so `mount` and `mountdevice` (and `unmount`/`unmountdevice`)
//! cannot drift apart.

use tracing::{debug, info};

use crate::backend::DatasetBackend;
use crate::config::DriverConfig;
use crate::error::FlexError;
use crate::executor::{Executor, MSG_FOUND_EXISTING};
use crate::host::HostOps;
use crate::output::{DriverStatus, Response};
use crate::reconcile::Reconciler;
use crate::request::{self, Operation};

/// Cluster-unique volume name: `<host>:<parent>:<dataset>`.
pub fn volume_name(hostname: &str, parent: &str, dataset: &str) -> String {
    [hostname, parent, dataset].join(":")
}

/// Runs one driver subcommand against injected collaborators.
pub struct Driver<'a> {
    config: &'a DriverConfig,
    backend: &'a dyn DatasetBackend,
    host: &'a dyn HostOps,
}

impl<'a> Driver<'a> {
    pub fn new(
        config: &'a DriverConfig,
        backend: &'a dyn DatasetBackend,
        host: &'a dyn HostOps,
    ) -> Self {
        Self {
            config,
            backend,
            host,
        }
    }

    fn reconciler(&self) -> Reconciler<'a> {
        Reconciler::new(self.config, self.backend, self.host)
    }

    fn executor(&self) -> Executor<'a> {
        Executor::new(self.backend, self.host)
    }

    /// Run `command` with its positional `args`.
    pub fn run(&self, command: Option<&str>, args: &[String]) -> Response {
        let Some(command) = command else {
            return Response::failed(&FlexError::Usage(
                "<command> [args...]".to_owned(),
            ));
        };
        let op = match command.parse::<Operation>() {
            Ok(op) => op,
            Err(name) => {
                debug!(command = %name, "unsupported subcommand");
                return Response::ok(DriverStatus::not_supported(format!(
                    "unsupported command: {name}"
                )));
            }
        };
        debug!(%op, ?args, "dispatching");
        let response = Response::from(self.dispatch(op, args));
        if response.is_failure() {
            info!(%op, code = response.exit_code, message = ?response.record.message, "command failed");
        }
        response
    }

    fn dispatch(&self, op: Operation, args: &[String]) -> Result<DriverStatus, FlexError> {
        match op {
            Operation::Init => Ok(DriverStatus::success()),
            Operation::Attach => self.attach(args),
            Operation::WaitForAttach => self.wait_for_attach(args),
            // No per-node attach concept: datasets are addressable locally.
            Operation::IsAttached => Ok(DriverStatus::success().with_attached(true)),
            // Datasets are never destroyed.
            Operation::Detach => Ok(DriverStatus::success()),
            Operation::MountDevice => self.mount(request::mount_device(args)?),
            Operation::Mount => self.mount(request::mount(args)?),
            Operation::UnmountDevice | Operation::Unmount => self.unmount(op, args),
            Operation::GetVolumeName => self.volume_name(args),
        }
    }

    fn attach(&self, args: &[String]) -> Result<DriverStatus, FlexError> {
        let req = request::attach(args)?;
        let reconciler = self.reconciler();
        let device = reconciler.device(&req.dataset);
        let action = reconciler.resolve_attach(&req)?;
        let message = self.executor().attach(&action)?;
        Ok(DriverStatus::success()
            .with_message(message)
            .with_device(device))
    }

    fn wait_for_attach(&self, args: &[String]) -> Result<DriverStatus, FlexError> {
        let req = request::wait_for_attach(args)?;
        let info = self.reconciler().resolve_wait(&req)?;
        Ok(DriverStatus::success()
            .with_message(MSG_FOUND_EXISTING)
            .with_device(info.name))
    }

    fn mount(&self, req: request::MountRequest) -> Result<DriverStatus, FlexError> {
        let reconciler = self.reconciler();
        let device = reconciler.device(&req.dataset);
        let action = reconciler.resolve_mount(&req)?;
        let message = self.executor().mount(&action, &req.target)?;
        Ok(DriverStatus::success()
            .with_message(message)
            .with_device(device))
    }

    fn unmount(&self, op: Operation, args: &[String]) -> Result<DriverStatus, FlexError> {
        let target = request::unmount(op, args)?;
        let action = self.reconciler().resolve_unmount(&target)?;
        let message = self.executor().unmount(&action)?;
        Ok(DriverStatus::success().with_message(message))
    }

    fn volume_name(&self, args: &[String]) -> Result<DriverStatus, FlexError> {
        let dataset = request::volume_name(args)?;
        let hostname = self.hostname()?;
        Ok(DriverStatus::success().with_volume_name(volume_name(
            &hostname,
            &self.config.parent,
            &dataset,
        )))
    }

    fn hostname(&self) -> Result<String, FlexError> {
        if let Some(name) = &self.config.node_name {
            return Ok(name.clone());
        }
        let name = nix::unistd::gethostname().map_err(|e| {
            FlexError::io("unable to determine node name", std::io::Error::from(e))
        })?;
        Ok(name.to_string_lossy().into_owned())
    }
}
