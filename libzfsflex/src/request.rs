//! Request normalizer.
//!
//! Turns the positional arguments of one subcommand into a typed request.
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. positional arity for the subcommand,
//! 2. JSON syntax,
//! 3. dataset identifier present (and confined to the parent namespace),
//! 4. quota present, sizes parse (provisioning only),
//! 5. `quota > 0` and `quota >= reservation`.
//!
//! Normalization is pure: no backend, mount table or filesystem access.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::FlexError;
use crate::size::parse_size;
use crate::types::{VolumeParams, VolumeRequest};

/// Driver subcommands, one per orchestrator lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Attach,
    WaitForAttach,
    IsAttached,
    Detach,
    MountDevice,
    Mount,
    UnmountDevice,
    Unmount,
    GetVolumeName,
}

impl Operation {
    /// Command-line synopsis, reported on arity errors.
    pub fn usage(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Attach => "attach <json params> <node name>",
            Self::WaitForAttach => "waitforattach <mount device> <json params>",
            Self::IsAttached => "isattached <json options> <node name>",
            Self::Detach => "detach <mount device> <node name>",
            Self::MountDevice => "mountdevice <mount dir> <mount device> <json options>",
            Self::Mount => "mount <mount dir> <json options>",
            Self::UnmountDevice => "unmountdevice <mount device>",
            Self::Unmount => "unmount <mount dir>",
            Self::GetVolumeName => "getvolumename <json options>",
        }
    }

    /// Minimum number of positional arguments the subcommand consumes.
    ///
    /// `isattached` and `detach` ignore their arguments entirely.
    pub fn arity(self) -> usize {
        match self {
            Self::Init | Self::IsAttached | Self::Detach => 0,
            Self::Attach | Self::UnmountDevice | Self::Unmount | Self::GetVolumeName => 1,
            Self::WaitForAttach | Self::Mount => 2,
            Self::MountDevice => 3,
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "init" => Self::Init,
            "attach" => Self::Attach,
            "waitforattach" => Self::WaitForAttach,
            "isattached" => Self::IsAttached,
            "detach" => Self::Detach,
            "mountdevice" => Self::MountDevice,
            "mount" => Self::Mount,
            "unmountdevice" => Self::UnmountDevice,
            "unmount" => Self::Unmount,
            "getvolumename" => Self::GetVolumeName,
            other => return Err(other.to_owned()),
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.usage().split(' ').next().unwrap_or_default();
        f.write_str(name)
    }
}

/// `waitforattach` request: the device the orchestrator expects, and the
/// dataset the parameters name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitRequest {
    pub device: String,
    pub dataset: String,
}

/// `mount`/`mountdevice` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// Where the consumer wants the volume.
    pub target: PathBuf,
    pub dataset: String,
}

/// Check positional arity for `op`.
pub fn check_arity(op: Operation, args: &[String]) -> Result<(), FlexError> {
    if args.len() < op.arity() {
        return Err(FlexError::Usage(op.usage().to_owned()));
    }
    Ok(())
}

/// Parse the JSON payload.
pub fn parse_params(json: &str) -> Result<VolumeParams, FlexError> {
    serde_json::from_str(json)
        .map_err(|e| FlexError::Parse(format!("unable to unmarshal json: {e}")))
}

/// Validate a dataset identifier.
///
/// The identifier must name a dataset strictly below the parent namespace.
pub fn validate_dataset(dataset: &str) -> Result<&str, FlexError> {
    if dataset.is_empty() {
        return Err(FlexError::validation("dataset is required"));
    }
    if dataset.starts_with('/') {
        return Err(FlexError::validation(format!(
            "dataset must be relative to the parent: '{dataset}'"
        )));
    }
    if dataset.contains(['@', '#']) {
        return Err(FlexError::validation(format!(
            "dataset must not name a snapshot or bookmark: '{dataset}'"
        )));
    }
    if dataset
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(FlexError::validation(format!(
            "invalid dataset path: '{dataset}'"
        )));
    }
    Ok(dataset)
}

fn dataset_from_json(json: &str) -> Result<String, FlexError> {
    let params = parse_params(json)?;
    validate_dataset(&params.dataset)?;
    Ok(params.dataset)
}

/// Build a provisioning request from raw parameters.
pub fn volume_request(params: VolumeParams) -> Result<VolumeRequest, FlexError> {
    validate_dataset(&params.dataset)?;

    if params.quota.is_empty() {
        return Err(FlexError::validation("quota is required"));
    }
    let reservation = if params.reservation.is_empty() {
        "0"
    } else {
        params.reservation.as_str()
    };

    let quota = parse_size(&params.quota)
        .map_err(|e| FlexError::Parse(format!("unable to parse quota: {e}")))?;
    let reservation = parse_size(reservation)
        .map_err(|e| FlexError::Parse(format!("unable to parse reservation: {e}")))?;

    if quota == 0 {
        return Err(FlexError::validation("quota must be greater than 0"));
    }
    if quota < reservation {
        return Err(FlexError::validation(
            "quota must be greater than or equal to reservation",
        ));
    }

    let compression = (!params.compression.is_empty()).then_some(params.compression);
    Ok(VolumeRequest {
        dataset: params.dataset,
        quota,
        reservation,
        compression,
    })
}

/// `attach <json params> [node]`
pub fn attach(args: &[String]) -> Result<VolumeRequest, FlexError> {
    check_arity(Operation::Attach, args)?;
    volume_request(parse_params(&args[0])?)
}

/// `waitforattach <device> <json params>`
pub fn wait_for_attach(args: &[String]) -> Result<WaitRequest, FlexError> {
    check_arity(Operation::WaitForAttach, args)?;
    Ok(WaitRequest {
        device: args[0].clone(),
        dataset: dataset_from_json(&args[1])?,
    })
}

/// `mountdevice <dir> <device> <json options>`
pub fn mount_device(args: &[String]) -> Result<MountRequest, FlexError> {
    check_arity(Operation::MountDevice, args)?;
    Ok(MountRequest {
        target: PathBuf::from(&args[0]),
        dataset: dataset_from_json(&args[2])?,
    })
}

/// `mount <dir> <json options>`
pub fn mount(args: &[String]) -> Result<MountRequest, FlexError> {
    check_arity(Operation::Mount, args)?;
    Ok(MountRequest {
        target: PathBuf::from(&args[0]),
        dataset: dataset_from_json(&args[1])?,
    })
}

/// `unmount <dir>` / `unmountdevice <device mount path>`
pub fn unmount(op: Operation, args: &[String]) -> Result<PathBuf, FlexError> {
    check_arity(op, args)?;
    Ok(PathBuf::from(&args[0]))
}

/// `getvolumename <json options>`
pub fn volume_name(args: &[String]) -> Result<String, FlexError> {
    check_arity(Operation::GetVolumeName, args)?;
    dataset_from_json(&args[0])
}
