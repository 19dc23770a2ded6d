//! `rkzfs`: ZFS flexvolume driver executable.
//!
//! Invoked by the kubelet once per volume lifecycle event:
//!
//! ```text
//! rkzfs [--parent <dataset>] <command> [args...]
//! ```
//!
//! Prints one JSON result record and exits with its status code.  Nothing
//! else is written to stdout or stderr, including logging setup failures.

mod config;
mod logging;

use std::io;

use clap::Parser;
use clap::error::ErrorKind;
use libzfsflex::{Driver, DriverConfig, FlexError, Response, SystemHost, ZfsCli};

use crate::config::{DriverArgs, LogConfig};

#[derive(Parser, Debug)]
#[command(name = "rkzfs", version, about = "ZFS flexvolume driver for RK8s")]
struct Cli {
    #[command(flatten)]
    driver: DriverArgs,

    /// Driver command: init, attach, waitforattach, isattached, detach,
    /// mountdevice, mount, unmountdevice, unmount, getvolumename
    command: Option<String>,

    /// Command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn run(cli: Cli) -> Response {
    // Setup failures have no output channel; see the `logging` module doc.
    let _ = logging::init(&LogConfig::from_env());

    let config = DriverConfig::from(cli.driver);
    let backend = ZfsCli::new(&config.zfs_bin);
    let host = SystemHost::new(&config.mount_bin, &config.umount_bin);
    Driver::new(&config, &backend, &host).run(cli.command.as_deref(), &cli.args)
}

fn main() {
    let response = match Cli::try_parse() {
        Ok(cli) => run(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return;
        }
        Err(e) => {
            let rendered = e.to_string();
            let first = rendered.lines().next().unwrap_or_default();
            Response::failed(&FlexError::Usage(
                first.trim_start_matches("error: ").to_owned(),
            ))
        }
    };

    let _ = response.write_to(&mut io::stdout().lock(), &mut io::stderr().lock());
    std::process::exit(response.exit_code);
}
