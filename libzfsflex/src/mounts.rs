//! Mount-table reader.
//!
//! The mount table is the only source of truth for "is X mounted".  Every
//! query re-opens and re-reads it; nothing is cached between calls.
//!
//! Format: one mount per line, whitespace-separated
//! `<device> <mountpoint> <fstype> <options> <dump> <pass>`.  Only the first
//! three fields are used.  Lines with fewer than three fields are skipped.
//! Octal escapes (`\040` for space, etc.) in the device and mountpoint fields
//! are decoded.  Lines are read as raw bytes: the kernel escapes only
//! whitespace and backslashes, so other mounts may carry non-UTF-8 paths.
//! Such bytes are replaced lossily instead of failing the whole table.

use std::fs::File;
use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FlexError;
use crate::types::MountEntry;

/// Handle on a mount table file such as `/proc/mounts`.
#[derive(Debug, Clone)]
pub struct MountTable {
    path: PathBuf,
}

impl MountTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the table and enumerate its entries lazily.
    pub fn entries(&self) -> Result<MountEntries<BufReader<File>>, FlexError> {
        let file = File::open(&self.path).map_err(|e| {
            FlexError::io(
                format!("unable to get mounts from {}", self.path.display()),
                e,
            )
        })?;
        Ok(MountEntries::new(BufReader::new(file)))
    }

    /// Find the entry mounting `device` at `mountpoint`, if any.
    pub fn find(&self, device: &str, mountpoint: &Path) -> Result<Option<MountEntry>, FlexError> {
        for entry in self.entries()? {
            let entry = entry?;
            if entry.matches(device, mountpoint) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Whether `device` is mounted at `mountpoint` with filesystem type
    /// `expected_fs`.
    ///
    /// A matching entry with any other filesystem type is a conflict.
    pub fn is_mounted(
        &self,
        device: &str,
        mountpoint: &Path,
        expected_fs: &str,
    ) -> Result<bool, FlexError> {
        match self.find(device, mountpoint)? {
            Some(entry) if entry.fs_type != expected_fs => Err(FlexError::conflict(format!(
                "unexpected filesystem: {}",
                entry.fs_type
            ))),
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    /// Whether anything at all is mounted at `mountpoint`.
    ///
    /// Device and type are ignored: bind mounts present a synthetic device.
    pub fn has_mountpoint(&self, mountpoint: &Path) -> Result<bool, FlexError> {
        for entry in self.entries()? {
            if entry?.mountpoint == mountpoint {
                return Ok(true);
            }
        }
        debug!(mountpoint = %mountpoint.display(), "mountpoint not in mount table");
        Ok(false)
    }
}

/// Lazy iterator over the entries of a mount table.
pub struct MountEntries<R> {
    lines: Split<R>,
}

impl<R: BufRead> MountEntries<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
        }
    }
}

impl<R: BufRead> Iterator for MountEntries<R> {
    type Item = Result<MountEntry, FlexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(FlexError::io("unable to read mounts", e))),
            };
            if let Some(entry) = parse_line(&line) {
                return Some(Ok(entry));
            }
        }
    }
}

/// Parse one mount-table line.  Returns `None` for short lines.
pub fn parse_line(line: &[u8]) -> Option<MountEntry> {
    let mut fields = line
        .split(u8::is_ascii_whitespace)
        .filter(|field| !field.is_empty());
    let device = fields.next()?;
    let mountpoint = fields.next()?;
    let fs_type = fields.next()?;
    Some(MountEntry {
        device: decode_escapes(device),
        mountpoint: PathBuf::from(decode_escapes(mountpoint)),
        fs_type: String::from_utf8_lossy(fs_type).into_owned(),
    })
}

/// Decode the three-digit octal escapes the kernel uses for whitespace and
/// backslashes in mount-table fields.
fn decode_escapes(bytes: &[u8]) -> String {
    if !bytes.contains(&b'\\') {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = bytes[i + 1..=i + 3]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
