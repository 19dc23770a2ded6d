//! Driver error types.
//!
//! Every failure in `libzfsflex` is a [`FlexError`].  Each variant is one
//! category of the driver's error taxonomy and maps to a distinct process
//! exit code via [`FlexError::exit_code`].  Errors are terminal for the
//! invocation: nothing in the crate retries or recovers locally.

use std::fmt;

use thiserror::Error;

/// Unified error type for driver operations.
#[derive(Debug, Error)]
pub enum FlexError {
    /// Missing subcommand or wrong number of positional arguments.
    #[error("usage: {0}")]
    Usage(String),

    /// Malformed JSON payload or unparseable size string.
    #[error("{0}")]
    Parse(String),

    /// Missing or contradictory request fields.
    #[error("{0}")]
    Validation(String),

    /// An existing entity is in a state the driver must not override.
    #[error("{0}")]
    Conflict(String),

    /// The dataset backend failed for a reason other than "not found".
    #[error("{0}")]
    Backend(String),

    /// Local I/O failed (mount table, directory creation, hostname).
    #[error("{context}: {source}")]
    Io {
        /// What the driver was doing.
        context: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An external mount/unmount command exited unsuccessfully.
    #[error("{context}: {program} {args} exited with {status}: {output}")]
    OsCommand {
        /// What the driver was doing.
        context: String,
        /// Executable that was run.
        program: String,
        /// Space-joined argument list.
        args: String,
        /// Exit status description.
        status: String,
        /// Captured combined stdout/stderr, trimmed.
        output: String,
    },
}

impl FlexError {
    /// Create a [`FlexError::Backend`] from anything that implements
    /// [`fmt::Display`].
    pub fn backend<E: fmt::Display>(e: E) -> Self {
        Self::Backend(e.to_string())
    }

    /// Create a [`FlexError::Conflict`] from anything that implements
    /// [`fmt::Display`].
    pub fn conflict<E: fmt::Display>(e: E) -> Self {
        Self::Conflict(e.to_string())
    }

    /// Create a [`FlexError::Validation`] from anything that implements
    /// [`fmt::Display`].
    pub fn validation<E: fmt::Display>(e: E) -> Self {
        Self::Validation(e.to_string())
    }

    /// Wrap an [`std::io::Error`] with a short description of the operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse(_) => -1,
            Self::Usage(_) => -2,
            Self::Conflict(_) => -3,
            Self::Backend(_) => -4,
            Self::Validation(_) => -5,
            Self::Io { .. } => -6,
            Self::OsCommand { .. } => -7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let errors = [
            FlexError::Usage("x".into()),
            FlexError::Parse("x".into()),
            FlexError::Validation("x".into()),
            FlexError::Conflict("x".into()),
            FlexError::Backend("x".into()),
            FlexError::io("x", std::io::Error::other("boom")),
            FlexError::OsCommand {
                context: "x".into(),
                program: "umount".into(),
                args: "/mnt".into(),
                status: "exit status: 32".into(),
                output: String::new(),
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(FlexError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn os_command_display_includes_output() {
        let err = FlexError::OsCommand {
            context: "failed to bind mount".into(),
            program: "mount".into(),
            args: "-o bind /a /b".into(),
            status: "exit status: 32".into(),
            output: "mount: /b: special device /a does not exist.".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to bind mount: mount -o bind /a /b"));
        assert!(msg.ends_with("special device /a does not exist."));
    }

    #[test]
    fn io_display() {
        let err = FlexError::io(
            "unable to get mounts",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.to_string(), "unable to get mounts: no such file");
    }
}
