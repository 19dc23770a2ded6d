//! Result record emitted to the orchestrator.
//!
//! Exactly one JSON object is written per invocation: to stdout on success,
//! to stderr on failure.  The process exit code mirrors the outcome.

use std::io::{self, Write};

use serde::Serialize;

use crate::error::FlexError;

/// Outcome reported in the `status` field.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Status {
    Success,
    #[serde(rename = "Failed")]
    Failure,
    /// The subcommand is not implemented; the orchestrator falls back to
    /// its own default behaviour.
    #[serde(rename = "Not supported")]
    NotSupported,
}

/// The structured result record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatus {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached: Option<bool>,
}

impl DriverStatus {
    fn new(status: Status) -> Self {
        Self {
            status,
            message: None,
            device: None,
            volume_name: None,
            attached: None,
        }
    }

    pub fn success() -> Self {
        Self::new(Status::Success)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(Status::NotSupported).with_message(message)
    }

    /// Set the message; an empty message is omitted from the record.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = (!message.is_empty()).then_some(message);
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_volume_name(mut self, name: impl Into<String>) -> Self {
        self.volume_name = Some(name.into());
        self
    }

    pub fn with_attached(mut self, attached: bool) -> Self {
        self.attached = Some(attached);
        self
    }
}

/// A finished invocation: the record plus the exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub record: DriverStatus,
    pub exit_code: i32,
}

impl Response {
    pub fn ok(record: DriverStatus) -> Self {
        Self {
            record,
            exit_code: 0,
        }
    }

    pub fn failed(err: &FlexError) -> Self {
        Self {
            record: DriverStatus::new(Status::Failure).with_message(err.to_string()),
            exit_code: err.exit_code(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.record.status == Status::Failure
    }

    /// Serialize the record as a single JSON line to the stream matching the
    /// outcome.
    pub fn write_to<'a>(
        &self,
        stdout: &'a mut dyn Write,
        stderr: &'a mut dyn Write,
    ) -> io::Result<()> {
        let out = if self.is_failure() { stderr } else { stdout };
        serde_json::to_writer(&mut *out, &self.record)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

impl From<Result<DriverStatus, FlexError>> for Response {
    fn from(result: Result<DriverStatus, FlexError>) -> Self {
        match result {
            Ok(record) => Self::ok(record),
            Err(err) => Self::failed(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(resp: &Response) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        resp.write_to(&mut out, &mut err).unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn success_omits_empty_fields() {
        let (out, err) = render(&Response::ok(DriverStatus::success().with_message("")));
        assert_eq!(out, "{\"status\":\"Success\"}\n");
        assert!(err.is_empty());
    }

    #[test]
    fn field_names_are_camel_case() {
        let record = DriverStatus::success()
            .with_device("rpool/k8s/volumes/pvc-1")
            .with_volume_name("node-a:rpool/k8s/volumes:pvc-1")
            .with_attached(true);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "Success",
                "device": "rpool/k8s/volumes/pvc-1",
                "volumeName": "node-a:rpool/k8s/volumes:pvc-1",
                "attached": true,
            })
        );
    }

    #[test]
    fn failure_goes_to_stderr_with_exit_code() {
        let resp = Response::failed(&FlexError::validation("quota is required"));
        assert_eq!(resp.exit_code, -5);
        let (out, err) = render(&resp);
        assert!(out.is_empty());
        assert_eq!(err, "{\"status\":\"Failed\",\"message\":\"quota is required\"}\n");
    }

    #[test]
    fn not_supported_is_not_a_failure() {
        let resp = Response::ok(DriverStatus::not_supported("expandvolume"));
        assert_eq!(resp.exit_code, 0);
        let (out, _) = render(&resp);
        assert!(out.contains("\"status\":\"Not supported\""));
    }

    #[test]
    fn streams_of_different_types() {
        let mut out = io::Cursor::new(Vec::new());
        let mut err = Vec::new();
        Response::ok(DriverStatus::success())
            .write_to(&mut out, &mut err)
            .unwrap();
        assert_eq!(out.into_inner(), b"{\"status\":\"Success\"}\n");
        assert!(err.is_empty());
    }
}
