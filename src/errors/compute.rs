// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error taxonomy for computation dispatch.
//!
//! Every failure surfaced by a program harness or by the dispatcher itself is
//! classified into one of four kinds. The kind decides the retry policy:
//! only `Random` (transient) failures are eligible for retry, and a harness
//! must tag transience explicitly — the dispatcher never infers it from
//! message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a computation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The task description is malformed or requests an unsupported
    /// combination. Never retried.
    Input,
    /// Workspace or host resource acquisition failed, or an externally
    /// imposed timeout/cancellation fired. Not automatically retried.
    Resource,
    /// The backend reported a transient failure expected to potentially
    /// succeed on an unmodified retry.
    Random,
    /// The backend failed in a way not otherwise classified. Not retried,
    /// but reported with full diagnostic output attached.
    Unknown,
}

/// A classified computation failure.
///
/// Carries enough context to serialize into a [`StructuredError`] on a failed
/// result record. `Unknown` retains the captured stdout/stderr of the backend
/// for diagnosis.
#[derive(Error, Debug, Clone)]
pub enum ComputeError {
    #[error("input error: {0}")]
    Input(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("random error: {0}")]
    Random(String),

    #[error("unknown error: {message}")]
    Unknown {
        message: String,
        stdout: Option<String>,
        stderr: Option<String>,
    },
}

impl ComputeError {
    pub fn unknown(message: impl Into<String>) -> Self {
        ComputeError::Unknown {
            message: message.into(),
            stdout: None,
            stderr: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ComputeError::Input(_) => ErrorKind::Input,
            ComputeError::Resource(_) => ErrorKind::Resource,
            ComputeError::Random(_) => ErrorKind::Random,
            ComputeError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Stable string key used in serialized result records.
    pub fn error_type(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Input => "input_error",
            ErrorKind::Resource => "resource_error",
            ErrorKind::Random => "random_error",
            ErrorKind::Unknown => "unknown_error",
        }
    }

    /// Whether the dispatcher may re-attempt the computation.
    pub fn retryable(&self) -> bool {
        self.kind() == ErrorKind::Random
    }

    pub fn to_structured(&self) -> StructuredError {
        let raw_output = match self {
            ComputeError::Unknown { stdout, stderr, .. } => {
                match (stdout, stderr) {
                    (None, None) => None,
                    (out, err) => Some(format!(
                        "{}{}",
                        out.as_deref().unwrap_or(""),
                        err.as_deref().unwrap_or("")
                    )),
                }
            }
            _ => None,
        };
        StructuredError {
            error_type: self.error_type().to_string(),
            error_message: self.to_string(),
            raw_output,
        }
    }
}

/// The serializable form of a [`ComputeError`] carried on a failed result
/// record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredError {
    pub error_type: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl StructuredError {
    /// Reconstruct the typed error from a serialized record. Unrecognized
    /// keys fold into `Unknown`.
    pub fn into_compute_error(self) -> ComputeError {
        match self.error_type.as_str() {
            "input_error" => ComputeError::Input(self.error_message),
            "resource_error" => ComputeError::Resource(self.error_message),
            "random_error" => ComputeError::Random(self.error_message),
            _ => ComputeError::Unknown {
                message: self.error_message,
                stdout: self.raw_output,
                stderr: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_random_errors_are_retryable() {
        assert!(ComputeError::Random("flaky".into()).retryable());
        assert!(!ComputeError::Input("bad keyword".into()).retryable());
        assert!(!ComputeError::Resource("no scratch".into()).retryable());
        assert!(!ComputeError::unknown("segfault").retryable());
    }

    #[test]
    fn test_error_type_keys_are_stable() {
        assert_eq!(ComputeError::Input("x".into()).error_type(), "input_error");
        assert_eq!(ComputeError::Resource("x".into()).error_type(), "resource_error");
        assert_eq!(ComputeError::Random("x".into()).error_type(), "random_error");
        assert_eq!(ComputeError::unknown("x").error_type(), "unknown_error");
    }

    #[test]
    fn test_unknown_error_carries_raw_output() {
        let err = ComputeError::Unknown {
            message: "backend crashed".into(),
            stdout: Some("step 1 ok\n".into()),
            stderr: Some("SIGSEGV\n".into()),
        };
        let structured = err.to_structured();
        assert_eq!(structured.error_type, "unknown_error");
        assert_eq!(structured.raw_output.as_deref(), Some("step 1 ok\nSIGSEGV\n"));
    }
}
