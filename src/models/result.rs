// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Result records and provenance.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StructuredError;

/// Who produced a result and with what resources.
///
/// `retries` is serialized only when at least one retry occurred, so a clean
/// first-attempt success is distinguishable from a retried one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub creator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub walltime_seconds: f64,
    pub ncores: usize,
    pub memory_gib: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub pid: u32,
}

/// What a program harness hands back on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramOutput {
    /// The driver-requested quantity (energy scalar, gradient array, ...).
    pub return_result: Value,
    /// Named auxiliary quantities; the dispatcher passes these through.
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// Outcome of one dispatcher call.
///
/// A failed record never carries a `return_result`; a successful record never
/// carries an `error`. Every record carries provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_result: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub provenance: Provenance,
    /// Scratch path handed over to the caller when `scratch_messy` was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StructuredError>,
}

impl ResultRecord {
    pub fn from_output(output: ProgramOutput, provenance: Provenance) -> Self {
        Self {
            success: true,
            return_result: Some(output.return_result),
            properties: output.properties,
            stdout: output.stdout,
            stderr: output.stderr,
            provenance,
            scratch_directory: None,
            error: None,
        }
    }

    pub fn from_error(error: StructuredError, provenance: Provenance) -> Self {
        Self {
            success: false,
            return_result: None,
            properties: Map::new(),
            stdout: None,
            stderr: None,
            provenance,
            scratch_directory: None,
            error: Some(error),
        }
    }

    /// The scalar energy, if the record carries one.
    ///
    /// Gradient computations report the energy in `properties.return_energy`;
    /// energy computations report it as the `return_result` itself.
    pub fn energy(&self) -> Option<f64> {
        if let Some(value) = self.properties.get("return_energy") {
            return value.as_f64();
        }
        self.return_result.as_ref().and_then(Value::as_f64)
    }

    /// The flattened gradient, if the record carries one.
    pub fn gradient(&self) -> Option<Vec<f64>> {
        let value = self
            .properties
            .get("return_gradient")
            .or(self.return_result.as_ref())?;
        value
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ComputeError;

    fn provenance() -> Provenance {
        Provenance {
            creator: "test".into(),
            version: None,
            walltime_seconds: 0.0,
            ncores: 1,
            memory_gib: 1.0,
            retries: None,
            hostname: None,
            pid: 42,
        }
    }

    #[test]
    fn test_retries_absent_from_serialized_provenance_when_none() {
        let serialized = serde_json::to_value(provenance()).unwrap();
        assert!(serialized.get("retries").is_none());

        let mut retried = provenance();
        retried.retries = Some(2);
        let serialized = serde_json::to_value(retried).unwrap();
        assert_eq!(serialized["retries"], 2);
    }

    #[test]
    fn test_failed_record_has_no_return_result() {
        let record = ResultRecord::from_error(
            ComputeError::Input("bad".into()).to_structured(),
            provenance(),
        );
        assert!(!record.success);
        assert!(record.return_result.is_none());
        assert_eq!(record.error.unwrap().error_type, "input_error");
    }

    #[test]
    fn test_energy_extraction_prefers_properties() {
        let mut output = ProgramOutput {
            return_result: serde_json::json!([0.0, 0.0, -0.1]),
            ..Default::default()
        };
        output
            .properties
            .insert("return_energy".into(), serde_json::json!(-1.5));
        let record = ResultRecord::from_output(output, provenance());
        assert_eq!(record.energy(), Some(-1.5));
        assert_eq!(record.gradient(), Some(vec![0.0, 0.0, -0.1]));
    }
}
