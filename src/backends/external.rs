// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Generic harness for external executables.
//!
//! Wraps a named binary that speaks the engine's JSON contract: the task is
//! written to `input.json` in the scratch workspace, the binary is invoked
//! with that path (behind the MPI launch prefix when `use_mpiexec` is set),
//! and its stdout must be a serialized [`ProgramOutput`]. Availability is a
//! PATH lookup, which is what separates "supported" from "installed" in the
//! registry listing.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::ResolvedConfig;
use crate::errors::ComputeError;
use crate::models::{ProgramOutput, Task};
use crate::traits::ProgramHarness;
use crate::workspace::Workspace;

#[derive(Debug)]
pub struct ExternalHarness {
    name: &'static str,
    binary: String,
}

impl ExternalHarness {
    pub fn new(name: &'static str, binary: impl Into<String>) -> Self {
        Self {
            name,
            binary: binary.into(),
        }
    }

    fn which(&self) -> Option<PathBuf> {
        let binary = PathBuf::from(&self.binary);
        if binary.is_absolute() {
            return binary.is_file().then_some(binary);
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.binary))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl ProgramHarness for ExternalHarness {
    async fn compute(
        &self,
        task: &Task,
        workspace: &Workspace,
        config: &ResolvedConfig,
    ) -> Result<ProgramOutput, ComputeError> {
        let Some(binary) = self.which() else {
            return Err(ComputeError::Resource(format!(
                "executable '{}' not found on PATH",
                self.binary
            )));
        };

        let input_path = workspace.path().join("input.json");
        let serialized = serde_json::to_vec_pretty(task)
            .map_err(|e| ComputeError::Input(format!("task is not serializable: {e}")))?;
        std::fs::write(&input_path, serialized).map_err(|e| {
            ComputeError::Resource(format!("cannot write {}: {e}", input_path.display()))
        })?;

        let mut argv = config.mpi_launch_argv();
        argv.push(binary.display().to_string());
        argv.push(input_path.display().to_string());

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(workspace.path())
            .env("QCDISPATCH_NCORES", config.ncores.to_string())
            .env("QCDISPATCH_MEMORY_GIB", config.memory_gib.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ComputeError::Resource(format!("failed to launch '{}': {e}", argv[0])))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ComputeError::Unknown {
                message: format!("'{}' exited with {}", self.binary, output.status),
                stdout: Some(stdout),
                stderr: Some(stderr),
            });
        }

        serde_json::from_str(&stdout).map_err(|e| ComputeError::Unknown {
            message: format!("'{}' produced unparseable output: {e}", self.binary),
            stdout: Some(stdout),
            stderr: Some(stderr),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn get_version(&self) -> Option<String> {
        // Version probing would need to run the binary; only report presence.
        self.which().map(|_| "installed".to_string())
    }

    fn is_available(&self) -> bool {
        self.which().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostDefaults, TaskConfig};
    use crate::models::{Driver, InputSpecification, Model, Molecule};

    fn task() -> Task {
        Task {
            specification: InputSpecification {
                driver: Driver::Energy,
                model: Model {
                    method: "external".into(),
                    basis: None,
                },
                keywords: Default::default(),
                extras: Default::default(),
            },
            molecule: Molecule::new(vec!["He".into()], vec![0.0, 0.0, 0.0]).unwrap(),
            protocols: None,
        }
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let harness = ExternalHarness::new("ghost", "definitely-not-a-real-binary-qcd");
        assert!(!harness.is_available());
        assert!(harness.get_version().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compute_parses_contract_stdout() {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = tempfile::tempdir().unwrap();
        let script = bin_dir.path().join("fake-qc");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"return_result\": -1.25, \"properties\": {}}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let harness = ExternalHarness::new("fake-qc", script.display().to_string());
        assert!(harness.is_available());

        let config = TaskConfig::default().resolve(&HostDefaults::detect()).unwrap();
        let workspace = Workspace::acquire(&config).unwrap();
        let output = harness.compute(&task(), &workspace, &config).await.unwrap();
        assert_eq!(output.return_result.as_f64(), Some(-1.25));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_unknown_error_with_output() {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = tempfile::tempdir().unwrap();
        let script = bin_dir.path().join("crashy-qc");
        std::fs::write(&script, "#!/bin/sh\necho boom >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let harness = ExternalHarness::new("crashy-qc", script.display().to_string());
        let config = TaskConfig::default().resolve(&HostDefaults::detect()).unwrap();
        let workspace = Workspace::acquire(&config).unwrap();
        let err = harness.compute(&task(), &workspace, &config).await.unwrap_err();
        assert_eq!(err.error_type(), "unknown_error");
        assert!(err.to_structured().raw_output.unwrap().contains("boom"));
    }
}
