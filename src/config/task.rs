// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-task resource configuration.
//!
//! [`TaskConfig`] is a sparse set of caller-supplied overrides; every field
//! is optional and unset fields fall back to [`HostDefaults`](super::HostDefaults)
//! only when [`TaskConfig::resolve`] runs. The resolved form is immutable and
//! safely shared by reference across concurrent dispatcher calls.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::consts::{DEFAULT_MPIEXEC_COMMAND, DEFAULT_RETRIES};
use crate::config::HostDefaults;
use crate::errors::ComputeError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncores: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nnodes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_gib: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_messy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpiexec_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_mpiexec: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores_per_rank: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl TaskConfig {
    /// Layer `overrides` on top of `self`, field by field. Set fields in
    /// `overrides` win; neither input is mutated.
    pub fn merge(&self, overrides: &TaskConfig) -> TaskConfig {
        TaskConfig {
            ncores: overrides.ncores.or(self.ncores),
            nnodes: overrides.nnodes.or(self.nnodes),
            memory_gib: overrides.memory_gib.or(self.memory_gib),
            scratch_directory: overrides
                .scratch_directory
                .clone()
                .or_else(|| self.scratch_directory.clone()),
            scratch_messy: overrides.scratch_messy.or(self.scratch_messy),
            retries: overrides.retries.or(self.retries),
            mpiexec_command: overrides
                .mpiexec_command
                .clone()
                .or_else(|| self.mpiexec_command.clone()),
            use_mpiexec: overrides.use_mpiexec.or(self.use_mpiexec),
            cores_per_rank: overrides.cores_per_rank.or(self.cores_per_rank),
            timeout_seconds: overrides.timeout_seconds.or(self.timeout_seconds),
        }
    }

    /// Resolve unset fields against the host defaults and validate the
    /// result. This is the only place lazy fallback happens.
    pub fn resolve(&self, defaults: &HostDefaults) -> Result<ResolvedConfig, ComputeError> {
        let ncores = self.ncores.unwrap_or(defaults.ncores);
        let nnodes = self.nnodes.unwrap_or(defaults.nnodes);
        let memory_gib = self.memory_gib.unwrap_or(defaults.memory_gib);
        let cores_per_rank = self.cores_per_rank.unwrap_or(1);

        if ncores == 0 {
            return Err(ComputeError::Input("ncores must be at least 1".into()));
        }
        if nnodes == 0 {
            return Err(ComputeError::Input("nnodes must be at least 1".into()));
        }
        if !(memory_gib > 0.0) {
            return Err(ComputeError::Input(format!(
                "memory_gib must be positive, got {memory_gib}"
            )));
        }
        if cores_per_rank == 0 {
            return Err(ComputeError::Input("cores_per_rank must be at least 1".into()));
        }

        Ok(ResolvedConfig {
            ncores,
            nnodes,
            memory_gib,
            scratch_directory: self
                .scratch_directory
                .clone()
                .or_else(|| defaults.scratch_directory.clone()),
            scratch_messy: self.scratch_messy.unwrap_or(false),
            retries: self.retries.unwrap_or(DEFAULT_RETRIES),
            mpiexec_command: self
                .mpiexec_command
                .clone()
                .unwrap_or_else(|| DEFAULT_MPIEXEC_COMMAND.to_string()),
            use_mpiexec: self.use_mpiexec.unwrap_or(false),
            cores_per_rank,
            timeout: self.timeout_seconds.map(Duration::from_secs),
        })
    }
}

/// A fully resolved, validated resource configuration for one dispatcher
/// call. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub ncores: usize,
    pub nnodes: usize,
    pub memory_gib: f64,
    pub scratch_directory: Option<PathBuf>,
    pub scratch_messy: bool,
    pub retries: u32,
    pub mpiexec_command: String,
    pub use_mpiexec: bool,
    pub cores_per_rank: usize,
    pub timeout: Option<Duration>,
}

impl ResolvedConfig {
    /// Derive the configuration for one MPI-rank sub-task: `ncores` divided
    /// by `cores_per_rank` (minimum 1), memory split proportionally, launch
    /// command carried forward unchanged. `self` is not modified.
    pub fn per_rank(&self) -> ResolvedConfig {
        let ranks = (self.ncores / self.cores_per_rank).max(1);
        ResolvedConfig {
            ncores: (self.ncores / ranks).max(1),
            memory_gib: self.memory_gib / ranks as f64,
            scratch_directory: self.scratch_directory.clone(),
            mpiexec_command: self.mpiexec_command.clone(),
            ..*self
        }
    }

    /// Total MPI ranks implied by this configuration.
    pub fn total_ranks(&self) -> usize {
        (self.nnodes * self.ncores / self.cores_per_rank).max(1)
    }

    /// Render the MPI launch prefix as an argv, substituting the
    /// `{total_ranks}`, `{ranks_per_node}`, `{cores_per_rank}` and
    /// `{nnodes}` placeholders. Empty when `use_mpiexec` is off.
    pub fn mpi_launch_argv(&self) -> Vec<String> {
        if !self.use_mpiexec {
            return Vec::new();
        }
        let ranks_per_node = (self.ncores / self.cores_per_rank).max(1);
        self.mpiexec_command
            .split_whitespace()
            .map(|token| {
                token
                    .replace("{total_ranks}", &self.total_ranks().to_string())
                    .replace("{ranks_per_node}", &ranks_per_node.to_string())
                    .replace("{cores_per_rank}", &self.cores_per_rank.to_string())
                    .replace("{nnodes}", &self.nnodes.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> HostDefaults {
        HostDefaults {
            ncores: 8,
            nnodes: 1,
            memory_gib: 16.0,
            scratch_directory: None,
            hostname: None,
        }
    }

    #[test]
    fn test_unset_fields_resolve_to_host_defaults() {
        let resolved = TaskConfig::default().resolve(&defaults()).unwrap();
        assert_eq!(resolved.ncores, 8);
        assert_eq!(resolved.memory_gib, 16.0);
        assert_eq!(resolved.retries, DEFAULT_RETRIES);
        assert!(!resolved.scratch_messy);
        assert!(resolved.timeout.is_none());
    }

    #[test]
    fn test_zero_cores_rejected() {
        let config = TaskConfig {
            ncores: Some(0),
            ..Default::default()
        };
        let err = config.resolve(&defaults()).unwrap_err();
        assert_eq!(err.error_type(), "input_error");
    }

    #[test]
    fn test_negative_memory_rejected() {
        let config = TaskConfig {
            memory_gib: Some(-2.0),
            ..Default::default()
        };
        assert!(config.resolve(&defaults()).is_err());
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let base = TaskConfig {
            ncores: Some(4),
            retries: Some(1),
            ..Default::default()
        };
        let overrides = TaskConfig {
            ncores: Some(2),
            ..Default::default()
        };
        let merged = base.merge(&overrides);
        assert_eq!(merged.ncores, Some(2));
        assert_eq!(merged.retries, Some(1));
    }

    #[test]
    fn test_per_rank_derivation_leaves_parent_unchanged() {
        let config = TaskConfig {
            ncores: Some(20),
            cores_per_rank: Some(5),
            ..Default::default()
        };
        let parent = config.resolve(&defaults()).unwrap();
        let child = parent.per_rank();
        assert_eq!(child.ncores, 5);
        assert_eq!(parent.ncores, 20);
        assert_eq!(child.mpiexec_command, parent.mpiexec_command);
    }

    #[test]
    fn test_mpi_launch_argv_substitution() {
        let config = TaskConfig {
            ncores: Some(8),
            cores_per_rank: Some(2),
            nnodes: Some(2),
            use_mpiexec: Some(true),
            mpiexec_command: Some("mpiexec -n {total_ranks} -ppn {ranks_per_node}".into()),
            ..Default::default()
        };
        let resolved = config.resolve(&defaults()).unwrap();
        assert_eq!(
            resolved.mpi_launch_argv(),
            vec!["mpiexec", "-n", "8", "-ppn", "4"]
        );
    }

    #[test]
    fn test_mpi_launch_argv_empty_without_use_mpiexec() {
        let resolved = TaskConfig::default().resolve(&defaults()).unwrap();
        assert!(resolved.mpi_launch_argv().is_empty());
    }
}
