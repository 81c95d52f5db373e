// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Process-wide default resource configuration.
//!
//! Host defaults are established once, explicitly, at process start (or
//! lazily from detection on first use) and are read-only afterwards. Task
//! configs resolve their unset fields against these defaults at the point a
//! workspace is created, never at construction time, so the same config
//! literal is safe to reuse across hosts.

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::config::consts::{DEFAULT_MEMORY_GIB, DEFAULT_NNODES};

static HOST_DEFAULTS: OnceLock<HostDefaults> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
pub struct HostDefaults {
    #[serde(default = "detect_ncores")]
    pub ncores: usize,
    #[serde(default = "default_nnodes")]
    pub nnodes: usize,
    #[serde(default = "detect_memory_gib")]
    pub memory_gib: f64,
    #[serde(default)]
    pub scratch_directory: Option<PathBuf>,
    #[serde(default = "detect_hostname")]
    pub hostname: Option<String>,
}

impl HostDefaults {
    /// Detect defaults from the running host.
    pub fn detect() -> Self {
        Self {
            ncores: detect_ncores(),
            nnodes: DEFAULT_NNODES,
            memory_gib: detect_memory_gib(),
            scratch_directory: None,
            hostname: detect_hostname(),
        }
    }

    /// Load defaults from a YAML file, falling back to detection for any
    /// field the file leaves unset.
    pub fn from_yaml_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

fn detect_ncores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_nnodes() -> usize {
    DEFAULT_NNODES
}

fn detect_memory_gib() -> f64 {
    read_meminfo_gib().unwrap_or(DEFAULT_MEMORY_GIB)
}

#[cfg(target_os = "linux")]
fn read_meminfo_gib() -> Option<f64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = contents.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib / (1024.0 * 1024.0))
}

#[cfg(not(target_os = "linux"))]
fn read_meminfo_gib() -> Option<f64> {
    None
}

fn detect_hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .ok()
        .filter(|h| !h.is_empty())
}

/// Install process-wide defaults. A no-op if defaults were already
/// established; returns whether this call installed them.
pub fn initialize(defaults: HostDefaults) -> bool {
    HOST_DEFAULTS.set(defaults).is_ok()
}

/// The process-wide defaults, detecting them on first use if [`initialize`]
/// was never called.
pub fn global() -> &'static HostDefaults {
    HOST_DEFAULTS.get_or_init(HostDefaults::detect)
}

/// Human-readable rendering of the active configuration for the `info`
/// surface.
pub fn global_repr() -> String {
    let defaults = global();
    let scratch = defaults
        .scratch_directory
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| std::env::temp_dir().display().to_string());
    format!(
        "ncores:            {}\n\
         nnodes:            {}\n\
         memory_gib:        {:.1}\n\
         scratch_directory: {}\n\
         hostname:          {}",
        defaults.ncores,
        defaults.nnodes,
        defaults.memory_gib,
        scratch,
        defaults.hostname.as_deref().unwrap_or("unknown"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_produces_usable_defaults() {
        let defaults = HostDefaults::detect();
        assert!(defaults.ncores >= 1);
        assert!(defaults.memory_gib > 0.0);
        assert_eq!(defaults.nnodes, 1);
    }

    #[test]
    fn test_yaml_defaults_fill_unset_fields() {
        let parsed: HostDefaults = serde_yaml::from_str("ncores: 12\n").unwrap();
        assert_eq!(parsed.ncores, 12);
        assert_eq!(parsed.nnodes, 1);
        assert!(parsed.memory_gib > 0.0);
    }

    #[test]
    fn test_global_repr_lists_active_fields() {
        let repr = global_repr();
        assert!(repr.contains("ncores:"));
        assert!(repr.contains("scratch_directory:"));
    }
}
