// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scoped scratch workspaces.
//!
//! A [`Workspace`] owns one scratch directory for the lifetime of exactly one
//! dispatcher attempt. Deletion is tied to `Drop`, so it runs on every exit
//! path — normal return, backend failure, or panic. When `scratch_messy` is
//! set the directory is kept, the path is reported on the result record, and
//! ownership transfers to the caller.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::ResolvedConfig;
use crate::errors::ComputeError;
use crate::observability::messages::workspace::{WorkspaceAcquired, WorkspaceReleased};
use crate::observability::messages::StructuredLog;

const SCRATCH_PREFIX: &str = "qcdispatch-";

#[derive(Debug)]
pub struct Workspace {
    // None once the directory has been kept (messy) — nothing to clean up.
    dir: Option<TempDir>,
    path: PathBuf,
    messy: bool,
}

impl Workspace {
    /// Create a fresh scratch directory under the configured scratch root
    /// (or the system temp dir). Creation failure is a `resource_error` and
    /// is never retried.
    pub fn acquire(config: &ResolvedConfig) -> Result<Workspace, ComputeError> {
        let base = config
            .scratch_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&base)
            .map_err(|e| {
                ComputeError::Resource(format!(
                    "failed to create scratch directory under {}: {e}",
                    base.display()
                ))
            })?;

        let path = dir.path().to_path_buf();
        WorkspaceAcquired { path: &path }.log();

        Ok(Workspace {
            dir: Some(dir),
            path,
            messy: config.scratch_messy,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the workspace. Returns the kept path when `scratch_messy` is
    /// set; otherwise the directory and its contents are deleted.
    pub fn release(mut self) -> Option<PathBuf> {
        let dir = self.dir.take()?;
        WorkspaceReleased {
            path: &self.path,
            kept: self.messy,
        }
        .log();
        if self.messy {
            // Disarm the TempDir so Drop no longer deletes it.
            Some(dir.keep())
        } else {
            // Explicit close surfaces deletion errors instead of swallowing
            // them in Drop; a best-effort log is all we can do either way.
            if let Err(e) = dir.close() {
                tracing::warn!(path = %self.path.display(), error = %e, "scratch cleanup failed");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostDefaults, TaskConfig};

    fn resolved(messy: bool, scratch: Option<PathBuf>) -> ResolvedConfig {
        TaskConfig {
            scratch_messy: Some(messy),
            scratch_directory: scratch,
            ..Default::default()
        }
        .resolve(&HostDefaults::detect())
        .unwrap()
    }

    #[test]
    fn test_release_deletes_scratch() {
        let workspace = Workspace::acquire(&resolved(false, None)).unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.is_dir());
        assert!(workspace.release().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_messy_release_keeps_scratch_and_reports_path() {
        let workspace = Workspace::acquire(&resolved(true, None)).unwrap();
        let kept = workspace.release().expect("messy workspace reports its path");
        assert!(kept.is_dir());
        std::fs::remove_dir_all(kept).unwrap();
    }

    #[test]
    fn test_drop_cleans_up_without_release() {
        let path = {
            let workspace = Workspace::acquire(&resolved(false, None)).unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_acquire_under_configured_scratch_root() {
        let root = tempfile::tempdir().unwrap();
        let workspace =
            Workspace::acquire(&resolved(false, Some(root.path().to_path_buf()))).unwrap();
        assert!(workspace.path().starts_with(root.path()));
    }

    #[test]
    fn test_acquire_failure_is_resource_error() {
        let missing = PathBuf::from("/nonexistent/scratch/root");
        let err = Workspace::acquire(&resolved(false, Some(missing))).unwrap_err();
        assert_eq!(err.error_type(), "resource_error");
    }
}
