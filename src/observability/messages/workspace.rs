// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scratch workspace lifecycle events.

use std::fmt::{Display, Formatter};
use std::path::Path;

use crate::observability::messages::StructuredLog;

pub struct WorkspaceAcquired<'a> {
    pub path: &'a Path,
}

impl Display for WorkspaceAcquired<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Acquired scratch workspace {}", self.path.display())
    }
}

impl StructuredLog for WorkspaceAcquired<'_> {
    fn log(&self) {
        tracing::debug!(path = %self.path.display(), "{}", self);
    }
}

pub struct WorkspaceReleased<'a> {
    pub path: &'a Path,
    pub kept: bool,
}

impl Display for WorkspaceReleased<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.kept {
            write!(f, "Released scratch workspace {} (kept on disk)", self.path.display())
        } else {
            write!(f, "Released scratch workspace {}", self.path.display())
        }
    }
}

impl StructuredLog for WorkspaceReleased<'_> {
    fn log(&self) {
        tracing::debug!(path = %self.path.display(), kept = self.kept, "{}", self);
    }
}
