// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::config::ResolvedConfig;
use crate::errors::ComputeError;
use crate::models::{ProgramOutput, Task};
use crate::workspace::Workspace;

/// The capability set every computational program plugs in through.
///
/// New backends implement this trait and register with the
/// [`ProgramRegistry`](crate::registry::ProgramRegistry); the dispatch core
/// never branches on a harness identity. A failing `compute` must classify
/// its own failure — returning [`ComputeError::Random`] is the only way to
/// mark it transient and retry-eligible.
#[async_trait]
pub trait ProgramHarness: Send + Sync + std::fmt::Debug {
    async fn compute(
        &self,
        task: &Task,
        workspace: &Workspace,
        config: &ResolvedConfig,
    ) -> Result<ProgramOutput, ComputeError>;

    fn name(&self) -> &'static str;

    /// Version of the backing software, when it can be determined.
    fn get_version(&self) -> Option<String>;

    /// Whether the backing software is installed and executable on this host.
    fn is_available(&self) -> bool;
}
