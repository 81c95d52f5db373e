// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scripted failure injection.
//!
//! Each `compute` call consumes the next mode from the script: `Pass`
//! delegates to the Lennard-Jones surface, the error modes fail with the
//! corresponding classification. Once the script runs dry every call passes.
//! This is how the retry policy gets exercised without a flaky real backend.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backends::LennardJonesHarness;
use crate::config::ResolvedConfig;
use crate::errors::ComputeError;
use crate::models::{ProgramOutput, Task};
use crate::traits::ProgramHarness;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Pass,
    RandomError,
    InputError,
}

#[derive(Debug, Default)]
pub struct FailureInjectionHarness {
    modes: Mutex<VecDeque<FailureMode>>,
    delegate: LennardJonesHarness,
}

impl FailureInjectionHarness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the remaining script with `modes`.
    pub fn set_modes(&self, modes: impl IntoIterator<Item = FailureMode>) {
        let mut queue = self.modes.lock().expect("failure mode script poisoned");
        queue.clear();
        queue.extend(modes);
    }

    fn next_mode(&self) -> FailureMode {
        self.modes
            .lock()
            .expect("failure mode script poisoned")
            .pop_front()
            .unwrap_or(FailureMode::Pass)
    }
}

#[async_trait]
impl ProgramHarness for FailureInjectionHarness {
    async fn compute(
        &self,
        task: &Task,
        workspace: &Workspace,
        config: &ResolvedConfig,
    ) -> Result<ProgramOutput, ComputeError> {
        match self.next_mode() {
            FailureMode::Pass => self.delegate.compute(task, workspace, config).await,
            FailureMode::RandomError => Err(ComputeError::Random(
                "injected transient failure".into(),
            )),
            FailureMode::InputError => Err(ComputeError::Input(
                "injected deterministic input failure".into(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "failure-injection"
    }

    fn get_version(&self) -> Option<String> {
        Some(env!("CARGO_PKG_VERSION").to_string())
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_consumed_in_order_then_passes() {
        let harness = FailureInjectionHarness::new();
        harness.set_modes([FailureMode::RandomError, FailureMode::InputError]);
        assert_eq!(harness.next_mode(), FailureMode::RandomError);
        assert_eq!(harness.next_mode(), FailureMode::InputError);
        assert_eq!(harness.next_mode(), FailureMode::Pass);
        assert_eq!(harness.next_mode(), FailureMode::Pass);
    }
}
