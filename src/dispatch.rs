// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The single-call execution primitive.
//!
//! [`Dispatcher::run`] takes one task, a program name, and a task config and
//! produces exactly one [`ResultRecord`], applying the retry policy along
//! the way. Each attempt gets a fresh scratch [`Workspace`]; transient
//! (`random_error`) failures are retried up to the configured budget, every
//! other failure is terminal. Failures are first-class data — they are only
//! raised to the caller when [`RunOptions::raise_error`] is set.
//!
//! Retry accounting is exact and visible: the provenance of the returned
//! record carries `retries` equal to the number of failed attempts that
//! preceded the terminal outcome, and omits the field entirely when the
//! first attempt succeeded. Reproducibility of downstream science depends
//! on that bookkeeping, so retries are never silently merged with success.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::{self, ResolvedConfig, TaskConfig};
use crate::errors::ComputeError;
use crate::models::{ProgramOutput, Provenance, ResultRecord, Task};
use crate::observability::messages::dispatch::{
    ComputeCompleted, ComputeFailed, ComputeRetry, ComputeStarted,
};
use crate::observability::messages::StructuredLog;
use crate::registry::ProgramRegistry;
use crate::traits::ProgramHarness;
use crate::workspace::Workspace;

/// Per-call behavior switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Return terminal failures as `Err` instead of as failed records.
    pub raise_error: bool,
    /// External cancellation; firing surfaces as a non-retried
    /// `resource_error`.
    pub cancel: Option<CancellationToken>,
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProgramRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProgramRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProgramRegistry> {
        &self.registry
    }

    /// Run one computation to a completed-or-failed record.
    pub async fn run(
        &self,
        task: &Task,
        program: &str,
        task_config: &TaskConfig,
        options: &RunOptions,
    ) -> Result<ResultRecord, ComputeError> {
        let started = Instant::now();
        let defaults = config::global();

        // Lazy resolution happens here, not at config construction.
        let resolved = match task_config.resolve(defaults) {
            Ok(resolved) => resolved,
            Err(error) => {
                let provenance =
                    build_provenance(program, None, started, defaults.ncores, defaults.memory_gib, 0);
                return finish_failure(program, error, provenance, None, options);
            }
        };

        let harness = match self.registry.resolve(program) {
            Ok(harness) => harness,
            Err(registry_error) => {
                let error = ComputeError::Resource(registry_error.to_string());
                let provenance = build_provenance(
                    program,
                    None,
                    started,
                    resolved.ncores,
                    resolved.memory_gib,
                    0,
                );
                return finish_failure(program, error, provenance, None, options);
            }
        };

        ComputeStarted {
            program,
            ncores: resolved.ncores,
            memory_gib: resolved.memory_gib,
        }
        .log();

        let mut attempt: u32 = 0;
        loop {
            // One isolated workspace per attempt, never shared.
            let workspace = match Workspace::acquire(&resolved) {
                Ok(workspace) => workspace,
                Err(error) => {
                    let provenance = build_provenance(
                        harness.name(),
                        harness.get_version(),
                        started,
                        resolved.ncores,
                        resolved.memory_gib,
                        attempt,
                    );
                    return finish_failure(program, error, provenance, None, options);
                }
            };

            match invoke(harness.as_ref(), task, &workspace, &resolved, options).await {
                Ok(output) => {
                    let scratch = workspace.release();
                    let provenance = build_provenance(
                        harness.name(),
                        harness.get_version(),
                        started,
                        resolved.ncores,
                        resolved.memory_gib,
                        attempt,
                    );
                    ComputeCompleted {
                        program,
                        duration: started.elapsed(),
                        retries: attempt,
                    }
                    .log();
                    let mut record = ResultRecord::from_output(output, provenance);
                    record.scratch_directory = scratch.map(|p| p.display().to_string());
                    return Ok(record);
                }
                Err(error) if error.retryable() && attempt < resolved.retries => {
                    // Discard this attempt's scratch and go again.
                    drop(workspace);
                    attempt += 1;
                    ComputeRetry {
                        program,
                        attempt,
                        max_retries: resolved.retries,
                        error: &error.to_string(),
                    }
                    .log();
                }
                Err(error) => {
                    let scratch = workspace.release();
                    let provenance = build_provenance(
                        harness.name(),
                        harness.get_version(),
                        started,
                        resolved.ncores,
                        resolved.memory_gib,
                        attempt,
                    );
                    return finish_failure(
                        program,
                        error,
                        provenance,
                        scratch.map(|p| p.display().to_string()),
                        options,
                    );
                }
            }
        }
    }
}

/// Invoke the harness under the configured wall-clock budget and the
/// caller's cancellation token. Both fire as `resource_error`.
async fn invoke(
    harness: &dyn ProgramHarness,
    task: &Task,
    workspace: &Workspace,
    resolved: &ResolvedConfig,
    options: &RunOptions,
) -> Result<ProgramOutput, ComputeError> {
    let work = async {
        match resolved.timeout {
            Some(limit) => match tokio::time::timeout(limit, harness.compute(task, workspace, resolved)).await
            {
                Ok(result) => result,
                Err(_) => Err(ComputeError::Resource(format!(
                    "computation exceeded the {:.0}s wall-clock budget",
                    limit.as_secs_f64()
                ))),
            },
            None => harness.compute(task, workspace, resolved).await,
        }
    };

    match &options.cancel {
        None => work.await,
        Some(token) => {
            tokio::select! {
                result = work => result,
                _ = token.cancelled() => {
                    Err(ComputeError::Resource("computation cancelled by caller".into()))
                }
            }
        }
    }
}

fn build_provenance(
    creator: &str,
    version: Option<String>,
    started: Instant,
    ncores: usize,
    memory_gib: f64,
    attempt: u32,
) -> Provenance {
    Provenance {
        creator: creator.to_string(),
        version,
        walltime_seconds: started.elapsed().as_secs_f64(),
        ncores,
        memory_gib,
        retries: (attempt > 0).then_some(attempt),
        hostname: config::global().hostname.clone(),
        pid: std::process::id(),
    }
}

fn finish_failure(
    program: &str,
    error: ComputeError,
    provenance: Provenance,
    scratch_directory: Option<String>,
    options: &RunOptions,
) -> Result<ResultRecord, ComputeError> {
    ComputeFailed {
        program,
        error_type: error.error_type(),
        error: &error.to_string(),
    }
    .log();
    if options.raise_error {
        return Err(error);
    }
    let mut record = ResultRecord::from_error(error.to_structured(), provenance);
    record.scratch_directory = scratch_directory;
    Ok(record)
}
