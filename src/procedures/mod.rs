// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Multi-step procedure orchestration on top of the dispatcher.
//!
//! A procedure composes many single-call dispatches into one higher-level
//! result: an iterative geometry optimization, or a torsion grid scan that
//! itself fans out constrained optimizations. Procedures reuse the
//! dispatcher for every underlying computation, so the retry policy and
//! workspace isolation apply uniformly to each step.

pub mod optimization;
pub mod torsion_scan;


use serde_json::Value;

use crate::config::TaskConfig;
use crate::dispatch::{Dispatcher, RunOptions};
use crate::errors::ComputeError;
use crate::registry::{self, ProcedureRegistry};

pub use optimization::{
    OptimizationInput, OptimizationKeywords, OptimizationOutput, OptimizationRunner,
    OptimizationState, ProcedureStatus,
};
pub use torsion_scan::{ScanKeywords, TorsionScanInput, TorsionScanOutput, TorsionScanRunner};

/// Run a named procedure on an untyped JSON payload.
///
/// This is the boundary the CLI talks to: `procedure` is either the torsion
/// scan or the name of a registered
/// [`OptimizationStrategy`](crate::traits::OptimizationStrategy), and `data`
/// is the matching input document. Typed callers should use the runners
/// directly.
pub async fn run_procedure(
    procedure: &str,
    data: Value,
    dispatcher: &Dispatcher,
    procedures: &ProcedureRegistry,
    config: &TaskConfig,
    options: &RunOptions,
) -> Result<Value, ComputeError> {
    if procedure == registry::TORSION_SCAN {
        let input: TorsionScanInput = serde_json::from_value(data)
            .map_err(|e| ComputeError::Input(format!("invalid torsion scan input: {e}")))?;
        let runner = TorsionScanRunner::new(dispatcher.clone(), procedures.clone());
        let output = runner.run(&input, config, options).await?;
        return serde_json::to_value(output)
            .map_err(|e| ComputeError::unknown(format!("failed to serialize scan output: {e}")));
    }

    let strategy = procedures
        .resolve(procedure)
        .map_err(|e| ComputeError::Resource(e.to_string()))?;
    let input: OptimizationInput = serde_json::from_value(data)
        .map_err(|e| ComputeError::Input(format!("invalid optimization input: {e}")))?;
    let runner = OptimizationRunner::new(dispatcher.clone(), strategy);
    let output = runner.run(&input, config, options).await?;
    serde_json::to_value(output)
        .map_err(|e| ComputeError::unknown(format!("failed to serialize optimization output: {e}")))
}
