// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{Map, Value};

use crate::errors::ComputeError;
use crate::models::Molecule;

/// One completed optimization step, as seen by the strategy.
#[derive(Debug)]
pub struct StepRecord<'a> {
    pub molecule: &'a Molecule,
    pub energy: f64,
    pub gradient: &'a [f64],
}

/// What the strategy wants next.
#[derive(Debug, Clone)]
pub enum StepDecision {
    /// The strategy's own convergence test passed; the last stepped
    /// geometry is final.
    Converged,
    /// Continue with this trial geometry.
    Step(Molecule),
}

/// The optimizer seam.
///
/// The orchestrator owns iteration, retries, and the trajectory; the
/// strategy owns the numerics — proposing geometries and deciding
/// convergence. `keywords` carries the procedure keywords verbatim,
/// including any `constraints` block, which the orchestrator threads through
/// without interpreting.
pub trait OptimizationStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn get_version(&self) -> Option<String>;

    fn is_available(&self) -> bool;

    fn propose(
        &self,
        history: &[StepRecord<'_>],
        keywords: &Map<String, Value>,
    ) -> Result<StepDecision, ComputeError>;
}
