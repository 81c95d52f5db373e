// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Iterative geometry optimization.
//!
//! [`OptimizationRunner`] owns the loop: dispatch one gradient computation
//! for the current geometry, append the record to the trajectory, and ask
//! the [`OptimizationStrategy`] what to do next. The strategy owns the
//! numerics; the runner owns iteration, the trajectory, and terminal-state
//! accounting. Once an output leaves the runner its status is final —
//! `Converged` and `Failed` never revert to `Running`.
//!
//! A failed run can carry an [`OptimizationState`] snapshot. Resubmitting
//! with `allow_restart` and that snapshot resumes from the recorded
//! iteration: completed steps are never recomputed and their provenance is
//! byte-for-byte untouched.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{self, TaskConfig};
use crate::dispatch::{Dispatcher, RunOptions};
use crate::errors::{ComputeError, StructuredError};
use crate::models::{
    Driver, InputSpecification, Molecule, Protocols, Provenance, ResultRecord, Task,
    TrajectoryProtocol,
};
use crate::observability::messages::procedure::{OptimizationFinished, OptimizationStepCompleted};
use crate::observability::messages::StructuredLog;
use crate::traits::{OptimizationStrategy, StepDecision, StepRecord};

fn default_maxiter() -> usize {
    100
}

/// Keywords steering the orchestrator. Everything not named here is
/// flattened into `extras` and handed to the strategy verbatim, including
/// any `constraints` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationKeywords {
    /// Program the gradient sub-tasks are dispatched to.
    pub program: String,
    #[serde(default = "default_maxiter")]
    pub maxiter: usize,
    #[serde(default)]
    pub allow_restart: bool,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationInput {
    /// Specification for the per-step sub-tasks; the driver is forced to
    /// `gradient` regardless of what it says.
    pub specification: InputSpecification,
    pub initial_molecule: Molecule,
    pub keywords: OptimizationKeywords,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Protocols>,
    /// Partial state from an earlier failed run; honored only with
    /// `allow_restart`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_state: Option<OptimizationState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureStatus {
    Running,
    Converged,
    Failed,
}

/// Everything needed to resume an interrupted optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationState {
    pub iteration: usize,
    pub current_molecule: Molecule,
    pub molecules: Vec<Molecule>,
    pub energies: Vec<f64>,
    pub gradients: Vec<Vec<f64>>,
    pub trajectory: Vec<ResultRecord>,
}

impl OptimizationState {
    fn fresh(initial: &Molecule) -> Self {
        Self {
            iteration: 0,
            current_molecule: initial.clone(),
            molecules: Vec::new(),
            energies: Vec::new(),
            gradients: Vec::new(),
            trajectory: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutput {
    pub success: bool,
    pub initial_molecule: Molecule,
    pub final_molecule: Molecule,
    /// Per-step records, pruned per the trajectory protocol.
    pub trajectory: Vec<ResultRecord>,
    /// Energies of every accepted step, never pruned.
    pub energies: Vec<f64>,
    pub status: ProcedureStatus,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StructuredError>,
    /// Present on failure so the caller can resubmit with `allow_restart`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_state: Option<OptimizationState>,
}

impl OptimizationOutput {
    pub fn final_energy(&self) -> Option<f64> {
        self.energies.last().copied()
    }
}

#[derive(Clone)]
pub struct OptimizationRunner {
    dispatcher: Dispatcher,
    strategy: Arc<dyn OptimizationStrategy>,
}

impl OptimizationRunner {
    pub fn new(dispatcher: Dispatcher, strategy: Arc<dyn OptimizationStrategy>) -> Self {
        Self { dispatcher, strategy }
    }

    pub async fn run(
        &self,
        input: &OptimizationInput,
        config: &TaskConfig,
        options: &RunOptions,
    ) -> Result<OptimizationOutput, ComputeError> {
        let started = Instant::now();
        let resolved = config.resolve(config::global())?;

        let mut state = match (&input.restart_state, input.keywords.allow_restart) {
            (Some(state), true) => state.clone(),
            _ => OptimizationState::fresh(&input.initial_molecule),
        };

        // Sub-task failures come back as data so the partial trajectory
        // survives; retryable errors were already absorbed downstream.
        let sub_options = RunOptions {
            raise_error: false,
            cancel: options.cancel.clone(),
        };

        let mut terminal_error: Option<ComputeError> = None;
        let mut status = ProcedureStatus::Running;

        while state.iteration < input.keywords.maxiter {
            let task = Task {
                specification: InputSpecification {
                    driver: Driver::Gradient,
                    ..input.specification.clone()
                },
                molecule: state.current_molecule.clone(),
                protocols: None,
            };
            let record = self
                .dispatcher
                .run(&task, &input.keywords.program, config, &sub_options)
                .await?;

            if !record.success {
                terminal_error = Some(record_error(&record));
                state.trajectory.push(record);
                status = ProcedureStatus::Failed;
                break;
            }

            let energy = record.energy().ok_or_else(|| {
                ComputeError::unknown(format!("{} returned no energy", input.keywords.program))
            });
            let gradient = record.gradient().ok_or_else(|| {
                ComputeError::unknown(format!("{} returned no gradient", input.keywords.program))
            });
            let (energy, gradient) = match (energy, gradient) {
                (Ok(e), Ok(g)) => (e, g),
                (Err(error), _) | (_, Err(error)) => {
                    terminal_error = Some(error);
                    state.trajectory.push(record);
                    status = ProcedureStatus::Failed;
                    break;
                }
            };

            state.molecules.push(state.current_molecule.clone());
            state.energies.push(energy);
            state.gradients.push(gradient);
            state.trajectory.push(record);
            state.iteration += 1;

            OptimizationStepCompleted {
                procedure: self.strategy.name(),
                iteration: state.iteration,
                energy,
            }
            .log();

            let history: Vec<StepRecord<'_>> = state
                .molecules
                .iter()
                .zip(&state.energies)
                .zip(&state.gradients)
                .map(|((molecule, energy), gradient)| StepRecord {
                    molecule,
                    energy: *energy,
                    gradient,
                })
                .collect();

            match self.strategy.propose(&history, &input.keywords.extras) {
                Ok(StepDecision::Converged) => {
                    status = ProcedureStatus::Converged;
                    break;
                }
                Ok(StepDecision::Step(next)) => {
                    state.current_molecule = next;
                }
                Err(error) => {
                    terminal_error = Some(error);
                    status = ProcedureStatus::Failed;
                    break;
                }
            }
        }

        if status == ProcedureStatus::Running {
            // Iteration budget exhausted without a convergence verdict.
            status = ProcedureStatus::Failed;
            terminal_error = Some(ComputeError::unknown(format!(
                "maximum iterations ({}) reached without convergence",
                input.keywords.maxiter
            )));
        }

        let converged = status == ProcedureStatus::Converged;
        OptimizationFinished {
            procedure: self.strategy.name(),
            converged,
            iterations: state.iteration,
            duration: started.elapsed(),
        }
        .log();

        if !converged && options.raise_error {
            if let Some(error) = terminal_error.take() {
                return Err(error);
            }
        }

        let provenance = Provenance {
            creator: self.strategy.name().to_string(),
            version: self.strategy.get_version(),
            walltime_seconds: started.elapsed().as_secs_f64(),
            ncores: resolved.ncores,
            memory_gib: resolved.memory_gib,
            retries: None,
            hostname: config::global().hostname.clone(),
            pid: std::process::id(),
        };

        let final_molecule = state
            .molecules
            .last()
            .cloned()
            .unwrap_or_else(|| input.initial_molecule.clone());
        let protocol = input.protocols.map(|p| p.trajectory).unwrap_or_default();

        Ok(OptimizationOutput {
            success: converged,
            initial_molecule: input.initial_molecule.clone(),
            final_molecule,
            trajectory: prune_trajectory(&state.trajectory, protocol),
            energies: state.energies.clone(),
            status,
            provenance,
            stdout: converged
                .then(|| format!("Converged after {} gradient evaluations.\n", state.iteration)),
            error: terminal_error.map(|e| e.to_structured()),
            restart_state: (!converged).then_some(state),
        })
    }
}

fn record_error(record: &ResultRecord) -> ComputeError {
    match &record.error {
        Some(error) => error.clone().into_compute_error(),
        None => ComputeError::unknown("sub-task failed without an error record"),
    }
}

/// Post-hoc retention policy. Pruning never changes how many computations
/// ran; it only shapes what the caller stores.
fn prune_trajectory(trajectory: &[ResultRecord], protocol: TrajectoryProtocol) -> Vec<ResultRecord> {
    match protocol {
        TrajectoryProtocol::All => trajectory.to_vec(),
        TrajectoryProtocol::None => Vec::new(),
        TrajectoryProtocol::InitialAndFinal => match trajectory {
            [] => Vec::new(),
            [only] => vec![only.clone()],
            [first, .., last] => vec![first.clone(), last.clone()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Model;

    #[test]
    fn test_prune_initial_and_final_keeps_exactly_two() {
        let provenance = Provenance {
            creator: "t".into(),
            version: None,
            walltime_seconds: 0.0,
            ncores: 1,
            memory_gib: 1.0,
            retries: None,
            hostname: None,
            pid: 0,
        };
        let mut records = Vec::new();
        for i in 0..5 {
            let mut output = crate::models::ProgramOutput::default();
            output.return_result = serde_json::json!(i);
            records.push(ResultRecord::from_output(output, provenance.clone()));
        }
        let pruned = prune_trajectory(&records, TrajectoryProtocol::InitialAndFinal);
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[0], records[0]);
        assert_eq!(pruned[1], records[4]);
        assert!(prune_trajectory(&records, TrajectoryProtocol::None).is_empty());
        assert_eq!(prune_trajectory(&records, TrajectoryProtocol::All).len(), 5);
    }

    #[test]
    fn test_keywords_default_maxiter_and_flattened_extras() {
        let keywords: OptimizationKeywords = serde_json::from_value(serde_json::json!({
            "program": "lennard-jones",
            "step_size": 0.02
        }))
        .unwrap();
        assert_eq!(keywords.maxiter, 100);
        assert!(!keywords.allow_restart);
        assert_eq!(keywords.extras.get("step_size"), Some(&serde_json::json!(0.02)));
    }

    #[test]
    fn test_input_deserializes_without_optional_fields() {
        let input: OptimizationInput = serde_json::from_value(serde_json::json!({
            "specification": {
                "driver": "gradient",
                "model": {"method": "lj"}
            },
            "initial_molecule": {
                "symbols": ["He", "He"],
                "geometry": [0.0, 0.0, 0.0, 0.0, 0.0, 4.0]
            },
            "keywords": {"program": "lennard-jones"}
        }))
        .unwrap();
        assert!(input.protocols.is_none());
        assert!(input.restart_state.is_none());
        assert_eq!(input.specification.model, Model { method: "lj".into(), basis: None });
    }
}
