// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Steepest-descent optimization strategy.
//!
//! The reference [`OptimizationStrategy`]: fixed-step gradient descent with
//! a displacement cap and support for pinned dihedral constraints. Serious
//! optimizers plug in through the same trait; the orchestrator treats them
//! all identically.

use serde_json::{Map, Value};

use crate::errors::ComputeError;
use crate::traits::{OptimizationStrategy, StepDecision, StepRecord};

const DEFAULT_STEP_SIZE: f64 = 0.05;
const DEFAULT_MAX_DISPLACEMENT: f64 = 0.3;
const DEFAULT_GRADIENT_TOLERANCE: f64 = 1.0e-6;
const DEFAULT_ENERGY_TOLERANCE: f64 = 1.0e-10;

#[derive(Debug, Default)]
pub struct DescentStrategy;

#[derive(Debug, Clone, Copy)]
struct DihedralConstraint {
    indices: [usize; 4],
    value: f64,
}

fn keyword_f64(keywords: &Map<String, Value>, key: &str, default: f64) -> Result<f64, ComputeError> {
    match keywords.get(key) {
        None => Ok(default),
        Some(value) => value.as_f64().ok_or_else(|| {
            ComputeError::Input(format!("keyword '{key}' must be a number, got {value}"))
        }),
    }
}

/// Parse the uninterpreted `constraints` block threaded through by the
/// orchestrator. Only frozen dihedrals are understood here; anything else is
/// rejected as an input error rather than silently ignored.
fn parse_constraints(keywords: &Map<String, Value>) -> Result<Vec<DihedralConstraint>, ComputeError> {
    let Some(constraints) = keywords.get("constraints") else {
        return Ok(Vec::new());
    };
    let set = constraints
        .get("set")
        .and_then(Value::as_array)
        .ok_or_else(|| ComputeError::Input("constraints must contain a 'set' list".into()))?;

    set.iter()
        .map(|entry| {
            let kind = entry.get("type").and_then(Value::as_str).unwrap_or("");
            if kind != "dihedral" {
                return Err(ComputeError::Input(format!(
                    "unsupported constraint type '{kind}'"
                )));
            }
            let indices: Vec<usize> = entry
                .get("indices")
                .and_then(Value::as_array)
                .map(|v| v.iter().filter_map(Value::as_u64).map(|i| i as usize).collect())
                .unwrap_or_default();
            let value = entry.get("value").and_then(Value::as_f64);
            match (indices.as_slice(), value) {
                ([i, j, k, l], Some(value)) => Ok(DihedralConstraint {
                    indices: [*i, *j, *k, *l],
                    value,
                }),
                _ => Err(ComputeError::Input(
                    "dihedral constraint needs 4 indices and a value".into(),
                )),
            }
        })
        .collect()
}

impl OptimizationStrategy for DescentStrategy {
    fn name(&self) -> &'static str {
        "descent"
    }

    fn get_version(&self) -> Option<String> {
        Some(env!("CARGO_PKG_VERSION").to_string())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn propose(
        &self,
        history: &[StepRecord<'_>],
        keywords: &Map<String, Value>,
    ) -> Result<StepDecision, ComputeError> {
        let last = history
            .last()
            .ok_or_else(|| ComputeError::Input("propose called with empty history".into()))?;

        let step_size = keyword_f64(keywords, "step_size", DEFAULT_STEP_SIZE)?;
        let max_displacement = keyword_f64(keywords, "max_displacement", DEFAULT_MAX_DISPLACEMENT)?;
        let g_tol = keyword_f64(keywords, "gradient_tolerance", DEFAULT_GRADIENT_TOLERANCE)?;
        let e_tol = keyword_f64(keywords, "energy_tolerance", DEFAULT_ENERGY_TOLERANCE)?;
        let constraints = parse_constraints(keywords)?;

        // Convergence: tiny gradient on an unconstrained surface, or energy
        // stalled between the last two accepted steps when constrained (the
        // raw gradient keeps a component along a pinned coordinate).
        let max_abs_gradient = last.gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
        if constraints.is_empty() && max_abs_gradient < g_tol {
            return Ok(StepDecision::Converged);
        }
        if history.len() >= 2 {
            let previous = &history[history.len() - 2];
            if (last.energy - previous.energy).abs() < e_tol {
                return Ok(StepDecision::Converged);
            }
        }

        // Downhill step, clamped to the trust displacement.
        let mut scale = step_size;
        if max_abs_gradient * step_size > max_displacement {
            scale = max_displacement / max_abs_gradient;
        }
        let mut next = last.molecule.clone();
        for (coord, g) in next.geometry.iter_mut().zip(last.gradient) {
            *coord -= scale * g;
        }
        for constraint in &constraints {
            next.set_dihedral(constraint.indices, constraint.value);
        }
        Ok(StepDecision::Step(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::lennard_jones::energy_and_gradient;
    use crate::models::Molecule;

    fn dimer(separation: f64) -> Molecule {
        Molecule::new(
            vec!["He".into(), "He".into()],
            vec![0.0, 0.0, 0.0, 0.0, 0.0, separation],
        )
        .unwrap()
    }

    #[test]
    fn test_converges_on_small_gradient() {
        let molecule = dimer(2.0_f64.powf(1.0 / 6.0) * 3.0);
        let (energy, gradient) = energy_and_gradient(&molecule, 1.0, 3.0);
        let history = [StepRecord {
            molecule: &molecule,
            energy,
            gradient: &gradient,
        }];
        let decision = DescentStrategy.propose(&history, &Map::new()).unwrap();
        assert!(matches!(decision, StepDecision::Converged));
    }

    #[test]
    fn test_steps_downhill() {
        let molecule = dimer(4.0);
        let (energy, gradient) = energy_and_gradient(&molecule, 1.0, 3.0);
        let history = [StepRecord {
            molecule: &molecule,
            energy,
            gradient: &gradient,
        }];
        let decision = DescentStrategy.propose(&history, &Map::new()).unwrap();
        let StepDecision::Step(next) = decision else {
            panic!("expected a step");
        };
        let (next_energy, _) = energy_and_gradient(&next, 1.0, 3.0);
        assert!(next_energy < energy, "{next_energy} !< {energy}");
    }

    #[test]
    fn test_pinned_dihedral_survives_step() {
        let molecule = Molecule::new(
            vec!["H".into(), "He".into(), "He".into(), "H".into()],
            vec![
                3.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, //
                0.0, 0.0, 3.2, //
                0.0, 3.0, 3.2,
            ],
        )
        .unwrap();
        let (energy, gradient) = energy_and_gradient(&molecule, 1.0, 3.0);
        let history = [StepRecord {
            molecule: &molecule,
            energy,
            gradient: &gradient,
        }];
        let mut keywords = Map::new();
        keywords.insert(
            "constraints".into(),
            serde_json::json!({
                "set": [{"type": "dihedral", "indices": [0, 1, 2, 3], "value": 90.0}]
            }),
        );
        let decision = DescentStrategy.propose(&history, &keywords).unwrap();
        let StepDecision::Step(next) = decision else {
            panic!("expected a step");
        };
        assert!((next.measure_dihedral([0, 1, 2, 3]) - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_unsupported_constraint_type_rejected() {
        let molecule = dimer(4.0);
        let (energy, gradient) = energy_and_gradient(&molecule, 1.0, 3.0);
        let history = [StepRecord {
            molecule: &molecule,
            energy,
            gradient: &gradient,
        }];
        let mut keywords = Map::new();
        keywords.insert(
            "constraints".into(),
            serde_json::json!({"set": [{"type": "angle", "indices": [0, 1, 2], "value": 90.0}]}),
        );
        let err = DescentStrategy.propose(&history, &keywords).unwrap_err();
        assert_eq!(err.error_type(), "input_error");
    }
}
