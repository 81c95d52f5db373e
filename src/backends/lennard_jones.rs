// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pairwise Lennard-Jones force field.
//!
//! Always available, no external software. Energies are `4ε[(σ/r)¹² −
//! (σ/r)⁶]` summed over atom pairs; ε and σ come from the task keywords
//! (`epsilon`, `sigma`) with benign defaults. Exists so procedures have a
//! real gradient surface to drive without a quantum-chemistry install.

use async_trait::async_trait;

use crate::config::ResolvedConfig;
use crate::errors::ComputeError;
use crate::models::{Driver, Molecule, ProgramOutput, Task};
use crate::traits::ProgramHarness;
use crate::workspace::Workspace;

const DEFAULT_EPSILON: f64 = 1.0;
const DEFAULT_SIGMA: f64 = 3.0;

#[derive(Debug, Default)]
pub struct LennardJonesHarness;

impl LennardJonesHarness {
    fn parameters(task: &Task) -> Result<(f64, f64), ComputeError> {
        let method = task.specification.model.method.to_lowercase();
        if method != "lj" && method != "lennard-jones" {
            return Err(ComputeError::Input(format!(
                "lennard-jones harness does not implement method '{}'",
                task.specification.model.method
            )));
        }
        let read = |key: &str, default: f64| -> Result<f64, ComputeError> {
            match task.specification.keywords.get(key) {
                None => Ok(default),
                Some(value) => value.as_f64().ok_or_else(|| {
                    ComputeError::Input(format!("keyword '{key}' must be a number, got {value}"))
                }),
            }
        };
        let epsilon = read("epsilon", DEFAULT_EPSILON)?;
        let sigma = read("sigma", DEFAULT_SIGMA)?;
        if epsilon <= 0.0 || sigma <= 0.0 {
            return Err(ComputeError::Input(
                "epsilon and sigma must be positive".into(),
            ));
        }
        Ok((epsilon, sigma))
    }
}

/// Energy and flattened gradient over all atom pairs.
pub(crate) fn energy_and_gradient(molecule: &Molecule, epsilon: f64, sigma: f64) -> (f64, Vec<f64>) {
    let n = molecule.natoms();
    let mut energy = 0.0;
    let mut gradient = vec![0.0; 3 * n];

    for i in 0..n {
        for j in (i + 1)..n {
            let r = molecule.distance(i, j);
            let sr6 = (sigma / r).powi(6);
            let sr12 = sr6 * sr6;
            energy += 4.0 * epsilon * (sr12 - sr6);

            // dE/dr, then distribute along the bond vector.
            let de_dr = 4.0 * epsilon * (-12.0 * sr12 + 6.0 * sr6) / r;
            for axis in 0..3 {
                let delta = molecule.geometry[3 * i + axis] - molecule.geometry[3 * j + axis];
                let component = de_dr * delta / r;
                gradient[3 * i + axis] += component;
                gradient[3 * j + axis] -= component;
            }
        }
    }
    (energy, gradient)
}

#[async_trait]
impl ProgramHarness for LennardJonesHarness {
    async fn compute(
        &self,
        task: &Task,
        workspace: &Workspace,
        _config: &ResolvedConfig,
    ) -> Result<ProgramOutput, ComputeError> {
        let (epsilon, sigma) = Self::parameters(task)?;
        if task.molecule.natoms() < 2 {
            return Err(ComputeError::Input(
                "lennard-jones requires at least two atoms".into(),
            ));
        }

        let (energy, gradient) = energy_and_gradient(&task.molecule, epsilon, sigma);
        let stdout = format!(
            "LJ pairwise evaluation: {} atoms, epsilon={epsilon}, sigma={sigma}\nenergy = {energy:.12}\n",
            task.molecule.natoms()
        );

        // Leave an artifact so messy workspaces have something to inspect.
        let log_path = workspace.path().join("lj.log");
        std::fs::write(&log_path, &stdout)
            .map_err(|e| ComputeError::Resource(format!("cannot write {}: {e}", log_path.display())))?;

        let mut output = ProgramOutput {
            stdout: Some(stdout),
            ..Default::default()
        };
        output
            .properties
            .insert("return_energy".into(), serde_json::json!(energy));
        match task.specification.driver {
            Driver::Energy => {
                output.return_result = serde_json::json!(energy);
            }
            Driver::Gradient => {
                output
                    .properties
                    .insert("return_gradient".into(), serde_json::json!(gradient));
                output.return_result = serde_json::json!(gradient);
            }
            other => {
                return Err(ComputeError::Input(format!(
                    "lennard-jones harness does not implement driver {other:?}"
                )));
            }
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "lennard-jones"
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
    use crate::config::{HostDefaults, TaskConfig};
    use crate::models::{InputSpecification, Model};

    fn dimer_task(driver: Driver, separation: f64) -> Task {
        Task {
            specification: InputSpecification {
                driver,
                model: Model {
                    method: "lj".into(),
                    basis: None,
                },
                keywords: Default::default(),
                extras: Default::default(),
            },
            molecule: Molecule::new(
                vec!["He".into(), "He".into()],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, separation],
            )
            .unwrap(),
            protocols: None,
        }
    }

    fn workspace() -> Workspace {
        let config = TaskConfig::default().resolve(&HostDefaults::detect()).unwrap();
        Workspace::acquire(&config).unwrap()
    }

    #[tokio::test]
    async fn test_energy_at_minimum_distance() {
        // Minimum of the LJ potential is at r = 2^(1/6) sigma with E = -epsilon.
        let r_min = 2.0_f64.powf(1.0 / 6.0) * DEFAULT_SIGMA;
        let harness = LennardJonesHarness;
        let output = harness
            .compute(&dimer_task(Driver::Energy, r_min), &workspace(), &test_config())
            .await
            .unwrap();
        let energy = output.return_result.as_f64().unwrap();
        assert!((energy + DEFAULT_EPSILON).abs() < 1e-10, "got {energy}");
    }

    #[tokio::test]
    async fn test_gradient_vanishes_at_minimum() {
        let r_min = 2.0_f64.powf(1.0 / 6.0) * DEFAULT_SIGMA;
        let harness = LennardJonesHarness;
        let output = harness
            .compute(&dimer_task(Driver::Gradient, r_min), &workspace(), &test_config())
            .await
            .unwrap();
        let gradient: Vec<f64> = serde_json::from_value(output.return_result).unwrap();
        assert!(gradient.iter().all(|g| g.abs() < 1e-10));
    }

    #[tokio::test]
    async fn test_unknown_method_is_input_error() {
        let mut task = dimer_task(Driver::Energy, 5.0);
        task.specification.model.method = "b3lyp".into();
        let err = LennardJonesHarness
            .compute(&task, &workspace(), &test_config())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "input_error");
    }

    fn test_config() -> ResolvedConfig {
        TaskConfig::default().resolve(&HostDefaults::detect()).unwrap()
    }
}
