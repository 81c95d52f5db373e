// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Torsion grid scan.
//!
//! Maps a potential-energy surface over one or more dihedral angles: every
//! grid point gets a constrained geometry optimization with the scanned
//! dihedrals pinned to the point's angles. The scan spreads outward from
//! the initial structures in waves — each wave optimizes every unvisited
//! point adjacent to an already-computed one, seeded from its lowest-energy
//! computed neighbor, so downhill information propagates across the grid.
//!
//! Points within a wave are independent and run concurrently, capped so the
//! scan never oversubscribes the host core budget.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{self, TaskConfig};
use crate::dispatch::{Dispatcher, RunOptions};
use crate::errors::{ComputeError, StructuredError};
use crate::models::{InputSpecification, Molecule, Protocols, Provenance};
use crate::observability::messages::procedure::{GridPointScheduled, ScanFinished};
use crate::observability::messages::StructuredLog;
use crate::procedures::optimization::{OptimizationInput, OptimizationKeywords, OptimizationOutput, OptimizationRunner};
use crate::registry::ProcedureRegistry;

/// Which dihedrals to scan and how finely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanKeywords {
    /// Atom index quadruples, one per scanned dimension.
    pub dihedrals: Vec<[usize; 4]>,
    /// Grid spacing in degrees per dimension; must evenly divide 360.
    pub grid_spacing: Vec<i64>,
}

/// How each grid point's constrained optimization is performed. `keywords`
/// must carry at least the target `program`; any `constraints` block inside
/// is threaded through to the strategy untouched, with the pinned scan
/// dihedrals appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationSpecification {
    pub procedure: String,
    #[serde(default)]
    pub keywords: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Protocols>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorsionScanInput {
    pub keywords: ScanKeywords,
    /// Specification for the gradient sub-tasks inside each optimization.
    pub input_specification: InputSpecification,
    pub initial_molecules: Vec<Molecule>,
    pub optimization_spec: OptimizationSpecification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorsionScanOutput {
    pub success: bool,
    /// Every optimization run per grid-point label, in completion order.
    pub optimization_history: BTreeMap<String, Vec<OptimizationOutput>>,
    /// Lowest-energy converged geometry per label.
    pub final_molecules: BTreeMap<String, Molecule>,
    pub final_energies: BTreeMap<String, f64>,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StructuredError>,
}

/// One scanned grid point, as angles in `(-180, 180]` per dimension.
type GridPoint = Vec<i64>;

fn wrap_angle(angle: i64) -> i64 {
    let mut angle = angle % 360;
    if angle > 180 {
        angle -= 360;
    }
    if angle <= -180 {
        angle += 360;
    }
    angle
}

/// All angles of one axis, ascending, in `(-180, 180]`.
fn axis_angles(spacing: i64) -> Result<Vec<i64>, ComputeError> {
    if spacing <= 0 || 360 % spacing != 0 {
        return Err(ComputeError::Input(format!(
            "grid spacing must be a positive divisor of 360, got {spacing}"
        )));
    }
    let mut angles: Vec<i64> = (0..360 / spacing).map(|k| 180 - k * spacing).collect();
    angles.sort_unstable();
    Ok(angles)
}

fn grid_points(axes: &[Vec<i64>]) -> Vec<GridPoint> {
    let mut points: Vec<GridPoint> = vec![Vec::new()];
    for axis in axes {
        points = points
            .into_iter()
            .flat_map(|stem| {
                axis.iter().map(move |angle| {
                    let mut point = stem.clone();
                    point.push(*angle);
                    point
                })
            })
            .collect();
    }
    points
}

fn label(point: &[i64]) -> String {
    point
        .iter()
        .map(|angle| angle.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Grid neighbors one step away along each axis, wrapped. At spacing 180
/// both directions land on the same point, hence the set.
fn neighbors(point: &[i64], spacings: &[i64]) -> BTreeSet<GridPoint> {
    let mut out = BTreeSet::new();
    for (axis, spacing) in spacings.iter().enumerate() {
        for step in [-spacing, *spacing] {
            let mut neighbor = point.to_vec();
            neighbor[axis] = wrap_angle(point[axis] + step);
            if neighbor != point {
                out.insert(neighbor);
            }
        }
    }
    out
}

fn circular_distance(a: f64, b: f64) -> f64 {
    ((a - b + 180.0).rem_euclid(360.0) - 180.0).abs()
}

/// Nearest grid point to the molecule's measured dihedrals.
fn snap(molecule: &Molecule, dihedrals: &[[usize; 4]], axes: &[Vec<i64>]) -> GridPoint {
    dihedrals
        .iter()
        .zip(axes)
        .map(|(quad, axis)| {
            let measured = molecule.measure_dihedral(*quad);
            axis.iter()
                .copied()
                .min_by(|a, b| {
                    circular_distance(measured, *a as f64)
                        .total_cmp(&circular_distance(measured, *b as f64))
                })
                .unwrap_or(0)
        })
        .collect()
}

#[derive(Clone)]
pub struct TorsionScanRunner {
    dispatcher: Dispatcher,
    procedures: ProcedureRegistry,
}

impl TorsionScanRunner {
    pub fn new(dispatcher: Dispatcher, procedures: ProcedureRegistry) -> Self {
        Self { dispatcher, procedures }
    }

    pub async fn run(
        &self,
        input: &TorsionScanInput,
        config: &TaskConfig,
        options: &RunOptions,
    ) -> Result<TorsionScanOutput, ComputeError> {
        let started = Instant::now();

        if input.keywords.dihedrals.is_empty() {
            return Err(ComputeError::Input("at least one dihedral is required".into()));
        }
        if input.keywords.dihedrals.len() != input.keywords.grid_spacing.len() {
            return Err(ComputeError::Input(format!(
                "{} dihedrals but {} grid spacings",
                input.keywords.dihedrals.len(),
                input.keywords.grid_spacing.len()
            )));
        }
        if input.initial_molecules.is_empty() {
            return Err(ComputeError::Input("at least one initial molecule is required".into()));
        }

        let strategy = self
            .procedures
            .resolve(&input.optimization_spec.procedure)
            .map_err(|e| ComputeError::Resource(e.to_string()))?;
        let opt_keywords: OptimizationKeywords =
            serde_json::from_value(Value::Object(input.optimization_spec.keywords.clone()))
                .map_err(|e| {
                    ComputeError::Input(format!("invalid optimization keywords: {e}"))
                })?;

        let axes: Vec<Vec<i64>> = input
            .keywords
            .grid_spacing
            .iter()
            .map(|s| axis_angles(*s))
            .collect::<Result<_, _>>()?;
        let all_points = grid_points(&axes);

        // The scan-level core budget caps how many optimizations run at
        // once; each optimization gets a derived sub-config and the parent
        // config is never mutated.
        let resolved = config.resolve(config::global())?;
        let per_opt = resolved.per_rank();
        let cap = (resolved.ncores / per_opt.ncores).max(1);
        let sub_config = TaskConfig {
            ncores: Some(per_opt.ncores),
            memory_gib: Some(per_opt.memory_gib),
            ..config.clone()
        };

        let mut history: BTreeMap<String, Vec<OptimizationOutput>> = BTreeMap::new();
        // Lowest converged energy and its geometry, per point.
        let mut computed: BTreeMap<GridPoint, (f64, Molecule)> = BTreeMap::new();
        let mut visited: BTreeSet<GridPoint> = BTreeSet::new();

        // Wave zero: every initial structure, snapped onto the grid.
        let mut wave: Vec<(GridPoint, Molecule, Option<f64>)> = Vec::new();
        for molecule in &input.initial_molecules {
            let point = snap(molecule, &input.keywords.dihedrals, &axes);
            visited.insert(point.clone());
            wave.push((point, molecule.clone(), None));
        }

        let semaphore = Arc::new(Semaphore::new(cap));
        let mut wave_index = 0usize;
        while !wave.is_empty() {
            let mut running: JoinSet<(GridPoint, Result<OptimizationOutput, ComputeError>)> =
                JoinSet::new();
            for (point, seed, seed_energy) in wave.drain(..) {
                GridPointScheduled {
                    label: &label(&point),
                    wave: wave_index,
                    seed_energy,
                }
                .log();
                let opt_input = constrained_input(input, &opt_keywords, &point, &seed);
                let runner = OptimizationRunner::new(self.dispatcher.clone(), strategy.clone());
                let sub_config = sub_config.clone();
                let sub_options = RunOptions {
                    raise_error: false,
                    cancel: options.cancel.clone(),
                };
                let permits = semaphore.clone();
                running.spawn(async move {
                    // The semaphore is never closed; a closed-error here is
                    // unreachable.
                    let _permit = permits.acquire_owned().await.ok();
                    let output = runner.run(&opt_input, &sub_config, &sub_options).await;
                    (point, output)
                });
            }

            while let Some(joined) = running.join_next().await {
                let (point, result) = joined.map_err(|e| {
                    ComputeError::unknown(format!("grid point worker panicked: {e}"))
                })?;
                let output = result?;
                if output.success {
                    if let Some(energy) = output.final_energy() {
                        let best = computed
                            .entry(point.clone())
                            .or_insert((f64::INFINITY, output.final_molecule.clone()));
                        if energy < best.0 {
                            *best = (energy, output.final_molecule.clone());
                        }
                    }
                }
                history.entry(label(&point)).or_default().push(output);
            }

            // Next wave: every unvisited neighbor of a computed point,
            // seeded from its lowest-energy computed neighbor.
            wave_index += 1;
            let mut frontier: BTreeSet<GridPoint> = BTreeSet::new();
            for point in computed.keys() {
                for neighbor in neighbors(point, &input.keywords.grid_spacing) {
                    if !visited.contains(&neighbor) {
                        frontier.insert(neighbor);
                    }
                }
            }
            for point in frontier {
                let seed = neighbors(&point, &input.keywords.grid_spacing)
                    .into_iter()
                    .filter_map(|n| computed.get(&n))
                    .min_by(|a, b| a.0.total_cmp(&b.0));
                if let Some((energy, molecule)) = seed {
                    let (energy, molecule) = (*energy, molecule.clone());
                    visited.insert(point.clone());
                    wave.push((point, molecule, Some(energy)));
                }
            }
        }

        let converged = all_points
            .iter()
            .filter(|point| computed.contains_key(*point))
            .count();
        let success = converged == all_points.len();
        ScanFinished {
            points: all_points.len(),
            converged,
            duration: started.elapsed(),
        }
        .log();

        let error = if success {
            None
        } else {
            // Prefer the first concrete sub-failure over the generic count.
            history
                .values()
                .flatten()
                .find_map(|output| output.error.clone())
                .or_else(|| {
                    Some(StructuredError {
                        error_type: "unknown_error".into(),
                        error_message: format!(
                            "{} of {} grid points failed to converge",
                            all_points.len() - converged,
                            all_points.len()
                        ),
                        raw_output: None,
                    })
                })
        };
        if let (Some(error), true) = (&error, options.raise_error) {
            return Err(error.clone().into_compute_error());
        }

        let mut final_molecules = BTreeMap::new();
        let mut final_energies = BTreeMap::new();
        for (point, (energy, molecule)) in &computed {
            final_molecules.insert(label(point), molecule.clone());
            final_energies.insert(label(point), *energy);
        }

        Ok(TorsionScanOutput {
            success,
            optimization_history: history,
            final_molecules,
            final_energies,
            provenance: Provenance {
                creator: "torsion-scan".into(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                walltime_seconds: started.elapsed().as_secs_f64(),
                ncores: resolved.ncores,
                memory_gib: resolved.memory_gib,
                retries: None,
                hostname: config::global().hostname.clone(),
                pid: std::process::id(),
            },
            stdout: success
                .then(|| "All optimizations converged at lowest energy. Job Finished!\n".to_string()),
            error,
        })
    }
}

/// Build the sub-optimization for one grid point: the seed geometry with the
/// scanned dihedrals rotated to the target angles, and those same dihedrals
/// appended as pinned constraints alongside whatever the caller supplied.
fn constrained_input(
    input: &TorsionScanInput,
    opt_keywords: &OptimizationKeywords,
    point: &[i64],
    seed: &Molecule,
) -> OptimizationInput {
    let mut molecule = seed.clone();
    for (quad, angle) in input.keywords.dihedrals.iter().zip(point) {
        molecule.set_dihedral(*quad, *angle as f64);
    }

    let mut keywords = opt_keywords.clone();
    let constraints = keywords
        .extras
        .entry("constraints".to_string())
        .or_insert_with(|| serde_json::json!({ "set": [] }));
    if let Some(set) = constraints.get_mut("set").and_then(Value::as_array_mut) {
        for (quad, angle) in input.keywords.dihedrals.iter().zip(point) {
            set.push(serde_json::json!({
                "type": "dihedral",
                "indices": quad,
                "value": *angle as f64,
            }));
        }
    }

    OptimizationInput {
        specification: input.input_specification.clone(),
        initial_molecule: molecule,
        keywords,
        protocols: input.optimization_spec.protocols,
        restart_state: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_angles_cover_half_open_range() {
        assert_eq!(axis_angles(180).unwrap(), vec![0, 180]);
        assert_eq!(axis_angles(90).unwrap(), vec![-90, 0, 90, 180]);
        assert_eq!(axis_angles(120).unwrap(), vec![-60, 60, 180]);
        assert!(axis_angles(0).is_err());
        assert!(axis_angles(77).is_err());
    }

    #[test]
    fn test_wrap_angle_half_open() {
        assert_eq!(wrap_angle(180), 180);
        assert_eq!(wrap_angle(-180), 180);
        assert_eq!(wrap_angle(270), -90);
        assert_eq!(wrap_angle(360), 0);
        assert_eq!(wrap_angle(-270), 90);
    }

    #[test]
    fn test_neighbors_dedupe_at_spacing_180() {
        let n = neighbors(&[0], &[180]);
        assert_eq!(n.into_iter().collect::<Vec<_>>(), vec![vec![180]]);
        let n = neighbors(&[180], &[90]);
        assert_eq!(n.into_iter().collect::<Vec<_>>(), vec![vec![-90], vec![90]]);
    }

    #[test]
    fn test_grid_points_are_cartesian_product() {
        let axes = vec![vec![0, 180], vec![-90, 0, 90, 180]];
        assert_eq!(grid_points(&axes).len(), 8);
    }

    #[test]
    fn test_labels_join_dimensions() {
        assert_eq!(label(&[0]), "0");
        assert_eq!(label(&[-90, 180]), "-90,180");
    }

    #[test]
    fn test_snap_picks_nearest_with_wraparound() {
        let molecule = Molecule::new(
            vec!["H".into(), "He".into(), "He".into(), "H".into()],
            vec![
                3.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, //
                0.0, 0.0, 3.2, //
                -2.9, -0.4, 3.2,
            ],
        )
        .unwrap();
        // The measured dihedral is a few degrees past +/-180; the nearest
        // grid point at spacing 90 is 180 either way.
        let axes = vec![axis_angles(90).unwrap()];
        let point = snap(&molecule, &[[0, 1, 2, 3]], &axes);
        assert_eq!(point, vec![180]);
    }
}
