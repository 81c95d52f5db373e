// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Molecular structure representation.
//!
//! A molecule is a flat list of element symbols plus a packed Cartesian
//! geometry (3 coordinates per atom, in Bohr). The engine never interprets
//! chemistry; it only needs enough geometry support to measure and pin the
//! coordinates that procedures scan over.

use serde::{Deserialize, Serialize};

use crate::errors::ComputeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub symbols: Vec<String>,
    pub geometry: Vec<f64>,
}

impl Molecule {
    /// Build a molecule, validating that the geometry is 3 coordinates per atom.
    pub fn new(symbols: Vec<String>, geometry: Vec<f64>) -> Result<Self, ComputeError> {
        if geometry.len() != symbols.len() * 3 {
            return Err(ComputeError::Input(format!(
                "geometry has {} values but {} atoms require {}",
                geometry.len(),
                symbols.len(),
                symbols.len() * 3
            )));
        }
        Ok(Self { symbols, geometry })
    }

    pub fn natoms(&self) -> usize {
        self.symbols.len()
    }

    fn coord(&self, atom: usize) -> [f64; 3] {
        [
            self.geometry[3 * atom],
            self.geometry[3 * atom + 1],
            self.geometry[3 * atom + 2],
        ]
    }

    /// Distance between two atoms, in Bohr.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        let a = self.coord(i);
        let b = self.coord(j);
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
    }

    /// Signed dihedral angle i-j-k-l in degrees, in (-180, 180].
    pub fn measure_dihedral(&self, atoms: [usize; 4]) -> f64 {
        let [i, j, k, l] = atoms;
        let p0 = self.coord(i);
        let p1 = self.coord(j);
        let p2 = self.coord(k);
        let p3 = self.coord(l);

        let b0 = sub(p1, p0);
        let b1 = sub(p2, p1);
        let b2 = sub(p3, p2);

        let n1 = cross(b0, b1);
        let n2 = cross(b1, b2);
        let m1 = cross(n1, normalize(b1));

        let x = dot(n1, n2);
        let y = dot(m1, n2);

        let mut angle = y.atan2(x).to_degrees();
        // Normalize to (-180, 180] so grid labels are unambiguous.
        if angle <= -180.0 {
            angle += 360.0;
        }
        angle
    }

    /// Rotate the terminal atom `l` about the j-k axis so that the dihedral
    /// i-j-k-l equals `target_deg`.
    ///
    /// Only the terminal atom moves; the engine has no connectivity model, so
    /// callers that need a whole group rotated must supply the group as the
    /// terminal side of the torsion.
    pub fn set_dihedral(&mut self, atoms: [usize; 4], target_deg: f64) {
        let current = self.measure_dihedral(atoms);
        let delta = (target_deg - current).to_radians();
        if delta.abs() < 1e-12 {
            return;
        }

        let [_, j, k, l] = atoms;
        let axis = normalize(sub(self.coord(k), self.coord(j)));
        let origin = self.coord(k);
        let p = sub(self.coord(l), origin);

        // Rodrigues rotation of p around the axis by delta.
        let cos_t = delta.cos();
        let sin_t = delta.sin();
        let rotated = [
            p[0] * cos_t + cross(axis, p)[0] * sin_t + axis[0] * dot(axis, p) * (1.0 - cos_t),
            p[1] * cos_t + cross(axis, p)[1] * sin_t + axis[1] * dot(axis, p) * (1.0 - cos_t),
            p[2] * cos_t + cross(axis, p)[2] * sin_t + axis[2] * dot(axis, p) * (1.0 - cos_t),
        ];

        self.geometry[3 * l] = origin[0] + rotated[0];
        self.geometry[3 * l + 1] = origin[1] + rotated[1];
        self.geometry[3 * l + 2] = origin[2] + rotated[2];
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: [f64; 3]) -> [f64; 3] {
    let n = dot(a, a).sqrt();
    [a[0] / n, a[1] / n, a[2] / n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Molecule {
        // Four-atom chain with a 90 degree dihedral 0-1-2-3.
        Molecule::new(
            vec!["H".into(), "He".into(), "He".into(), "H".into()],
            vec![
                1.0, 0.0, 0.0, // atom 0
                0.0, 0.0, 0.0, // atom 1
                0.0, 0.0, 1.5, // atom 2
                0.0, 1.0, 1.5, // atom 3
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_geometry_length_validated() {
        let result = Molecule::new(vec!["H".into(), "H".into()], vec![0.0, 0.0, 0.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_distance() {
        let mol = chain();
        assert!((mol.distance(1, 2) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_measure_dihedral() {
        let mol = chain();
        let angle = mol.measure_dihedral([0, 1, 2, 3]);
        assert!((angle.abs() - 90.0).abs() < 1e-9, "got {angle}");
    }

    #[test]
    fn test_set_dihedral_reaches_target() {
        let mut mol = chain();
        for target in [0.0, 60.0, -120.0, 180.0] {
            mol.set_dihedral([0, 1, 2, 3], target);
            let measured = mol.measure_dihedral([0, 1, 2, 3]);
            let wrapped = if target <= -180.0 { target + 360.0 } else { target };
            assert!(
                (measured - wrapped).abs() < 1e-6,
                "target {target} measured {measured}"
            );
        }
    }

    #[test]
    fn test_set_dihedral_moves_only_terminal_atom() {
        let mol = chain();
        let mut moved = mol.clone();
        moved.set_dihedral([0, 1, 2, 3], 45.0);
        assert_eq!(&mol.geometry[..9], &moved.geometry[..9]);
        assert_ne!(&mol.geometry[9..], &moved.geometry[9..]);
    }
}
