// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Task submission types.
//!
//! A [`Task`] is the already-validated description of one computation: what
//! to compute ([`InputSpecification`]), on which structure ([`Molecule`]),
//! and which parts of the result to retain ([`Protocols`]). Tasks are owned
//! by the caller and never mutated after submission.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Molecule;

/// What quantity the backend is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Energy,
    Gradient,
    Hessian,
    Properties,
}

/// Level-of-theory identifier understood by the target program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpecification {
    pub driver: Driver,
    pub model: Model,
    #[serde(default)]
    pub keywords: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

/// Retention policy for trajectory entries produced by iterative procedures.
///
/// Pruning is applied post-hoc; it never changes how many computations ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryProtocol {
    #[default]
    All,
    InitialAndFinal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Protocols {
    #[serde(default)]
    pub trajectory: TrajectoryProtocol,
}

/// One unit of requested computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub specification: InputSpecification,
    pub molecule: Molecule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Protocols>,
}
