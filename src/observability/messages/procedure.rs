// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for procedure orchestration events.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::Span;

use crate::observability::messages::StructuredLog;

/// One optimization step finished and was appended to the trajectory.
pub struct OptimizationStepCompleted<'a> {
    pub procedure: &'a str,
    pub iteration: usize,
    pub energy: f64,
}

impl Display for OptimizationStepCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} step {}: energy = {:.10}",
            self.procedure, self.iteration, self.energy
        )
    }
}

impl StructuredLog for OptimizationStepCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            procedure = self.procedure,
            iteration = self.iteration,
            energy = self.energy,
            "{}", self
        );
    }
}

/// An iterative procedure reached a terminal state.
pub struct OptimizationFinished<'a> {
    pub procedure: &'a str,
    pub converged: bool,
    pub iterations: usize,
    pub duration: Duration,
}

impl Display for OptimizationFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} after {} iterations in {:?}",
            self.procedure,
            if self.converged { "converged" } else { "failed" },
            self.iterations,
            self.duration
        )
    }
}

impl StructuredLog for OptimizationFinished<'_> {
    fn log(&self) {
        if self.converged {
            tracing::info!(
                procedure = self.procedure,
                iterations = self.iterations,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        } else {
            tracing::warn!(
                procedure = self.procedure,
                iterations = self.iterations,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("optimization", span_name = name, procedure = self.procedure)
    }
}

/// A grid point was scheduled for constrained optimization.
pub struct GridPointScheduled<'a> {
    pub label: &'a str,
    pub wave: usize,
    pub seed_energy: Option<f64>,
}

impl Display for GridPointScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.seed_energy {
            Some(energy) => write!(
                f,
                "Grid point {} scheduled in wave {} (seed energy {:.10})",
                self.label, self.wave, energy
            ),
            None => write!(f, "Grid point {} scheduled in wave {}", self.label, self.wave),
        }
    }
}

impl StructuredLog for GridPointScheduled<'_> {
    fn log(&self) {
        tracing::debug!(label = self.label, wave = self.wave, "{}", self);
    }
}

/// A grid scan reached its terminal state.
pub struct ScanFinished {
    pub points: usize,
    pub converged: usize,
    pub duration: Duration,
}

impl Display for ScanFinished {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Scan finished: {}/{} grid points converged in {:?}",
            self.converged, self.points, self.duration
        )
    }
}

impl StructuredLog for ScanFinished {
    fn log(&self) {
        tracing::info!(
            points = self.points,
            converged = self.converged,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }
}
