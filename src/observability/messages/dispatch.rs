// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for single-call dispatch events.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::Span;

use crate::observability::messages::StructuredLog;

/// A computation is about to run with resolved resources.
pub struct ComputeStarted<'a> {
    pub program: &'a str,
    pub ncores: usize,
    pub memory_gib: f64,
}

impl Display for ComputeStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatching to {}: ncores={}, memory={:.1} GiB",
            self.program, self.ncores, self.memory_gib
        )
    }
}

impl StructuredLog for ComputeStarted<'_> {
    fn log(&self) {
        tracing::info!(
            program = self.program,
            ncores = self.ncores,
            memory_gib = self.memory_gib,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "compute",
            span_name = name,
            program = self.program,
            ncores = self.ncores,
        )
    }
}

/// A transient failure is being retried.
pub struct ComputeRetry<'a> {
    pub program: &'a str,
    pub attempt: u32,
    pub max_retries: u32,
    pub error: &'a str,
}

impl Display for ComputeRetry<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Transient failure from {} (attempt {}/{}): {}",
            self.program,
            self.attempt,
            self.max_retries + 1,
            self.error
        )
    }
}

impl StructuredLog for ComputeRetry<'_> {
    fn log(&self) {
        tracing::warn!(
            program = self.program,
            attempt = self.attempt,
            max_retries = self.max_retries,
            error = self.error,
            "{}", self
        );
    }
}

/// A computation finished successfully.
pub struct ComputeCompleted<'a> {
    pub program: &'a str,
    pub duration: Duration,
    pub retries: u32,
}

impl Display for ComputeCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} completed in {:?} ({} retries)",
            self.program, self.duration, self.retries
        )
    }
}

impl StructuredLog for ComputeCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            program = self.program,
            duration_ms = self.duration.as_millis() as u64,
            retries = self.retries,
            "{}", self
        );
    }
}

/// A computation terminally failed.
pub struct ComputeFailed<'a> {
    pub program: &'a str,
    pub error_type: &'a str,
    pub error: &'a str,
}

impl Display for ComputeFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} failed ({}): {}", self.program, self.error_type, self.error)
    }
}

impl StructuredLog for ComputeFailed<'_> {
    fn log(&self) {
        tracing::error!(
            program = self.program,
            error_type = self.error_type,
            error = self.error,
            "{}", self
        );
    }
}
