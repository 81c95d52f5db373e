// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;      // program harnesses + optimization strategies
pub mod config;        // host defaults + per-task resource config
pub mod dispatch;      // single-call execution with retry policy
pub mod errors;        // error taxonomy
pub mod models;        // tasks, molecules, result records
pub mod observability;
pub mod procedures;    // optimization + torsion scan orchestration
pub mod registry;      // name-to-harness resolution
pub mod traits;        // backend and optimizer seams
pub mod workspace;     // scratch directory lifecycle
