// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod optimizer;
pub mod program;

pub use optimizer::{OptimizationStrategy, StepDecision, StepRecord};
pub use program::ProgramHarness;
