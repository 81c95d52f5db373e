// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in program harnesses and optimizer strategies.
//!
//! Real production backends live outside this crate and plug in through
//! [`ProgramHarness`](crate::traits::ProgramHarness); the harnesses here are
//! the ones the engine ships with — a pure-Rust force field that is always
//! available, a scripted failure injector for exercising the retry policy,
//! and a generic wrapper for external executables.

mod descent;
mod external;
mod failure_injection;
mod lennard_jones;

pub use descent::DescentStrategy;
pub use external::ExternalHarness;
pub use failure_injection::{FailureInjectionHarness, FailureMode};
pub use lennard_jones::LennardJonesHarness;
