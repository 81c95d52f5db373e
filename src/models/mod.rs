// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod molecule;
mod result;
mod task;

pub use molecule::Molecule;
pub use result::{ProgramOutput, Provenance, ResultRecord};
pub use task::{Driver, InputSpecification, Model, Protocols, Task, TrajectoryProtocol};
