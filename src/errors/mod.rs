// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod compute;
mod registry;

pub use compute::{ComputeError, ErrorKind, StructuredError};
pub use registry::RegistryError;
