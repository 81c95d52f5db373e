// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod consts;
mod host;
mod task;

pub use consts::HOST_CONFIG_ENV;
pub use host::{global, global_repr, initialize, HostDefaults};
pub use task::{ResolvedConfig, TaskConfig};
