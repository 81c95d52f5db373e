// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Default values applied when a task config leaves a field unset and the
//! host defaults carry no override.

/// Re-attempts granted to transiently failing computations.
pub const DEFAULT_RETRIES: u32 = 2;

/// Node count assumed when none is configured.
pub const DEFAULT_NNODES: usize = 1;

/// Memory budget assumed when host memory cannot be detected.
pub const DEFAULT_MEMORY_GIB: f64 = 4.0;

/// MPI launch template. Placeholders are substituted at render time.
pub const DEFAULT_MPIEXEC_COMMAND: &str = "mpiexec -n {total_ranks} -ppn {ranks_per_node}";

/// Environment variable naming a YAML host-defaults file loaded at startup.
pub const HOST_CONFIG_ENV: &str = "QCDISPATCH_HOST_CONFIG";
