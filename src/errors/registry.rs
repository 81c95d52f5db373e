// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors produced when resolving a program or procedure by name.
///
/// "Not found" means the name was never registered with this engine;
/// "unavailable" means the name is known but the backing software is not
/// installed or importable on this host. Operators see the distinction in
/// the `info` listing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("program '{0}' is not registered with this engine")]
    ProgramNotFound(String),

    #[error("program '{0}' is registered but not available on this host")]
    ProgramUnavailable(String),

    #[error("procedure '{0}' is not registered with this engine")]
    ProcedureNotFound(String),

    #[error("procedure '{0}' is registered but not available on this host")]
    ProcedureUnavailable(String),
}
