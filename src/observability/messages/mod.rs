// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.

use tracing::Span;

pub mod dispatch;
pub mod procedure;
pub mod workspace;

/// Emit the message as a structured tracing event, or open a span carrying
/// its fields.
pub trait StructuredLog: std::fmt::Display {
    fn log(&self);

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("qcdispatch", span_name = name)
    }
}
