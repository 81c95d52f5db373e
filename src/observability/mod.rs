// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging message types.
//!
//! Diagnostic events are struct-based messages implementing `Display` plus
//! the [`messages::StructuredLog`] trait, keeping log strings out of the
//! control-flow code and the field names stable for log consumers.
//!
//! Messages are organized by subsystem:
//! * `messages::dispatch` - single-call dispatch lifecycle and retries
//! * `messages::procedure` - iterative and grid procedure progress
//! * `messages::workspace` - scratch workspace acquisition and release

pub mod messages;
