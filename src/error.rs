// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the verification guard.
//!
//! Rate limit denials are not errors; they are reported through
//! [`RateLimitResult`](crate::limiter::RateLimitResult).

use thiserror::Error;

/// Failures surfaced by the cleanup coordinator.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// A cleanup pass is already in flight. Requests are rejected, not queued.
    #[error("cleanup already running")]
    AlreadyRunning,

    /// A collaborator call failed; the coordinator was released before this surfaced.
    #[error("collaborator failure: {0}")]
    CollaboratorFailure(#[source] anyhow::Error),
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("{0} must be a non-zero duration")]
    ZeroWindow(&'static str),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CleanupError>;
