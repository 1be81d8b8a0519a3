// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Verification Guard
//!
//! In-memory abuse protection for an email verification flow:
//!
//! - Per-identifier verification attempt limits (fixed window)
//! - Per-email resend limits with a resend cooldown
//! - Overall verification activity throttling
//! - Burst detection over cumulative attempts
//! - Security event audit log
//! - Single-flight cleanup coordinator with periodic scheduling
//!
//! Instances are constructed explicitly and shared through `Arc`; there is
//! no process-wide default.

pub mod cleanup;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod metrics;
pub mod telemetry;

pub use cleanup::{CleanupCoordinator, CleanupStats, CleanupSummary, SystemStatus};
pub use collaborators::{CodeStore, ServiceMonitor};
pub use config::{CleanupConfig, Config, RateLimiterConfig};
pub use error::{CleanupError, ConfigError};
pub use events::{SecurityEvent, SecurityEventType};
pub use limiter::{RateLimitReason, RateLimitResult, RateLimiter, RateLimiterStats};
pub use metrics::Metrics;
