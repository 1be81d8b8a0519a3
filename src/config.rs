// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the verification guard.
//!
//! Values can be supplied through serde (file or embedding application) or
//! read from the environment with [`Config::from_env`].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,

    /// Cleanup scheduling configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Limits for the verification flow. Immutable once handed to a limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Code submission attempts per identifier per window (default: 5)
    #[serde(default = "default_max_verification_attempts")]
    pub max_verification_attempts: u32,

    /// Verification attempt window in milliseconds (default: 15 minutes)
    #[serde(default = "default_verification_window_ms")]
    pub verification_window_ms: u64,

    /// Resend requests per (email, identifier) per window (default: 3)
    #[serde(default = "default_max_resend_requests")]
    pub max_resend_requests: u32,

    /// Resend window in milliseconds (default: 1 hour)
    #[serde(default = "default_resend_window_ms")]
    pub resend_window_ms: u64,

    /// Minimum spacing between resends to one email in milliseconds (default: 60000).
    /// Zero effectively disables the cooldown.
    #[serde(default = "default_resend_cooldown_ms")]
    pub resend_cooldown_ms: u64,

    /// Verification-related actions per identifier per window (default: 10)
    #[serde(default = "default_max_email_verification_requests")]
    pub max_email_verification_requests: u32,

    /// Email verification activity window in milliseconds (default: 1 hour)
    #[serde(default = "default_email_verification_window_ms")]
    pub email_verification_window_ms: u64,

    /// Cumulative attempts above `max_verification_attempts * suspicion_multiplier`
    /// are reported as suspicious (default: 2)
    #[serde(default = "default_suspicion_multiplier")]
    pub suspicion_multiplier: u32,

    /// Drop security events older than this during cleanup. `None` keeps them
    /// for the lifetime of the process.
    #[serde(default)]
    pub security_event_retention_ms: Option<u64>,
}

/// Cleanup coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Interval between scheduled cleanup runs in milliseconds (default: 1 hour)
    #[serde(default = "default_cleanup_interval_ms")]
    pub interval_ms: u64,

    /// Delay before the first scheduled run in milliseconds (default: 5000)
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Number of run records kept in the rolling history (default: 24)
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_max_verification_attempts() -> u32 {
    5
}

fn default_verification_window_ms() -> u64 {
    15 * 60 * 1000
}

fn default_max_resend_requests() -> u32 {
    3
}

fn default_resend_window_ms() -> u64 {
    60 * 60 * 1000
}

fn default_resend_cooldown_ms() -> u64 {
    60 * 1000
}

fn default_max_email_verification_requests() -> u32 {
    10
}

fn default_email_verification_window_ms() -> u64 {
    60 * 60 * 1000
}

fn default_suspicion_multiplier() -> u32 {
    2
}

fn default_cleanup_interval_ms() -> u64 {
    60 * 60 * 1000
}

fn default_startup_delay_ms() -> u64 {
    5000
}

fn default_history_capacity() -> usize {
    24
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_verification_attempts: default_max_verification_attempts(),
            verification_window_ms: default_verification_window_ms(),
            max_resend_requests: default_max_resend_requests(),
            resend_window_ms: default_resend_window_ms(),
            resend_cooldown_ms: default_resend_cooldown_ms(),
            max_email_verification_requests: default_max_email_verification_requests(),
            email_verification_window_ms: default_email_verification_window_ms(),
            suspicion_multiplier: default_suspicion_multiplier(),
            security_event_retention_ms: None,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_cleanup_interval_ms(),
            startup_delay_ms: default_startup_delay_ms(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl RateLimiterConfig {
    pub fn verification_window(&self) -> Duration {
        Duration::from_millis(self.verification_window_ms)
    }

    pub fn resend_window(&self) -> Duration {
        Duration::from_millis(self.resend_window_ms)
    }

    pub fn resend_cooldown(&self) -> Duration {
        Duration::from_millis(self.resend_cooldown_ms)
    }

    pub fn email_verification_window(&self) -> Duration {
        Duration::from_millis(self.email_verification_window_ms)
    }

    pub fn security_event_retention(&self) -> Option<Duration> {
        self.security_event_retention_ms.map(Duration::from_millis)
    }

    /// Cumulative attempt count above which activity is suspicious.
    pub fn suspicion_threshold(&self) -> u64 {
        u64::from(self.max_verification_attempts) * u64::from(self.suspicion_multiplier)
    }

    /// Reject limits that would deny every request or windows that never open.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_verification_attempts", self.max_verification_attempts),
            ("max_resend_requests", self.max_resend_requests),
            (
                "max_email_verification_requests",
                self.max_email_verification_requests,
            ),
            ("suspicion_multiplier", self.suspicion_multiplier),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroLimit(*name));
        }

        let windows = [
            ("verification_window_ms", self.verification_window_ms),
            ("resend_window_ms", self.resend_window_ms),
            (
                "email_verification_window_ms",
                self.email_verification_window_ms,
            ),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroWindow(*name));
        }

        Ok(())
    }
}

impl CleanupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroWindow("interval_ms"));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroLimit("history_capacity"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = RateLimiterConfig::default();
        let cleanup = CleanupConfig::default();

        Self {
            rate_limit: RateLimiterConfig {
                max_verification_attempts: env_or(
                    "VERIFICATION_MAX_ATTEMPTS",
                    defaults.max_verification_attempts,
                ),
                verification_window_ms: env_or(
                    "VERIFICATION_WINDOW_MS",
                    defaults.verification_window_ms,
                ),
                max_resend_requests: env_or("RESEND_MAX_REQUESTS", defaults.max_resend_requests),
                resend_window_ms: env_or("RESEND_WINDOW_MS", defaults.resend_window_ms),
                resend_cooldown_ms: env_or("RESEND_COOLDOWN_MS", defaults.resend_cooldown_ms),
                max_email_verification_requests: env_or(
                    "EMAIL_VERIFICATION_MAX_REQUESTS",
                    defaults.max_email_verification_requests,
                ),
                email_verification_window_ms: env_or(
                    "EMAIL_VERIFICATION_WINDOW_MS",
                    defaults.email_verification_window_ms,
                ),
                suspicion_multiplier: env_or("SUSPICION_MULTIPLIER", defaults.suspicion_multiplier),
                security_event_retention_ms: std::env::var("SECURITY_EVENT_RETENTION_MS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
            cleanup: CleanupConfig {
                interval_ms: env_or("CLEANUP_INTERVAL_MS", cleanup.interval_ms),
                startup_delay_ms: env_or("CLEANUP_STARTUP_DELAY_MS", cleanup.startup_delay_ms),
                ..cleanup
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.cleanup.validate()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
