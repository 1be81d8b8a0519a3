// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Boundaries to the verification code store and the email service monitor.
//!
//! Both are implemented by the embedding application. The cleanup coordinator
//! only ever talks to them through these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Snapshot of the verification code store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeStats {
    pub total_active: u64,
    pub expired_count: u64,
    pub high_attempt_count: u64,
}

/// Persistent store of issued verification codes.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Remove expired codes, returning how many were removed.
    async fn cleanup_expired_codes(&self) -> anyhow::Result<u64>;

    async fn code_stats(&self) -> anyhow::Result<CodeStats>;
}

/// Health classification reported by the email service monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Warning,
    Critical,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Delivery statistics of the email service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailServiceStats {
    pub sent: u64,
    pub failed: u64,
    /// Percentage of successful deliveries (0-100)
    pub success_rate: f64,
}

/// Observer of the outbound email service. Calls are not expected to fail.
#[async_trait]
pub trait ServiceMonitor: Send + Sync {
    async fn health_status(&self) -> HealthStatus;

    async fn stats(&self) -> EmailServiceStats;

    /// Share of the sending quota already used, as a percentage.
    async fn quota_usage_percentage(&self) -> f64;
}
