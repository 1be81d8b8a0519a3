// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Cleanup coordinator.
//!
//! Runs maintenance passes that reclaim expired verification codes and rate
//! limit state, and keeps a rolling history of what each pass removed.
//!
//! # Admission
//!
//! At most one pass runs at a time. A pass requested while another is in
//! flight fails with [`CleanupError::AlreadyRunning`]; it is never queued.
//! The running flag is released by a guard on every exit path, including
//! collaborator failures and panics.

use crate::collaborators::{CodeStats, CodeStore, ServiceMonitor, ServiceStatus};
use crate::config::CleanupConfig;
use crate::error::{CleanupError, Result};
use crate::limiter::{RateLimiter, RateLimiterStats};
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Email service health captured during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailServiceHealth {
    pub status: ServiceStatus,
    pub quota_usage: f64,
    pub success_rate: f64,
    pub issues: Vec<String>,
}

/// Record of one completed cleanup pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupStats {
    /// Verification codes removed by the code store
    pub expired_codes: u64,
    /// Rate limit entries reclaimed across all categories
    pub rate_limit_data: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_service_health: Option<EmailServiceHealth>,
}

/// Coordinator state plus the rolling history.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupSummary {
    pub last_cleanup: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub recent_stats: Vec<CleanupStats>,
    pub total_expired_codes: u64,
    pub total_rate_limit_data: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupStatus {
    pub last_cleanup: Option<DateTime<Utc>>,
    pub is_running: bool,
    /// Only known once a schedule is running and a pass has completed
    pub next_cleanup_due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub verification_codes: CodeStats,
    pub rate_limits: RateLimiterStats,
    pub cleanup: CleanupStatus,
}

/// Fixed-capacity history of completed passes, oldest first.
#[derive(Debug)]
struct History {
    recent: VecDeque<CleanupStats>,
    capacity: usize,
    last_cleanup: Option<DateTime<Utc>>,
    scheduled_interval: Option<Duration>,
}

impl History {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            last_cleanup: None,
            scheduled_interval: None,
        }
    }

    fn push(&mut self, stats: CleanupStats) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.last_cleanup = Some(stats.timestamp);
        self.recent.push_back(stats);
    }

    fn next_cleanup_due(&self) -> Option<DateTime<Utc>> {
        let last = self.last_cleanup?;
        let interval = chrono::Duration::from_std(self.scheduled_interval?).ok()?;
        last.checked_add_signed(interval)
    }
}

/// Holds the running flag for the lifetime of one pass.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CleanupError::AlreadyRunning)?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct CleanupCoordinator {
    limiter: Arc<RateLimiter>,
    code_store: Arc<dyn CodeStore>,
    monitor: Option<Arc<dyn ServiceMonitor>>,
    config: CleanupConfig,
    running: AtomicBool,
    history: RwLock<History>,
    metrics: Option<Arc<Metrics>>,
}

impl CleanupCoordinator {
    pub fn new(
        limiter: Arc<RateLimiter>,
        code_store: Arc<dyn CodeStore>,
        config: CleanupConfig,
    ) -> Self {
        let history = History::new(config.history_capacity);
        Self {
            limiter,
            code_store,
            monitor: None,
            config,
            running: AtomicBool::new(false),
            history: RwLock::new(history),
            metrics: None,
        }
    }

    /// Attach the email service monitor whose health is sampled on every pass.
    pub fn with_service_monitor(mut self, monitor: Arc<dyn ServiceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one cleanup pass.
    ///
    /// Fails with [`CleanupError::AlreadyRunning`] if a pass is in flight, and
    /// with [`CleanupError::CollaboratorFailure`] if the code store fails.
    pub async fn run_cleanup(&self) -> Result<CleanupStats> {
        let _guard = match RunGuard::acquire(&self.running) {
            Ok(guard) => guard,
            Err(e) => {
                self.record_run("rejected");
                return Err(e);
            }
        };

        let result = self.run_pass().await;
        self.record_run(if result.is_ok() { "success" } else { "failure" });
        result
    }

    /// Same contract as [`run_cleanup`](Self::run_cleanup); does not preempt a running pass.
    pub async fn force_cleanup(&self) -> Result<CleanupStats> {
        info!("Forced cleanup requested");
        self.run_cleanup().await
    }

    /// Pass to run once at process start, before any schedule begins.
    pub async fn run_startup_cleanup(&self) -> Result<CleanupStats> {
        info!("Running startup cleanup");
        self.run_cleanup().await
    }

    pub async fn cleanup_stats(&self) -> CleanupSummary {
        let history = self.history.read().await;
        let recent_stats: Vec<CleanupStats> = history.recent.iter().cloned().collect();
        CleanupSummary {
            last_cleanup: history.last_cleanup,
            is_running: self.is_running(),
            total_expired_codes: recent_stats.iter().map(|s| s.expired_codes).sum(),
            total_rate_limit_data: recent_stats.iter().map(|s| s.rate_limit_data).sum(),
            recent_stats,
        }
    }

    /// Composite status. Reads only; never starts a pass.
    pub async fn system_status(&self) -> Result<SystemStatus> {
        let verification_codes = self
            .code_store
            .code_stats()
            .await
            .map_err(CleanupError::CollaboratorFailure)?;
        let rate_limits = self.limiter.stats().await;

        let history = self.history.read().await;
        Ok(SystemStatus {
            verification_codes,
            rate_limits,
            cleanup: CleanupStatus {
                last_cleanup: history.last_cleanup,
                is_running: self.is_running(),
                next_cleanup_due: history.next_cleanup_due(),
            },
        })
    }

    /// Start periodic cleanup: one run after the configured startup delay,
    /// then one every `interval`.
    ///
    /// Tick failures, overlaps and panics are logged and never stop the
    /// schedule. There is no stop operation; the task lives as long as the
    /// runtime unless the caller aborts the returned handle.
    pub async fn schedule_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(Duration::from_millis(1));
        self.history.write().await.scheduled_interval = Some(interval);

        let coordinator = Arc::clone(self);
        let startup_delay = self.config.startup_delay();

        tokio::spawn(async move {
            info!(
                interval_ms = interval.as_millis() as u64,
                startup_delay_ms = startup_delay.as_millis() as u64,
                "Cleanup schedule started"
            );
            tokio::time::sleep(startup_delay).await;

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                coordinator.spawn_scheduled_run();
            }
        })
    }

    /// Schedule with the interval from configuration.
    pub async fn schedule_configured_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        self.schedule_cleanup(self.config.interval()).await
    }

    /// Run one scheduled pass in its own task so a panic stays contained.
    fn spawn_scheduled_run(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        // Inner task runs the pass; outer task reports its result without blocking the tick loop.
        tokio::spawn(async move {
            let run = tokio::spawn(async move { coordinator.run_cleanup().await });
            match run.await {
                Ok(Ok(stats)) => debug!(
                    expired_codes = stats.expired_codes,
                    rate_limit_data = stats.rate_limit_data,
                    "Scheduled cleanup finished"
                ),
                Ok(Err(CleanupError::AlreadyRunning)) => {
                    debug!("Scheduled cleanup skipped, previous pass still running")
                }
                Ok(Err(e)) => error!(error = %e, "Scheduled cleanup failed"),
                Err(e) => error!(error = %e, "Scheduled cleanup panicked"),
            }
        });
    }

    async fn run_pass(&self) -> Result<CleanupStats> {
        let before = self.limiter.stats().await;

        let expired_codes = self.code_store.cleanup_expired_codes().await.map_err(|e| {
            error!(error = %e, "Failed to remove expired verification codes");
            CleanupError::CollaboratorFailure(e)
        })?;

        self.limiter.cleanup().await;
        let after = self.limiter.stats().await;
        let rate_limit_data = before.reclaimed_since(&after);

        let email_service_health = self.email_service_health().await;

        let stats = CleanupStats {
            expired_codes,
            rate_limit_data,
            timestamp: Utc::now(),
            email_service_health,
        };
        self.history.write().await.push(stats.clone());

        if let Some(metrics) = &self.metrics {
            metrics.record_reclaimed(expired_codes, rate_limit_data);
        }
        info!(expired_codes, rate_limit_data, "Cleanup complete");

        Ok(stats)
    }

    async fn email_service_health(&self) -> Option<EmailServiceHealth> {
        let monitor = self.monitor.as_ref()?;
        let health = monitor.health_status().await;
        let stats = monitor.stats().await;
        let quota_usage = monitor.quota_usage_percentage().await;

        if health.status != ServiceStatus::Healthy {
            warn!(
                status = %health.status,
                issues = ?health.issues,
                recommendations = ?health.recommendations,
                quota_usage,
                "Email service is not healthy"
            );
        }

        Some(EmailServiceHealth {
            status: health.status,
            quota_usage,
            success_rate: stats.success_rate,
            issues: health.issues,
        })
    }

    fn record_run(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cleanup_run(outcome);
        }
    }
}
