// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scriptable collaborators for the cleanup coordinator.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};
use verification_guard::collaborators::{
    CodeStats, CodeStore, EmailServiceStats, HealthStatus, ServiceMonitor, ServiceStatus,
};

/// Code store whose results, failures and timing are controlled by the test.
pub struct MockCodeStore {
    expired: AtomicU64,
    calls: AtomicUsize,
    failing: AtomicBool,
    panic_next: AtomicBool,
    gated: AtomicBool,
    entered: Notify,
    gate: Semaphore,
    code_stats: Mutex<CodeStats>,
}

impl MockCodeStore {
    pub fn new() -> Self {
        Self {
            expired: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            panic_next: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            entered: Notify::new(),
            gate: Semaphore::new(0),
            code_stats: Mutex::new(CodeStats::default()),
        }
    }

    /// Block every `cleanup_expired_codes` call until [`release`](Self::release).
    pub fn gated() -> Self {
        let store = Self::new();
        store.gated.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_expired(&self, count: u64) {
        self.expired.store(count, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn panic_on_next_call(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn set_code_stats(&self, stats: CodeStats) {
        *self.code_stats.lock().unwrap() = stats;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until a cleanup call has started.
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    /// Let the blocked call finish and stop gating later ones.
    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl CodeStore for MockCodeStore {
    async fn cleanup_expired_codes(&self) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();

        if self.gated.load(Ordering::SeqCst) {
            self.gate.acquire().await?.forget();
        }
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("code store exploded");
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("code store unavailable");
        }
        Ok(self.expired.load(Ordering::SeqCst))
    }

    async fn code_stats(&self) -> anyhow::Result<CodeStats> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("code store unavailable");
        }
        Ok(self.code_stats.lock().unwrap().clone())
    }
}

/// Service monitor reporting a fixed health picture.
pub struct MockServiceMonitor {
    health: HealthStatus,
    success_rate: f64,
    quota_usage: f64,
}

impl MockServiceMonitor {
    pub fn healthy() -> Self {
        Self {
            health: HealthStatus {
                status: ServiceStatus::Healthy,
                issues: Vec::new(),
                recommendations: Vec::new(),
            },
            success_rate: 99.5,
            quota_usage: 12.0,
        }
    }

    pub fn degraded(issue: &str) -> Self {
        Self {
            health: HealthStatus {
                status: ServiceStatus::Warning,
                issues: vec![issue.to_string()],
                recommendations: vec!["Reduce sending volume".to_string()],
            },
            success_rate: 81.0,
            quota_usage: 92.5,
        }
    }
}

#[async_trait]
impl ServiceMonitor for MockServiceMonitor {
    async fn health_status(&self) -> HealthStatus {
        self.health.clone()
    }

    async fn stats(&self) -> EmailServiceStats {
        EmailServiceStats {
            sent: 200,
            failed: 0,
            success_rate: self.success_rate,
        }
    }

    async fn quota_usage_percentage(&self) -> f64 {
        self.quota_usage
    }
}
