// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the verification guard.
//!
//! Each [`Metrics`] value owns its registry so that several limiters (or
//! tests) in one process never collide on registration.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    checks: IntCounterVec,
    security_events: IntCounterVec,
    cleanup_runs: IntCounterVec,
    reclaimed_entries: IntCounter,
    expired_codes: IntCounter,
}

impl Metrics {
    /// Create and register all collectors.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let checks = IntCounterVec::new(
            Opts::new(
                "verification_guard_checks_total",
                "Rate limit checks by category and outcome",
            ),
            &["category", "outcome"],
        )?;
        let security_events = IntCounterVec::new(
            Opts::new(
                "verification_guard_security_events_total",
                "Security events recorded by type",
            ),
            &["type"],
        )?;
        let cleanup_runs = IntCounterVec::new(
            Opts::new(
                "verification_guard_cleanup_runs_total",
                "Cleanup passes by outcome",
            ),
            &["outcome"],
        )?;
        let reclaimed_entries = IntCounter::new(
            "verification_guard_reclaimed_entries_total",
            "Rate limit entries removed by cleanup",
        )?;
        let expired_codes = IntCounter::new(
            "verification_guard_expired_codes_total",
            "Expired verification codes removed by cleanup",
        )?;

        registry.register(Box::new(checks.clone()))?;
        registry.register(Box::new(security_events.clone()))?;
        registry.register(Box::new(cleanup_runs.clone()))?;
        registry.register(Box::new(reclaimed_entries.clone()))?;
        registry.register(Box::new(expired_codes.clone()))?;

        Ok(Self {
            registry,
            checks,
            security_events,
            cleanup_runs,
            reclaimed_entries,
            expired_codes,
        })
    }

    pub fn record_check(&self, category: &str, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "limited" };
        self.checks.with_label_values(&[category, outcome]).inc();
    }

    pub fn record_security_event(&self, event_type: &str) {
        self.security_events.with_label_values(&[event_type]).inc();
    }

    pub fn record_cleanup_run(&self, outcome: &str) {
        self.cleanup_runs.with_label_values(&[outcome]).inc();
    }

    pub fn record_reclaimed(&self, expired_codes: u64, rate_limit_entries: u64) {
        self.expired_codes.inc_by(expired_codes);
        self.reclaimed_entries.inc_by(rate_limit_entries);
    }

    /// Render all metrics in the Prometheus text format.
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
