// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Metrics collection for attack simulation results.

use std::collections::HashMap;
use verification_guard::{RateLimitReason, RateLimitResult};

/// Possible outcomes for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    AttemptsExceeded,
    ResendLimited,
    ResendCooldown,
    ActivityExceeded,
}

impl From<&RateLimitResult> for Outcome {
    fn from(result: &RateLimitResult) -> Self {
        match result.reason() {
            None => Outcome::Allowed,
            Some(RateLimitReason::VerificationAttemptsExceeded) => Outcome::AttemptsExceeded,
            Some(RateLimitReason::ResendLimitExceeded) => Outcome::ResendLimited,
            Some(RateLimitReason::ResendCooldown) => Outcome::ResendCooldown,
            Some(RateLimitReason::EmailVerificationActivityExceeded) => Outcome::ActivityExceeded,
        }
    }
}

/// Collects outcomes during attack simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    outcomes: HashMap<Outcome, usize>,
    requests_per_identifier: HashMap<String, usize>,
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome, identifier: &str) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self
            .requests_per_identifier
            .entry(identifier.to_string())
            .or_insert(0) += 1;
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Ratio of blocked to total requests.
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (total - self.count(Outcome::Allowed)) as f64 / total as f64
    }

    pub fn unique_identifiers(&self) -> usize {
        self.requests_per_identifier.len()
    }
}

impl std::fmt::Display for AttackMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Attack Metrics Report ===")?;
        writeln!(f, "Total Requests:    {}", self.total_requests())?;
        writeln!(f, "Allowed:           {}", self.count(Outcome::Allowed))?;
        writeln!(f, "Attempts Exceeded: {}", self.count(Outcome::AttemptsExceeded))?;
        writeln!(f, "Resend Limited:    {}", self.count(Outcome::ResendLimited))?;
        writeln!(f, "Resend Cooldown:   {}", self.count(Outcome::ResendCooldown))?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate() * 100.0)?;
        writeln!(f, "Unique Clients:    {}", self.unique_identifiers())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_rate() {
        let mut metrics = AttackMetrics::new();
        for _ in 0..3 {
            metrics.record(Outcome::Allowed, "fp-1");
        }
        for _ in 0..7 {
            metrics.record(Outcome::AttemptsExceeded, "fp-1");
        }

        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
        assert_eq!(metrics.unique_identifiers(), 1);
    }
}
