// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the email verification flow.
//!
//! Tracks three independent counters:
//! 1. Verification attempts per identifier
//! 2. Resend requests per (email, identifier), plus a per-email cooldown
//! 3. Overall verification activity per identifier
//!
//! Every `check_*` call counts as an attempt, including the ones it denies,
//! except resend requests turned away by the cooldown. Denials are ordinary
//! results, never errors.

use crate::config::RateLimiterConfig;
use crate::events::{SecurityEvent, SecurityEventType};
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Gate that denied the request
        reason: RateLimitReason,
        /// Time until the gate opens again
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Requests left in the binding window; zero once limited.
    pub fn remaining(&self) -> u32 {
        match self {
            Self::Allowed { remaining, .. } => *remaining,
            Self::Limited { .. } => 0,
        }
    }

    /// Wait before retrying; zero when allowed.
    pub fn retry_after(&self) -> Duration {
        match self {
            Self::Allowed { .. } => Duration::ZERO,
            Self::Limited { retry_after, .. } => *retry_after,
        }
    }

    pub fn reason(&self) -> Option<RateLimitReason> {
        match self {
            Self::Allowed { .. } => None,
            Self::Limited { reason, .. } => Some(*reason),
        }
    }
}

/// Reason for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// Identifier exceeded its verification attempts
    VerificationAttemptsExceeded,
    /// Email/identifier pair exceeded its resend allowance
    ResendLimitExceeded,
    /// Email is still inside its resend cooldown
    ResendCooldown,
    /// Identifier exceeded its overall verification activity
    EmailVerificationActivityExceeded,
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VerificationAttemptsExceeded => write!(f, "Verification attempts exceeded"),
            Self::ResendLimitExceeded => write!(f, "Resend limit exceeded"),
            Self::ResendCooldown => write!(f, "Resend requested too soon"),
            Self::EmailVerificationActivityExceeded => {
                write!(f, "Email verification activity exceeded")
            }
        }
    }
}

/// Counter category, used for event metadata and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Verification,
    Resend,
    EmailVerification,
}

impl Category {
    fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Resend => "resend",
            Self::EmailVerification => "email_verification",
        }
    }

    fn exceeded_reason(self) -> RateLimitReason {
        match self {
            Self::Verification => RateLimitReason::VerificationAttemptsExceeded,
            Self::Resend => RateLimitReason::ResendLimitExceeded,
            Self::EmailVerification => RateLimitReason::EmailVerificationActivityExceeded,
        }
    }
}

/// Fixed-window counter. A stale window is reset on next access, never eagerly.
#[derive(Debug)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl WindowCounter {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_start: now,
            window,
        }
    }

    fn window_end(&self) -> Instant {
        self.window_start + self.window
    }

    fn is_stale(&self, now: Instant) -> bool {
        now >= self.window_end()
    }

    /// Count one attempt, resetting first if the window has lapsed.
    fn hit(&mut self, now: Instant) -> u32 {
        if self.is_stale(now) {
            self.count = 0;
            self.window_start = now;
        }
        self.count = self.count.saturating_add(1);
        self.count
    }

    fn resets_in(&self, now: Instant) -> Duration {
        self.window_end().saturating_duration_since(now)
    }
}

/// Per-email resend spacing.
#[derive(Debug)]
struct CooldownState {
    next_allowed_at: Instant,
}

/// Cumulative attempts for an (identifier, email) pair across windows.
#[derive(Debug)]
struct BurstCounter {
    attempts: u64,
    last_seen: Instant,
}

#[derive(Debug, Default)]
struct BurstState {
    counters: HashMap<(String, String), BurstCounter>,
    /// Keys already reported as suspicious
    flagged: HashSet<(String, Option<String>)>,
}

/// Outcome of counting one attempt against a window.
struct WindowHit {
    count: u32,
    limit: u32,
    resets_in: Duration,
}

impl WindowHit {
    fn allowed(&self) -> bool {
        self.count <= self.limit
    }

    /// True only for the call that first crosses the limit in this window.
    fn first_breach(&self) -> bool {
        self.count == self.limit.saturating_add(1)
    }
}

fn hit_window<K: Hash + Eq>(
    counters: &mut HashMap<K, WindowCounter>,
    key: K,
    limit: u32,
    window: Duration,
    now: Instant,
) -> WindowHit {
    let counter = counters
        .entry(key)
        .or_insert_with(|| WindowCounter::new(now, window));
    let count = counter.hit(now);
    WindowHit {
        count,
        limit,
        resets_in: counter.resets_in(now),
    }
}

/// Live entry counts per map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    pub verification_attempts: usize,
    pub resend_requests: usize,
    pub email_verification_activity: usize,
    /// Cooldowns still in force
    pub resend_cooldowns: usize,
    pub security_events: usize,
}

impl RateLimiterStats {
    /// Sum of per-category decreases from `self` to `after`. The event log is
    /// not a rate limit category and is ignored.
    pub fn reclaimed_since(&self, after: &RateLimiterStats) -> u64 {
        let pairs = [
            (self.verification_attempts, after.verification_attempts),
            (self.resend_requests, after.resend_requests),
            (
                self.email_verification_activity,
                after.email_verification_activity,
            ),
            (self.resend_cooldowns, after.resend_cooldowns),
        ];
        pairs
            .iter()
            .map(|(before, after)| before.saturating_sub(*after) as u64)
            .sum()
    }
}

/// Entries removed by one [`RateLimiter::cleanup`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub verification_attempts: usize,
    pub resend_requests: usize,
    pub email_verification_activity: usize,
    pub resend_cooldowns: usize,
    pub burst_counters: usize,
    pub security_events: usize,
}

/// Thread-safe rate limiter.
pub struct RateLimiter {
    /// Configuration
    config: RateLimiterConfig,
    /// Per-identifier verification attempt windows
    verification: RwLock<HashMap<String, WindowCounter>>,
    /// Per-(email, identifier) resend windows
    resend: RwLock<HashMap<(String, String), WindowCounter>>,
    /// Per-identifier verification activity windows
    email_verification: RwLock<HashMap<String, WindowCounter>>,
    /// Per-email resend cooldowns
    cooldowns: RwLock<HashMap<String, CooldownState>>,
    bursts: RwLock<BurstState>,
    events: RwLock<Vec<SecurityEvent>>,
    metrics: Option<Arc<Metrics>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            verification: RwLock::new(HashMap::new()),
            resend: RwLock::new(HashMap::new()),
            email_verification: RwLock::new(HashMap::new()),
            cooldowns: RwLock::new(HashMap::new()),
            bursts: RwLock::new(BurstState::default()),
            events: RwLock::new(Vec::new()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Count a verification attempt for `identifier` and report whether it is allowed.
    ///
    /// When `email` is given the cumulative burst counter for the pair is
    /// advanced as well; see [`detect_suspicious_activity`](Self::detect_suspicious_activity).
    pub async fn check_verification_attempts(
        &self,
        identifier: &str,
        email: Option<&str>,
    ) -> RateLimitResult {
        let now = Instant::now();
        let email = email.map(normalize_email);

        let hit = {
            let mut counters = self.verification.write().await;
            hit_window(
                &mut counters,
                identifier.to_string(),
                self.config.max_verification_attempts,
                self.config.verification_window(),
                now,
            )
        };

        if let Some(email) = &email {
            let mut bursts = self.bursts.write().await;
            let counter = bursts
                .counters
                .entry((identifier.to_string(), email.clone()))
                .or_insert(BurstCounter {
                    attempts: 0,
                    last_seen: now,
                });
            counter.attempts += 1;
            counter.last_seen = now;
        }

        self.conclude(Category::Verification, identifier, email, hit)
            .await
    }

    /// Check whether a new code may be sent to `email` for `identifier`.
    ///
    /// The per-email cooldown is checked first; a cooldown denial does not
    /// count against the resend window and is not a security event.
    pub async fn check_resend_requests(&self, email: &str, identifier: &str) -> RateLimitResult {
        let now = Instant::now();
        let email = normalize_email(email);

        // Held across the window update so concurrent resends for one email
        // cannot both pass the cooldown.
        let mut cooldowns = self.cooldowns.write().await;
        if let Some(state) = cooldowns.get(&email) {
            if now < state.next_allowed_at {
                let retry_after = state.next_allowed_at.duration_since(now);
                debug!(%email, identifier, ?retry_after, "Resend in cooldown");
                self.record_check(Category::Resend, false);
                return RateLimitResult::Limited {
                    reason: RateLimitReason::ResendCooldown,
                    retry_after,
                };
            }
        }

        let hit = {
            let mut counters = self.resend.write().await;
            hit_window(
                &mut counters,
                (email.clone(), identifier.to_string()),
                self.config.max_resend_requests,
                self.config.resend_window(),
                now,
            )
        };

        if hit.allowed() {
            cooldowns.insert(
                email.clone(),
                CooldownState {
                    next_allowed_at: now + self.config.resend_cooldown(),
                },
            );
        }
        drop(cooldowns);

        self.conclude(Category::Resend, identifier, Some(email), hit)
            .await
    }

    /// Count one verification-related action for `identifier`.
    ///
    /// Tracked separately from [`check_verification_attempts`](Self::check_verification_attempts)
    /// so exhausting one does not exhaust the other.
    pub async fn check_email_verification_activity(&self, identifier: &str) -> RateLimitResult {
        let now = Instant::now();

        let hit = {
            let mut counters = self.email_verification.write().await;
            hit_window(
                &mut counters,
                identifier.to_string(),
                self.config.max_email_verification_requests,
                self.config.email_verification_window(),
                now,
            )
        };

        self.conclude(Category::EmailVerification, identifier, None, hit)
            .await
    }

    /// Report whether cumulative attempts exceed the suspicion threshold.
    ///
    /// With an email, reads that pair's counter. Without one, sums every
    /// counter recorded for `identifier`. The first positive answer per key
    /// records a `SUSPICIOUS_ACTIVITY` event.
    pub async fn detect_suspicious_activity(&self, identifier: &str, email: Option<&str>) -> bool {
        let email = email.map(normalize_email);
        let threshold = self.config.suspicion_threshold();

        let mut bursts = self.bursts.write().await;
        let attempts: u64 = match &email {
            Some(email) => bursts
                .counters
                .get(&(identifier.to_string(), email.clone()))
                .map(|c| c.attempts)
                .unwrap_or(0),
            None => bursts
                .counters
                .iter()
                .filter(|((id, _), _)| id == identifier)
                .map(|(_, c)| c.attempts)
                .sum(),
        };

        let suspicious = attempts > threshold;
        let newly_flagged =
            suspicious && bursts.flagged.insert((identifier.to_string(), email.clone()));
        drop(bursts);

        if newly_flagged {
            warn!(identifier, email = ?email, attempts, threshold, "Suspicious verification activity");
            let event = SecurityEvent::new(
                SecurityEventType::SuspiciousActivity,
                identifier,
                email,
            )
            .with_metadata("attempts", attempts)
            .with_metadata("threshold", threshold);
            self.record_event(event).await;
        }

        suspicious
    }

    /// Events at or after `since`, in the order they were recorded.
    pub async fn security_events(&self, since: Option<DateTime<Utc>>) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        match since {
            Some(since) => events
                .iter()
                .filter(|e| e.timestamp >= since)
                .cloned()
                .collect(),
            None => events.clone(),
        }
    }

    /// Entry counts per map. Each lock is released before the next is taken.
    pub async fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let verification_attempts = self.verification.read().await.len();
        let resend_requests = self.resend.read().await.len();
        let email_verification_activity = self.email_verification.read().await.len();
        let resend_cooldowns = self
            .cooldowns
            .read()
            .await
            .values()
            .filter(|s| now < s.next_allowed_at)
            .count();
        let security_events = self.events.read().await.len();

        RateLimiterStats {
            verification_attempts,
            resend_requests,
            email_verification_activity,
            resend_cooldowns,
            security_events,
        }
    }

    /// Remove expired windows, cooldowns and idle burst counters.
    ///
    /// Live entries are untouched. Security events are only pruned when a
    /// retention period is configured.
    pub async fn cleanup(&self) -> PurgeCounts {
        let now = Instant::now();
        let mut purged = PurgeCounts::default();

        {
            let mut counters = self.verification.write().await;
            let before = counters.len();
            counters.retain(|_, c| !c.is_stale(now));
            purged.verification_attempts = before - counters.len();
        }

        {
            let mut counters = self.resend.write().await;
            let before = counters.len();
            counters.retain(|_, c| !c.is_stale(now));
            purged.resend_requests = before - counters.len();
        }

        {
            let mut counters = self.email_verification.write().await;
            let before = counters.len();
            counters.retain(|_, c| !c.is_stale(now));
            purged.email_verification_activity = before - counters.len();
        }

        {
            let mut cooldowns = self.cooldowns.write().await;
            let before = cooldowns.len();
            cooldowns.retain(|_, state| now < state.next_allowed_at);
            purged.resend_cooldowns = before - cooldowns.len();
        }

        {
            let idle_after = self.config.verification_window();
            let mut bursts = self.bursts.write().await;
            let BurstState { counters, flagged } = &mut *bursts;
            let before = counters.len();
            counters.retain(|_, c| now.saturating_duration_since(c.last_seen) < idle_after);
            purged.burst_counters = before - counters.len();
            flagged.retain(|(identifier, email)| match email {
                Some(email) => counters.contains_key(&(identifier.clone(), email.clone())),
                None => counters.keys().any(|(id, _)| id == identifier),
            });
        }

        if let Some(retention) = self.config.security_event_retention() {
            if let Some(cutoff) = chrono::Duration::from_std(retention)
                .ok()
                .and_then(|r| Utc::now().checked_sub_signed(r))
            {
                let mut events = self.events.write().await;
                let before = events.len();
                events.retain(|e| e.timestamp >= cutoff);
                purged.security_events = before - events.len();
            }
        }

        debug!(?purged, "Rate limiter cleanup complete");
        purged
    }

    /// Turn a window hit into a result, recording the first breach.
    async fn conclude(
        &self,
        category: Category,
        identifier: &str,
        email: Option<String>,
        hit: WindowHit,
    ) -> RateLimitResult {
        let allowed = hit.allowed();
        self.record_check(category, allowed);

        if allowed {
            return RateLimitResult::Allowed {
                remaining: hit.limit - hit.count,
                reset_in: hit.resets_in,
            };
        }

        if hit.first_breach() {
            warn!(
                category = category.as_str(),
                identifier,
                email = ?email,
                limit = hit.limit,
                "Rate limit exceeded"
            );
            let event = SecurityEvent::new(SecurityEventType::RateLimitExceeded, identifier, email)
                .with_metadata("category", category.as_str())
                .with_metadata("limit", hit.limit);
            self.record_event(event).await;
        } else {
            debug!(
                category = category.as_str(),
                identifier,
                count = hit.count,
                "Rate limited"
            );
        }

        RateLimitResult::Limited {
            reason: category.exceeded_reason(),
            retry_after: hit.resets_in,
        }
    }

    fn record_check(&self, category: Category, allowed: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_check(category.as_str(), allowed);
        }
    }

    async fn record_event(&self, event: SecurityEvent) {
        if let Some(metrics) = &self.metrics {
            metrics.record_security_event(event.event_type.as_str());
        }
        self.events.write().await.push(event);
    }
}

/// Normalize an email for use as a key.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
