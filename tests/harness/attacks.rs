// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Attack simulation patterns for security testing.

/// Which guarded operation the attacker hammers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackTarget {
    /// Guessing verification codes
    CodeGuessing,
    /// Requesting new codes to flood a mailbox
    ResendFlood,
}

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    pub target: AttackTarget,
    /// Total number of requests to send
    pub total_requests: usize,
    /// Number of client fingerprints the attacker rotates through
    pub unique_identifiers: usize,
    /// Number of recipient addresses targeted
    pub unique_emails: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            target: AttackTarget::CodeGuessing,
            total_requests: 100,
            unique_identifiers: 1,
            unique_emails: 1,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// One client brute-forcing one mailbox's code.
    pub fn single_client_guessing() -> Self {
        Self {
            total_requests: 200,
            ..Default::default()
        }
    }

    /// Rotating fingerprints against one mailbox.
    pub fn rotating_fingerprints() -> Self {
        Self {
            total_requests: 300,
            unique_identifiers: 100,
            ..Default::default()
        }
    }

    /// One client asking for codes to be resent to one mailbox.
    pub fn mailbox_flood() -> Self {
        Self {
            target: AttackTarget::ResendFlood,
            total_requests: 50,
            ..Default::default()
        }
    }

    /// Many clients asking for codes for the same mailbox.
    pub fn distributed_mailbox_flood() -> Self {
        Self {
            target: AttackTarget::ResendFlood,
            total_requests: 50,
            unique_identifiers: 50,
            ..Default::default()
        }
    }
}
