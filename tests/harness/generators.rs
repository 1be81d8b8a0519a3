// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators for attack simulation.

/// Generate a pool of client fingerprints.
pub fn generate_identifiers(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("fp-{:06x}", i)).collect()
}

/// Generate a pool of recipient addresses.
pub fn generate_emails(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("user{}@mail-{}.example.com", i, i % 7))
        .collect()
}

/// Spellings of one address that must share rate limit state.
pub fn email_variants(email: &str) -> Vec<String> {
    vec![
        email.to_string(),
        email.to_uppercase(),
        format!("  {}", email),
        format!("{}\t", email),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_identifiers() {
        let ids = generate_identifiers(256);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_generate_emails() {
        let emails = generate_emails(10);
        assert_eq!(emails.len(), 10);
        assert!(emails.iter().all(|e| e.contains('@')));
    }
}
