// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for the verification guard.
//!
//! Provides collaborator mocks for the cleanup coordinator and utilities for
//! replaying abusive traffic against the rate limiter.

#![allow(dead_code)]

pub mod attacks;
pub mod generators;
pub mod metrics;
pub mod mocks;
