// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fixed-interval polling with a hard attempt ceiling.
//!
//! DNS propagation, authorization status and long-running management
//! operations all converge within predictable windows, so they are polled at
//! a fixed interval rather than with exponential backoff. Each poll site
//! describes its budget with a [`PollPolicy`] and hands a check closure to
//! [`poll_until`].

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::constants::{
    AUTHORIZATION_POLL_INTERVAL_SECS, AUTHORIZATION_POLL_MAX_ATTEMPTS, LRO_POLL_INTERVAL_SECS,
    LRO_POLL_MAX_ATTEMPTS, ORDER_POLL_INTERVAL_SECS, ORDER_POLL_MAX_ATTEMPTS,
    PROPAGATION_POLL_INTERVAL_SECS, PROPAGATION_POLL_MAX_ATTEMPTS,
};

/// Polling budget for one poll site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the first check
    pub initial_delay: Duration,
    /// Delay between consecutive checks
    pub interval: Duration,
    /// Maximum number of checks
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Public DNS propagation: wait 10s before every check, 300 checks.
    #[must_use]
    pub fn propagation() -> Self {
        Self {
            initial_delay: Duration::from_secs(PROPAGATION_POLL_INTERVAL_SECS),
            interval: Duration::from_secs(PROPAGATION_POLL_INTERVAL_SECS),
            max_attempts: PROPAGATION_POLL_MAX_ATTEMPTS,
        }
    }

    /// Authorization status: check immediately, then every 5s.
    #[must_use]
    pub fn authorization() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval: Duration::from_secs(AUTHORIZATION_POLL_INTERVAL_SECS),
            max_attempts: AUTHORIZATION_POLL_MAX_ATTEMPTS,
        }
    }

    /// Order status after finalization.
    #[must_use]
    pub fn order() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval: Duration::from_secs(ORDER_POLL_INTERVAL_SECS),
            max_attempts: ORDER_POLL_MAX_ATTEMPTS,
        }
    }

    /// Azure long-running operations.
    #[must_use]
    pub fn long_running_operation() -> Self {
        Self {
            initial_delay: Duration::from_secs(LRO_POLL_INTERVAL_SECS),
            interval: Duration::from_secs(LRO_POLL_INTERVAL_SECS),
            max_attempts: LRO_POLL_MAX_ATTEMPTS,
        }
    }
}

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The awaited condition holds
    Done(T),
    /// Not there yet, check again after the interval
    Retry,
}

/// Why polling stopped without reaching [`Attempt::Done`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    /// Every attempt returned [`Attempt::Retry`]
    Exhausted {
        /// Number of checks performed
        attempts: u32,
    },
    /// The check reported a terminal failure
    Aborted(E),
}

/// Run `check` until it returns [`Attempt::Done`], fails, or the budget is spent.
///
/// The check receives the 1-based attempt number. A check returning `Err`
/// stops polling immediately; no further attempts are made.
///
/// # Errors
///
/// Returns [`PollError::Exhausted`] after exactly `policy.max_attempts`
/// unsuccessful checks, or [`PollError::Aborted`] with the check's error.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    operation_name: &str,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    let start_time = Instant::now();

    if !policy.initial_delay.is_zero() {
        tokio::time::sleep(policy.initial_delay).await;
    }

    for attempt in 1..=policy.max_attempts {
        match check(attempt).await {
            Ok(Attempt::Done(value)) => {
                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    elapsed = ?start_time.elapsed(),
                    "Poll condition satisfied"
                );
                return Ok(value);
            }
            Ok(Attempt::Retry) => {
                trace!(operation = operation_name, attempt = attempt, "Condition not met yet");
            }
            Err(e) => return Err(PollError::Aborted(e)),
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    warn!(
        operation = operation_name,
        attempts = policy.max_attempts,
        elapsed = ?start_time.elapsed(),
        "Polling budget exhausted"
    );
    Err(PollError::Exhausted {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod poll_tests;
