// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the polling combinator.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::poll::*;

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_done() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<u32, PollError<()>> =
            poll_until(&PollPolicy::authorization(), "test", move |attempt| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(if attempt == 3 {
                    Attempt::Done(attempt)
                } else {
                    Attempt::Retry
                })
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = PollPolicy::propagation();

        let result: Result<(), PollError<()>> = poll_until(&policy, "test", move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Attempt::Retry)
        })
        .await;

        assert_eq!(result, Err(PollError::Exhausted { attempts: 300 }));
        assert_eq!(calls.load(Ordering::SeqCst), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), PollError<&str>> =
            poll_until(&PollPolicy::authorization(), "test", move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("rejected")
            })
            .await;

        assert_eq!(result, Err(PollError::Aborted("rejected")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_and_interval() {
        let policy = PollPolicy {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            max_attempts: 3,
        };
        let start = Instant::now();

        let result: Result<(), PollError<()>> =
            poll_until(&policy, "test", |_| async { Ok(Attempt::Retry) }).await;

        assert!(result.is_err());
        // Initial delay plus two intervals; no sleep after the last attempt
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_initial_delay_checks_immediately() {
        let start = Instant::now();

        let result: Result<(), PollError<()>> =
            poll_until(&PollPolicy::authorization(), "test", |_| async {
                Ok(Attempt::Done(()))
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_policy_budgets() {
        let propagation = PollPolicy::propagation();
        assert_eq!(propagation.interval, Duration::from_secs(10));
        assert_eq!(propagation.max_attempts, 300);

        let authorization = PollPolicy::authorization();
        assert_eq!(authorization.initial_delay, Duration::ZERO);
        assert_eq!(authorization.interval, Duration::from_secs(5));
    }
}
