// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for proof record propagation checks.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::dns::propagation::*;
    use crate::errors::RenewalError;
    use crate::testing::ScriptedResolver;

    const RECORD: &str = "_acme-challenge.shop.example.com";

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_missing_values() {
        let expected = strings(&["a", "b"]);

        assert_eq!(missing_values(&expected, &strings(&["b", "c"])), strings(&["a"]));
        assert!(missing_values(&expected, &strings(&["b", "a"])).is_empty());
        assert_eq!(missing_values(&expected, &[]), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_once_every_value_is_returned() {
        let resolver = Arc::new(ScriptedResolver::new(vec![
            vec![],
            vec!["digest-0"],
            vec!["digest-1", "stale", "digest-0"],
        ]));
        let checker = DnsPropagationChecker::new(resolver.clone());

        let result = checker
            .wait_until_visible(RECORD, &strings(&["digest-0", "digest-1"]))
            .await;

        assert!(result.is_ok());
        assert_eq!(resolver.queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_missing_values() {
        let resolver = Arc::new(ScriptedResolver::always(&["digest-0"]));
        let checker = DnsPropagationChecker::new(resolver.clone());

        let result = checker
            .wait_until_visible(RECORD, &strings(&["digest-0", "digest-1"]))
            .await;

        match result {
            Err(RenewalError::PropagationTimeout {
                record,
                attempts,
                missing,
            }) => {
                assert_eq!(record, RECORD);
                assert_eq!(attempts, 300);
                assert_eq!(missing, strings(&["digest-1"]));
            }
            other => panic!("expected propagation timeout, got {other:?}"),
        }
        assert_eq!(resolver.queries(), 300);
    }
}
