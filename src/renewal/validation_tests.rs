// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for authorization polling.

#[cfg(test)]
mod tests {
    use crate::acme::{AuthorizationHandle, AuthorizationStatus, CertificateAuthority};
    use crate::errors::RenewalError;
    use crate::poll::{Attempt, PollPolicy};
    use crate::renewal::validation::*;
    use crate::testing::FakeAuthority;

    fn authorization(index: usize) -> AuthorizationHandle {
        AuthorizationHandle {
            order_id: 1,
            index,
            identifier: "shop.example.com".to_string(),
        }
    }

    #[test]
    fn test_classify_pending_and_valid() {
        assert_eq!(
            classify("a", AuthorizationStatus::Pending).unwrap(),
            Attempt::Retry
        );
        assert_eq!(
            classify("a", AuthorizationStatus::Valid).unwrap(),
            Attempt::Done(())
        );
    }

    #[test]
    fn test_classify_terminal_statuses_fail() {
        for status in [
            AuthorizationStatus::Invalid,
            AuthorizationStatus::Expired,
            AuthorizationStatus::Revoked,
            AuthorizationStatus::Deactivated,
        ] {
            let result = classify("shop.example.com", status);
            assert!(
                matches!(
                    result,
                    Err(RenewalError::AuthorityValidation { status: s, .. }) if s == status
                ),
                "{status:?} must be terminal"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_keeps_polling_until_valid() {
        let authority = FakeAuthority::new().with_statuses(
            0,
            &[
                AuthorizationStatus::Pending,
                AuthorizationStatus::Pending,
                AuthorizationStatus::Valid,
            ],
        );

        wait_for_valid(&authority, &authorization(0), &PollPolicy::authorization())
            .await
            .unwrap();

        assert_eq!(authority.count("authorization_status"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_aborts_without_retry() {
        let authority = FakeAuthority::new().with_statuses(
            0,
            &[AuthorizationStatus::Pending, AuthorizationStatus::Invalid],
        );

        let result =
            wait_for_valid(&authority, &authorization(0), &PollPolicy::authorization()).await;

        assert!(matches!(
            result,
            Err(RenewalError::AuthorityValidation {
                status: AuthorizationStatus::Invalid,
                ..
            })
        ));
        assert_eq!(authority.count("authorization_status"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_forever_times_out() {
        let pending = vec![AuthorizationStatus::Pending; 200];
        let authority = FakeAuthority::new().with_statuses(0, &pending);

        let result =
            wait_for_valid(&authority, &authorization(0), &PollPolicy::authorization()).await;

        assert!(matches!(
            result,
            Err(RenewalError::AuthorizationTimeout { attempts: 120, .. })
        ));
        assert_eq!(authority.count("authorization_status"), 120);
    }

    #[tokio::test]
    async fn test_validate_all_notifies_before_polling() {
        let authority = FakeAuthority::new();
        let order = authority
            .new_order(&["shop.example.com".to_string(), "*.shop.example.com".to_string()])
            .await
            .unwrap();
        let authorizations = authority.authorizations(&order).await.unwrap();
        let mut challenges = Vec::new();
        for authz in &authorizations {
            challenges.push(authority.dns_challenge(authz).await.unwrap());
        }

        validate_all(
            &authority,
            &challenges,
            &authorizations,
            &PollPolicy::authorization(),
        )
        .await
        .unwrap();

        let calls = authority.calls();
        let tail: Vec<&str> = calls.iter().skip(4).map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "notify_ready https://acme.test/chall/0",
                "notify_ready https://acme.test/chall/1",
                "authorization_status 0",
                "authorization_status 1",
            ]
        );
    }
}
