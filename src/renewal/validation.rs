// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authority-side validation of the published challenges.

use tracing::{debug, info};

use crate::acme::{AuthorizationHandle, AuthorizationStatus, CertificateAuthority, DnsChallenge};
use crate::errors::RenewalError;
use crate::poll::{poll_until, Attempt, PollError, PollPolicy};

/// Classify one status report.
///
/// # Errors
///
/// Returns [`RenewalError::AuthorityValidation`] for every terminal status
/// other than `Valid`.
pub fn classify(
    identifier: &str,
    status: AuthorizationStatus,
) -> Result<Attempt<()>, RenewalError> {
    match status {
        AuthorizationStatus::Pending => Ok(Attempt::Retry),
        AuthorizationStatus::Valid => Ok(Attempt::Done(())),
        AuthorizationStatus::Invalid
        | AuthorizationStatus::Expired
        | AuthorizationStatus::Revoked
        | AuthorizationStatus::Deactivated => Err(RenewalError::AuthorityValidation {
            identifier: identifier.to_string(),
            status,
        }),
    }
}

async fn check_authorization(
    authority: &dyn CertificateAuthority,
    authorization: &AuthorizationHandle,
) -> Result<Attempt<()>, RenewalError> {
    let status = authority.authorization_status(authorization).await?;
    debug!(
        identifier = %authorization.identifier,
        index = authorization.index,
        status = ?status,
        "Authorization status"
    );
    classify(&authorization.identifier, status)
}

/// Poll one authorization until the authority reports it valid.
///
/// # Errors
///
/// Returns [`RenewalError::AuthorityValidation`] as soon as a terminal
/// failure is reported, [`RenewalError::AuthorizationTimeout`] when the
/// budget is spent, or the authority error of a failed status call.
pub async fn wait_for_valid(
    authority: &dyn CertificateAuthority,
    authorization: &AuthorizationHandle,
    policy: &PollPolicy,
) -> Result<(), RenewalError> {
    let result = poll_until(policy, "authorization", move |_| {
        check_authorization(authority, authorization)
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(PollError::Aborted(e)) => Err(e),
        Err(PollError::Exhausted { attempts }) => Err(RenewalError::AuthorizationTimeout {
            identifier: authorization.identifier.clone(),
            attempts,
        }),
    }
}

/// Signal every challenge as ready, then wait for every authorization.
///
/// # Errors
///
/// Stops at the first failure; see [`wait_for_valid`].
pub async fn validate_all(
    authority: &dyn CertificateAuthority,
    challenges: &[DnsChallenge],
    authorizations: &[AuthorizationHandle],
    policy: &PollPolicy,
) -> Result<(), RenewalError> {
    for challenge in challenges {
        authority.notify_ready(&challenge.challenge).await?;
    }

    for authorization in authorizations {
        wait_for_valid(authority, authorization, policy).await?;
        info!(
            identifier = %authorization.identifier,
            index = authorization.index,
            "Authorization is valid"
        );
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
