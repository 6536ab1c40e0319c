// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! ACME client wrapper around instant-acme.
//!
//! One [`AcmeClient`] serves a whole batch. Each renewal registers its own
//! derived account first, which also discards the orders of the previous
//! renewal.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use instant_acme::{
    Account, Authorization, ChallengeType, Identifier, NewAccount, NewOrder, Order, OrderStatus,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::certificate::{build_csr, CsrFields, PrivateKey};
use super::{
    AuthorizationHandle, AuthorizationStatus, CertificateAuthority, ChallengeHandle, DnsChallenge,
    OrderHandle,
};
use crate::constants::ACME_CALL_TIMEOUT_SECS;
use crate::errors::AuthorityError;
use crate::poll::PollPolicy;
use crate::types::AcmeEnvironment;

/// An order and the authorizations last fetched for it.
struct TrackedOrder {
    order: Order,
    authorizations: Vec<Authorization>,
}

#[derive(Default)]
struct Session {
    account: Option<Account>,
    orders: HashMap<u64, TrackedOrder>,
    next_order_id: u64,
}

impl Session {
    fn tracked(&mut self, order_id: u64) -> Result<&mut TrackedOrder, AuthorityError> {
        self.orders
            .get_mut(&order_id)
            .ok_or(AuthorityError::UnknownOrder(order_id))
    }
}

fn identifier_name(identifier: &Identifier) -> String {
    let Identifier::Dns(name) = identifier;
    name.clone()
}

fn map_status(status: instant_acme::AuthorizationStatus) -> AuthorizationStatus {
    use instant_acme::AuthorizationStatus as Acme;
    match status {
        Acme::Pending => AuthorizationStatus::Pending,
        Acme::Valid => AuthorizationStatus::Valid,
        Acme::Invalid => AuthorizationStatus::Invalid,
        Acme::Expired => AuthorizationStatus::Expired,
        Acme::Revoked => AuthorizationStatus::Revoked,
        #[allow(unreachable_patterns)]
        _ => AuthorizationStatus::Deactivated,
    }
}

/// [`CertificateAuthority`] backed by an ACME directory.
pub struct AcmeClient {
    session: Mutex<Session>,
    call_timeout: Duration,
    order_policy: PollPolicy,
}

impl Default for AcmeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AcmeClient {
    /// Create a client with the default call timeout and order polling budget.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Mutex::new(Session::default()),
            call_timeout: Duration::from_secs(ACME_CALL_TIMEOUT_SECS),
            order_policy: PollPolicy::order(),
        }
    }

    /// Bound a single protocol call by the call timeout.
    async fn timed<T, F>(&self, operation: &'static str, call: F) -> Result<T, AuthorityError>
    where
        F: Future<Output = Result<T, instant_acme::Error>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(AuthorityError::from),
            Err(_) => Err(AuthorityError::Timeout {
                operation,
                timeout_secs: self.call_timeout.as_secs(),
            }),
        }
    }

    /// Refresh the order until it reaches `awaited` (or is already valid).
    async fn wait_for_order(
        &self,
        order: &mut Order,
        awaited: OrderStatus,
    ) -> Result<(), AuthorityError> {
        for attempt in 1..=self.order_policy.max_attempts {
            let status = self.timed("refresh order", order.refresh()).await?.status;
            debug!(attempt = attempt, status = ?status, "Order status");

            if status == awaited || status == OrderStatus::Valid {
                return Ok(());
            }
            if status == OrderStatus::Invalid {
                return Err(AuthorityError::Finalization(
                    "order became invalid".to_string(),
                ));
            }
            tokio::time::sleep(self.order_policy.interval).await;
        }

        Err(AuthorityError::Finalization(format!(
            "order did not reach {awaited:?} after {} polls",
            self.order_policy.max_attempts
        )))
    }
}

#[async_trait]
impl CertificateAuthority for AcmeClient {
    async fn register_account(
        &self,
        account_id: &str,
        environment: AcmeEnvironment,
    ) -> Result<(), AuthorityError> {
        info!(
            environment = %environment,
            account = %account_id,
            "Registering ACME account"
        );

        let contact = format!("mailto:{account_id}");
        let new_account = NewAccount {
            contact: &[contact.as_str()],
            terms_of_service_agreed: true,
            only_return_existing: false,
        };

        let (account, _credentials) = self
            .timed(
                "register account",
                Account::create(&new_account, environment.directory_url(), None),
            )
            .await
            .map_err(|e| match e {
                AuthorityError::Order(reason) => AuthorityError::AccountRegistration {
                    account: account_id.to_string(),
                    reason,
                },
                other => other,
            })?;

        let mut session = self.session.lock().await;
        session.account = Some(account);
        session.orders.clear();
        Ok(())
    }

    async fn new_order(&self, names: &[String]) -> Result<OrderHandle, AuthorityError> {
        let mut session = self.session.lock().await;
        let account = session.account.as_ref().ok_or(AuthorityError::NoAccount)?;

        let identifiers: Vec<Identifier> =
            names.iter().map(|name| Identifier::Dns(name.clone())).collect();
        let order = self
            .timed(
                "create order",
                account.new_order(&NewOrder {
                    identifiers: &identifiers,
                }),
            )
            .await?;

        session.next_order_id += 1;
        let id = session.next_order_id;
        session.orders.insert(
            id,
            TrackedOrder {
                order,
                authorizations: Vec::new(),
            },
        );

        debug!(order_id = id, names = ?names, "Created certificate order");
        Ok(OrderHandle {
            id,
            names: names.to_vec(),
        })
    }

    async fn authorizations(
        &self,
        order: &OrderHandle,
    ) -> Result<Vec<AuthorizationHandle>, AuthorityError> {
        let mut session = self.session.lock().await;
        let tracked = session.tracked(order.id)?;

        let authorizations = self
            .timed("fetch authorizations", tracked.order.authorizations())
            .await?;
        let handles = authorizations
            .iter()
            .enumerate()
            .map(|(index, authz)| AuthorizationHandle {
                order_id: order.id,
                index,
                identifier: identifier_name(&authz.identifier),
            })
            .collect();
        tracked.authorizations = authorizations;

        Ok(handles)
    }

    async fn dns_challenge(
        &self,
        authorization: &AuthorizationHandle,
    ) -> Result<DnsChallenge, AuthorityError> {
        let mut session = self.session.lock().await;
        let tracked = session.tracked(authorization.order_id)?;

        let no_challenge = || AuthorityError::NoDnsChallenge {
            identifier: authorization.identifier.clone(),
        };
        let authz = tracked
            .authorizations
            .get(authorization.index)
            .ok_or_else(no_challenge)?;
        let challenge = authz
            .challenges
            .iter()
            .find(|c| c.r#type == ChallengeType::Dns01)
            .ok_or_else(no_challenge)?;

        let digest = tracked.order.key_authorization(challenge).dns_value();
        Ok(DnsChallenge {
            token: challenge.token.clone(),
            digest,
            challenge: ChallengeHandle {
                order_id: authorization.order_id,
                url: challenge.url.clone(),
                identifier: authorization.identifier.clone(),
            },
        })
    }

    async fn notify_ready(&self, challenge: &ChallengeHandle) -> Result<(), AuthorityError> {
        let mut session = self.session.lock().await;
        let tracked = session.tracked(challenge.order_id)?;

        self.timed(
            "set challenge ready",
            tracked.order.set_challenge_ready(&challenge.url),
        )
        .await
        .map_err(|e| AuthorityError::Challenge {
            identifier: challenge.identifier.clone(),
            reason: e.to_string(),
        })
    }

    async fn authorization_status(
        &self,
        authorization: &AuthorizationHandle,
    ) -> Result<AuthorizationStatus, AuthorityError> {
        let mut session = self.session.lock().await;
        let tracked = session.tracked(authorization.order_id)?;

        tracked.authorizations = self
            .timed("refresh authorizations", tracked.order.authorizations())
            .await?;
        let authz = tracked
            .authorizations
            .get(authorization.index)
            .ok_or_else(|| AuthorityError::Challenge {
                identifier: authorization.identifier.clone(),
                reason: "authorization disappeared from order".to_string(),
            })?;

        Ok(map_status(authz.status))
    }

    async fn finalize(
        &self,
        order: &OrderHandle,
        csr: &CsrFields,
        key: &PrivateKey,
    ) -> Result<String, AuthorityError> {
        let csr_der = build_csr(csr, key)?;

        let mut session = self.session.lock().await;
        let tracked = session.tracked(order.id)?;

        self.wait_for_order(&mut tracked.order, OrderStatus::Ready)
            .await?;
        self.timed("finalize order", tracked.order.finalize(&csr_der))
            .await
            .map_err(|e| AuthorityError::Finalization(e.to_string()))?;
        self.wait_for_order(&mut tracked.order, OrderStatus::Valid)
            .await?;

        let chain = self
            .timed("download certificate", tracked.order.certificate())
            .await?;
        chain.ok_or_else(|| AuthorityError::Finalization("no certificate in response".to_string()))
    }
}

impl std::fmt::Debug for AcmeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcmeClient")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
