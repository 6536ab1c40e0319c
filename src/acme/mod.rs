// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! ACME certificate authority capability.
//!
//! The renewal workflow talks to the authority exclusively through the
//! [`CertificateAuthority`] trait. Orders, authorizations and challenges are
//! referenced by small handle values; the implementation keeps the protocol
//! state behind them.
//!
//! - [`client`] - `instant-acme` implementation against Let's Encrypt
//! - [`certificate`] - key generation, CSR construction and PKCS#12 export

pub mod certificate;
pub mod client;

use async_trait::async_trait;

pub use certificate::{generate_archive_password, CsrFields, PrivateKey};
pub use client::AcmeClient;

use crate::errors::AuthorityError;
use crate::types::AcmeEnvironment;

/// Status of one authorization as reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Expired,
    Revoked,
    Deactivated,
}

/// Reference to an order created by [`CertificateAuthority::new_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHandle {
    /// Client-local order id
    pub id: u64,
    /// Names requested in the order
    pub names: Vec<String>,
}

/// Reference to one authorization of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHandle {
    /// Order the authorization belongs to
    pub order_id: u64,
    /// Position of the authorization within the order
    pub index: usize,
    /// Identifier the authorization validates (e.g. `example.com`)
    pub identifier: String,
}

/// Reference to a DNS-01 challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeHandle {
    /// Order the challenge belongs to
    pub order_id: u64,
    /// Challenge URL at the authority
    pub url: String,
    /// Identifier the challenge proves control of
    pub identifier: String,
}

/// An order together with its authorizations.
#[derive(Debug, Clone)]
pub struct OrderAuthorizations {
    pub order: OrderHandle,
    pub authorizations: Vec<AuthorizationHandle>,
}

/// DNS-01 challenge of one authorization.
#[derive(Debug, Clone)]
pub struct DnsChallenge {
    /// Challenge token issued by the authority
    pub token: String,
    /// Expected TXT value: base64url(SHA-256(token "." account thumbprint))
    pub digest: String,
    /// Handle to signal readiness with
    pub challenge: ChallengeHandle,
}

/// Operations the renewal workflow needs from an ACME authority.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Register (or confirm) the account used for subsequent calls.
    ///
    /// Registering an account that already exists is not an error.
    async fn register_account(
        &self,
        account_id: &str,
        environment: AcmeEnvironment,
    ) -> Result<(), AuthorityError>;

    /// Create an order for `names`.
    async fn new_order(&self, names: &[String]) -> Result<OrderHandle, AuthorityError>;

    /// Fetch the authorizations of an order.
    async fn authorizations(
        &self,
        order: &OrderHandle,
    ) -> Result<Vec<AuthorizationHandle>, AuthorityError>;

    /// Fetch the DNS-01 challenge of an authorization and compute its digest.
    async fn dns_challenge(
        &self,
        authorization: &AuthorizationHandle,
    ) -> Result<DnsChallenge, AuthorityError>;

    /// Tell the authority the challenge can be validated.
    async fn notify_ready(&self, challenge: &ChallengeHandle) -> Result<(), AuthorityError>;

    /// Current status of an authorization.
    async fn authorization_status(
        &self,
        authorization: &AuthorizationHandle,
    ) -> Result<AuthorizationStatus, AuthorityError>;

    /// Finalize the order with a CSR built from `csr` and `key`, returning
    /// the PEM certificate chain.
    async fn finalize(
        &self,
        order: &OrderHandle,
        csr: &CsrFields,
        key: &PrivateKey,
    ) -> Result<String, AuthorityError>;

    /// Export the chain and key as a password-protected PKCS#12 archive.
    fn export_pfx(
        &self,
        chain_pem: &str,
        key: &PrivateKey,
        password: &str,
        friendly_name: &str,
    ) -> Result<Vec<u8>, AuthorityError> {
        certificate::export_pfx(chain_pem, key, password, friendly_name)
    }
}

/// Convenience wrapper: create an order and fetch its authorizations.
///
/// # Errors
///
/// Propagates any [`AuthorityError`] from the authority.
pub async fn order_with_authorizations(
    authority: &dyn CertificateAuthority,
    names: &[String],
) -> Result<OrderAuthorizations, AuthorityError> {
    let order = authority.new_order(names).await?;
    let authorizations = authority.authorizations(&order).await?;
    Ok(OrderAuthorizations {
        order,
        authorizations,
    })
}
