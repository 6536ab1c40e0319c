// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Public-resolver propagation checks for the proof record.
//!
//! The authority validates against public DNS, not against the zone API, so
//! the record is only considered published once a public resolver returns
//! every expected value. Resolver failures count as "not visible yet".

use std::convert::Infallible;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::rr::{DNSClass, Name, RData, RecordType};
use hickory_client::udp::UdpClientConnection;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::RESOLVER_QUERY_TIMEOUT_SECS;
use crate::errors::RenewalError;
use crate::poll::{poll_until, Attempt, PollError, PollPolicy};

/// TXT lookups through a resolver.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// TXT values at `fqdn`; empty when the name does not resolve or the
    /// query fails.
    async fn query_txt(&self, fqdn: &str) -> Vec<String>;
}

/// UDP resolver at a fixed address (Google public DNS by default).
#[derive(Debug, Clone)]
pub struct PublicResolver {
    server: SocketAddr,
    timeout: Duration,
}

impl PublicResolver {
    #[must_use]
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            timeout: Duration::from_secs(RESOLVER_QUERY_TIMEOUT_SECS),
        }
    }
}

async fn query_txt_records(
    server: SocketAddr,
    timeout: Duration,
    fqdn: &str,
) -> Result<Vec<String>> {
    let fqdn = fqdn.to_string();

    tokio::task::spawn_blocking(move || {
        let conn = UdpClientConnection::with_timeout(server, timeout)
            .context("Failed to create UDP connection for query")?;
        let client = SyncClient::new(conn);

        let name = Name::from_str(&fqdn).with_context(|| format!("Invalid record name: {fqdn}"))?;
        let response = client
            .query(&name, DNSClass::IN, RecordType::TXT)
            .with_context(|| format!("Failed to query TXT record for {fqdn}"))?;

        let values = response
            .answers()
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::TXT(txt)) => Some(
                    txt.txt_data()
                        .iter()
                        .map(|bytes| String::from_utf8_lossy(bytes))
                        .collect::<String>(),
                ),
                _ => None,
            })
            .collect();

        Ok(values)
    })
    .await
    .context("DNS query task failed")?
}

#[async_trait]
impl TxtResolver for PublicResolver {
    async fn query_txt(&self, fqdn: &str) -> Vec<String> {
        match query_txt_records(self.server, self.timeout, fqdn).await {
            Ok(values) => values,
            Err(e) => {
                debug!(record = %fqdn, resolver = %self.server, error = %e, "TXT query failed");
                Vec::new()
            }
        }
    }
}

/// Expected values absent from `observed`.
#[must_use]
pub fn missing_values(expected: &[String], observed: &[String]) -> Vec<String> {
    expected
        .iter()
        .filter(|value| !observed.contains(value))
        .cloned()
        .collect()
}

/// Waits until a TXT record is publicly visible.
#[derive(Clone)]
pub struct DnsPropagationChecker {
    resolver: Arc<dyn TxtResolver>,
    policy: PollPolicy,
}

impl DnsPropagationChecker {
    /// Checker with the default budget: every 10 seconds, 300 checks.
    #[must_use]
    pub fn new(resolver: Arc<dyn TxtResolver>) -> Self {
        Self::with_policy(resolver, PollPolicy::propagation())
    }

    #[must_use]
    pub fn with_policy(resolver: Arc<dyn TxtResolver>, policy: PollPolicy) -> Self {
        Self { resolver, policy }
    }

    /// Poll until every value of `expected` is returned for `fqdn`.
    ///
    /// # Errors
    ///
    /// Returns [`RenewalError::PropagationTimeout`] with the values still
    /// missing on the last check once the budget is spent.
    pub async fn wait_until_visible(
        &self,
        fqdn: &str,
        expected: &[String],
    ) -> Result<(), RenewalError> {
        info!(record = %fqdn, expected = expected.len(), "Waiting for proof record propagation");

        let last_missing = Mutex::new(expected.to_vec());
        let last_missing_ref = &last_missing;
        let resolver = &self.resolver;

        let result = poll_until(&self.policy, "dns propagation", move |attempt| async move {
            let observed = resolver.query_txt(fqdn).await;
            let missing = missing_values(expected, &observed);
            if missing.is_empty() {
                return Ok::<_, Infallible>(Attempt::Done(()));
            }

            debug!(
                record = %fqdn,
                attempt = attempt,
                missing = missing.len(),
                "Proof record not fully visible yet"
            );
            *last_missing_ref.lock().await = missing;
            Ok(Attempt::Retry)
        })
        .await;

        match result {
            Ok(()) => {
                info!(record = %fqdn, "Proof record is publicly visible");
                Ok(())
            }
            Err(PollError::Aborted(never)) => match never {},
            Err(PollError::Exhausted { attempts }) => Err(RenewalError::PropagationTimeout {
                record: fqdn.to_string(),
                attempts,
                missing: last_missing.into_inner(),
            }),
        }
    }
}

impl std::fmt::Debug for DnsPropagationChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsPropagationChecker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "propagation_tests.rs"]
mod propagation_tests;
