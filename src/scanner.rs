// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Expiry scan over the certificates installed in the managed environment.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::constants::SUBJECT_COMMON_NAME_PREFIX;
use crate::errors::PlatformError;
use crate::platform::{CertificateStore, InstalledCertificate};

/// An installed certificate due for renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringCertificate {
    pub certificate: InstalledCertificate,
    /// Domain derived from the certificate subject
    pub domain: String,
}

/// Returns true if fewer than (or exactly) `threshold_days` remain before
/// `expires_on`, including certificates that already expired.
#[must_use]
pub fn is_due(expires_on: DateTime<Utc>, now: DateTime<Utc>, threshold_days: i64) -> bool {
    TimeDelta::try_days(threshold_days).is_none_or(|threshold| expires_on - now <= threshold)
}

/// Domain named by a stored subject such as `CN=shop.example.com`.
#[must_use]
pub fn derive_domain(subject_name: &str) -> String {
    let subject = subject_name.trim();
    let common_name = subject
        .strip_prefix(SUBJECT_COMMON_NAME_PREFIX)
        .unwrap_or(subject);
    // Only the first RDN names the host
    common_name
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Finds installed certificates that are due for renewal.
pub struct ExpiryScanner {
    store: Arc<dyn CertificateStore>,
    environment_id: String,
}

impl ExpiryScanner {
    #[must_use]
    pub fn new(store: Arc<dyn CertificateStore>, environment_id: &str) -> Self {
        Self {
            store,
            environment_id: environment_id.to_string(),
        }
    }

    /// Certificates expiring within `threshold_days` of `now`.
    ///
    /// The listing is fetched once; the returned iterator filters it lazily
    /// and can be consumed only once.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] if the environment or its certificates
    /// cannot be read.
    pub async fn find_expiring(
        &self,
        threshold_days: i64,
        now: DateTime<Utc>,
    ) -> Result<impl Iterator<Item = ExpiringCertificate>, PlatformError> {
        let environment = self.store.get_environment(&self.environment_id).await?;
        let certificates = self.store.list_certificates(&environment).await?;
        info!(
            environment = %environment.name,
            certificates = certificates.len(),
            threshold_days = threshold_days,
            "Scanning installed certificates"
        );

        Ok(certificates.into_iter().filter_map(move |certificate| {
            if !is_due(certificate.expires_on, now, threshold_days) {
                debug!(
                    certificate = %certificate.name,
                    expires_on = %certificate.expires_on,
                    "Certificate not due"
                );
                return None;
            }
            let domain = derive_domain(&certificate.subject_name);
            if domain.is_empty() {
                debug!(certificate = %certificate.name, "Certificate has no subject, ignoring");
                return None;
            }
            Some(ExpiringCertificate {
                certificate,
                domain,
            })
        }))
    }
}

impl std::fmt::Debug for ExpiryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryScanner")
            .field("environment_id", &self.environment_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod scanner_tests;
