// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-domain renewal workflow.
//!
//! [`RenewalOrchestrator::renew`] drives one domain through the whole
//! sequence:
//!
//! 1. find the authoritative zone (none means the domain is skipped)
//! 2. register the derived ACME account
//! 3. order `domain` and `*.domain` and fetch the authorizations
//! 4. collect the DNS-01 challenges and digests
//! 5. publish the proof record set ([`proof`])
//! 6. wait for public propagation
//! 7. signal readiness and poll the authorizations ([`validation`])
//! 8. finalize with a fresh key and export the archive
//! 9. upload the archive under a unique name
//! 10. repoint the custom-domain bindings ([`rebind`])
//! 11. delete the replaced certificates, best-effort
//!
//! Any failure before step 11 aborts the renewal of this domain only.

pub mod proof;
pub mod rebind;
pub mod validation;

use std::sync::Arc;

use tracing::info;

use crate::acme::{
    generate_archive_password, order_with_authorizations, CertificateAuthority, CsrFields,
    PrivateKey,
};
use crate::dns::{challenge_record_fqdn, relative_record_name, DnsPropagationChecker, DnsZoneClient};
use crate::errors::RenewalError;
use crate::platform::{generate_certificate_name, CertificateStore, InstalledCertificate};
use crate::poll::PollPolicy;
use crate::types::{derive_account_id, requested_names, RenewalRequest};

/// What a completed renewal did.
#[derive(Debug, Clone)]
pub struct RenewalReport {
    pub domain: String,
    /// The newly installed certificate
    pub certificate: InstalledCertificate,
    /// Apps whose bindings now point at the new certificate
    pub rebound_apps: Vec<String>,
    /// Replaced certificates that were deleted
    pub retired: Vec<String>,
    /// Replaced certificates kept because other bindings still use them
    pub retained: Vec<String>,
    /// Replaced certificates whose deletion failed
    pub cleanup_failures: Vec<String>,
}

/// Result of a renewal that did not fail.
#[derive(Debug, Clone)]
pub enum RenewalOutcome {
    Renewed(Box<RenewalReport>),
    Skipped {
        /// Why nothing was done
        reason: String,
    },
}

/// Coordinates the authority, the DNS zone and the platform for one domain
/// at a time.
pub struct RenewalOrchestrator {
    authority: Arc<dyn CertificateAuthority>,
    dns: Arc<dyn DnsZoneClient>,
    propagation: DnsPropagationChecker,
    store: Arc<dyn CertificateStore>,
    environment_id: String,
    authorization_policy: PollPolicy,
}

impl RenewalOrchestrator {
    #[must_use]
    pub fn new(
        authority: Arc<dyn CertificateAuthority>,
        dns: Arc<dyn DnsZoneClient>,
        propagation: DnsPropagationChecker,
        store: Arc<dyn CertificateStore>,
        environment_id: &str,
    ) -> Self {
        Self {
            authority,
            dns,
            propagation,
            store,
            environment_id: environment_id.to_string(),
            authorization_policy: PollPolicy::authorization(),
        }
    }

    #[must_use]
    pub fn with_authorization_policy(mut self, policy: PollPolicy) -> Self {
        self.authorization_policy = policy;
        self
    }

    /// Renew (or first issue) the certificate for `request.domain`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenewalError`] describing the first failed step. Cleanup
    /// failures are reported in the [`RenewalReport`] instead.
    pub async fn renew(&self, request: &RenewalRequest) -> Result<RenewalOutcome, RenewalError> {
        let domain = request.domain.as_str();
        let account_id = derive_account_id(&request.account, domain)?;

        // Step 1: zone resolution
        let Some(zone) = self.dns.find_zone_for_suffix(domain).await? else {
            info!(domain = %domain, "No managed DNS zone for domain, skipping");
            return Ok(RenewalOutcome::Skipped {
                reason: format!("no DNS zone manages {domain}"),
            });
        };
        info!(domain = %domain, zone = %zone.name, "Found DNS zone");

        // Steps 2-3: account, order and authorizations
        self.authority
            .register_account(&account_id, request.environment)
            .await?;
        let names = requested_names(domain);
        let order = order_with_authorizations(self.authority.as_ref(), &names).await?;
        info!(
            domain = %domain,
            authorizations = order.authorizations.len(),
            "Created certificate order"
        );

        // Step 4: challenges
        let mut challenges = Vec::with_capacity(order.authorizations.len());
        for authorization in &order.authorizations {
            challenges.push(self.authority.dns_challenge(authorization).await?);
        }
        let digests: Vec<String> = challenges.iter().map(|c| c.digest.clone()).collect();

        // Step 5: proof publication
        let fqdn = challenge_record_fqdn(domain);
        let relative_name = relative_record_name(&fqdn, &zone.name)?;
        proof::publish_proof(self.dns.as_ref(), &zone, &relative_name, &digests).await?;
        info!(domain = %domain, record = %fqdn, values = digests.len(), "Published proof record");

        // Step 6: propagation
        self.propagation.wait_until_visible(&fqdn, &digests).await?;

        // Step 7: authority validation
        validation::validate_all(
            self.authority.as_ref(),
            &challenges,
            &order.authorizations,
            &self.authorization_policy,
        )
        .await?;
        info!(domain = %domain, "All authorizations are valid");

        // Step 8: finalization
        let key = PrivateKey::generate()?;
        let csr = CsrFields::for_domain(domain, &request.dn);
        let chain = self.authority.finalize(&order.order, &csr, &key).await?;
        let password = generate_archive_password();
        let archive = self.authority.export_pfx(&chain, &key, &password, domain)?;
        info!(domain = %domain, "Certificate issued");

        // Step 9: installation
        let environment = self.store.get_environment(&self.environment_id).await?;
        let certificate_name = generate_certificate_name(domain);
        let certificate = self
            .store
            .upload_certificate(&environment, &certificate_name, &archive, &password)
            .await?;
        info!(domain = %domain, certificate = %certificate.name, "Installed certificate");

        // Step 10: rebinding
        let apps = self.store.list_apps().await?;
        let plan = rebind::plan_rebinding(&apps, &self.environment_id, domain, &certificate.id);
        if plan.updates.is_empty() {
            info!(domain = %domain, "No custom-domain bindings for domain, nothing to rebind");
        }
        let rebound_apps = rebind::apply_rebinding(self.store.as_ref(), &plan).await?;
        for kept in &plan.retain {
            info!(
                domain = %domain,
                certificate = %kept,
                "Keeping replaced certificate still bound to other domains"
            );
        }

        // Step 11: cleanup
        let cleanup =
            rebind::retire_certificates(self.store.as_ref(), &environment, &plan.retire).await;
        info!(
            domain = %domain,
            rebound = rebound_apps.len(),
            retired = cleanup.deleted.len(),
            "Renewal complete"
        );

        Ok(RenewalOutcome::Renewed(Box::new(RenewalReport {
            domain: domain.to_string(),
            certificate,
            rebound_apps,
            retired: cleanup.deleted,
            retained: plan.retain,
            cleanup_failures: cleanup.failed,
        })))
    }
}

impl std::fmt::Debug for RenewalOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalOrchestrator")
            .field("environment_id", &self.environment_id)
            .field("authorization_policy", &self.authorization_policy)
            .finish_non_exhaustive()
    }
}
