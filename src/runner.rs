// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Batch entrypoints: scan-and-renew and single-domain bootstrap.
//!
//! Domains are renewed one after another. A failed domain is logged as a
//! single `error!` record carrying its reason code and the batch moves on.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::RunConfig;
use crate::errors::PlatformError;
use crate::renewal::{RenewalOrchestrator, RenewalOutcome};
use crate::scanner::ExpiryScanner;
use crate::types::RenewalRequest;

/// One domain that failed to renew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDomain {
    pub domain: String,
    /// Stable reason code, see [`crate::errors::RenewalError::status_reason`]
    pub reason: &'static str,
}

/// Per-run tally of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub renewed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedDomain>,
}

impl BatchSummary {
    fn log(&self) {
        info!(
            renewed = self.renewed.len(),
            skipped = self.skipped.len(),
            failed = self.failed.len(),
            "Batch complete"
        );
    }
}

fn request_for(config: &RunConfig, domain: &str) -> RenewalRequest {
    RenewalRequest {
        domain: domain.to_string(),
        account: config.account.clone(),
        dn: config.dn.clone(),
        environment: config.acme_environment,
    }
}

async fn renew_one(
    orchestrator: &RenewalOrchestrator,
    request: &RenewalRequest,
    summary: &mut BatchSummary,
) {
    info!(domain = %request.domain, "Renewing certificate");

    match orchestrator.renew(request).await {
        Ok(RenewalOutcome::Renewed(report)) => {
            info!(
                domain = %report.domain,
                certificate = %report.certificate.name,
                "Certificate renewed"
            );
            summary.renewed.push(request.domain.clone());
        }
        Ok(RenewalOutcome::Skipped { reason }) => {
            info!(domain = %request.domain, reason = %reason, "Domain skipped");
            summary.skipped.push(request.domain.clone());
        }
        Err(e) => {
            error!(
                domain = %request.domain,
                reason = e.status_reason(),
                error = %e,
                "Certificate renewal failed"
            );
            summary.failed.push(FailedDomain {
                domain: request.domain.clone(),
                reason: e.status_reason(),
            });
        }
    }
}

/// Renew every certificate due within `threshold_days`.
///
/// # Errors
///
/// Returns a [`PlatformError`] only when the installed certificates cannot
/// be listed; per-domain failures are recorded in the summary.
pub async fn run_scan(
    config: &RunConfig,
    scanner: &ExpiryScanner,
    orchestrator: &RenewalOrchestrator,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> Result<BatchSummary, PlatformError> {
    let mut summary = BatchSummary::default();
    let mut seen = HashSet::new();

    for expiring in scanner.find_expiring(threshold_days, now).await? {
        if !seen.insert(expiring.domain.clone()) {
            info!(
                domain = %expiring.domain,
                certificate = %expiring.certificate.name,
                "Domain already handled in this run"
            );
            continue;
        }

        info!(
            domain = %expiring.domain,
            certificate = %expiring.certificate.name,
            expires_on = %expiring.certificate.expires_on,
            "Certificate is due for renewal"
        );
        let request = request_for(config, &expiring.domain);
        renew_one(orchestrator, &request, &mut summary).await;
    }

    summary.log();
    Ok(summary)
}

/// Issue the first certificate for `domain`.
pub async fn run_bootstrap(
    config: &RunConfig,
    orchestrator: &RenewalOrchestrator,
    domain: &str,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let request = request_for(config, domain);
    renew_one(orchestrator, &request, &mut summary).await;
    summary.log();
    summary
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod runner_tests;
