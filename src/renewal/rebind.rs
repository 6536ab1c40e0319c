// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Repointing custom-domain bindings and retiring replaced certificates.
//!
//! [`plan_rebinding`] is pure: it computes the updated ingress of every app
//! and the certificates that become unreferenced. The store is only touched
//! by [`apply_rebinding`] and [`retire_certificates`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::errors::PlatformError;
use crate::platform::{BindingMode, CertificateStore, ContainerApp, Ingress, ManagedEnvironment};

/// One app whose ingress needs to be persisted.
#[derive(Debug, Clone)]
pub struct IngressUpdate {
    pub app: ContainerApp,
    pub ingress: Ingress,
}

/// Outcome of planning a rebind for one domain.
#[derive(Debug, Clone, Default)]
pub struct RebindPlan {
    /// Apps with at least one binding for the domain
    pub updates: Vec<IngressUpdate>,
    /// Previously bound certificates no binding references afterwards
    pub retire: Vec<String>,
    /// Previously bound certificates still referenced by other bindings
    pub retain: Vec<String>,
}

/// Name of a certificate resource of `environment_id`, if `certificate_id`
/// refers to one.
#[must_use]
pub fn certificate_name_in<'a>(certificate_id: &'a str, environment_id: &str) -> Option<&'a str> {
    let prefix_len = environment_id.trim_end_matches('/').len() + "/certificates/".len();
    let prefix = certificate_id.get(..prefix_len)?;
    let expected = format!("{}/certificates/", environment_id.trim_end_matches('/'));
    if !prefix.eq_ignore_ascii_case(&expected) {
        return None;
    }
    certificate_id
        .get(prefix_len..)
        .filter(|name| !name.is_empty() && !name.contains('/'))
}

/// Repoint every `domain` binding of apps in `environment_id` to
/// `new_certificate_id`.
#[must_use]
pub fn plan_rebinding(
    apps: &[ContainerApp],
    environment_id: &str,
    domain: &str,
    new_certificate_id: &str,
) -> RebindPlan {
    let mut updates = Vec::new();
    let mut replaced = BTreeMap::new();
    let mut still_referenced = BTreeSet::new();

    for app in apps.iter().filter(|app| app.runs_in(environment_id)) {
        let Some(ingress) = app.ingress.as_ref() else {
            continue;
        };

        let mut updated = ingress.clone();
        let mut matched = false;
        for binding in &mut updated.custom_domains {
            if binding.name.eq_ignore_ascii_case(domain) {
                if let Some(previous) = binding.certificate_id.take() {
                    replaced
                        .entry(previous.to_ascii_lowercase())
                        .or_insert(previous);
                }
                binding.certificate_id = Some(new_certificate_id.to_string());
                binding.binding_type = BindingMode::SniEnabled;
                matched = true;
            } else if let Some(other) = &binding.certificate_id {
                still_referenced.insert(other.to_ascii_lowercase());
            }
        }

        if matched {
            updates.push(IngressUpdate {
                app: app.clone(),
                ingress: updated,
            });
        }
    }

    let mut retire = Vec::new();
    let mut retain = Vec::new();
    for (key, previous) in replaced {
        if key == new_certificate_id.to_ascii_lowercase() {
            continue;
        }
        if still_referenced.contains(&key) {
            retain.push(previous);
        } else {
            retire.push(previous);
        }
    }

    RebindPlan {
        updates,
        retire,
        retain,
    }
}

/// Persist every planned ingress update.
///
/// # Errors
///
/// Stops at the first failed update.
pub async fn apply_rebinding(
    store: &dyn CertificateStore,
    plan: &RebindPlan,
) -> Result<Vec<String>, PlatformError> {
    let mut rebound = Vec::with_capacity(plan.updates.len());
    for update in &plan.updates {
        store.update_app_ingress(&update.app, &update.ingress).await?;
        rebound.push(update.app.name.clone());
    }
    Ok(rebound)
}

/// Result of retiring replaced certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Delete every certificate in `certificate_ids`, continuing past failures.
pub async fn retire_certificates(
    store: &dyn CertificateStore,
    environment: &ManagedEnvironment,
    certificate_ids: &[String],
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for certificate_id in certificate_ids {
        let Some(name) = certificate_name_in(certificate_id, &environment.id) else {
            warn!(
                certificate = %certificate_id,
                environment = %environment.name,
                "Replaced certificate is not in this environment, not deleting"
            );
            report.failed.push(certificate_id.clone());
            continue;
        };

        match store.delete_certificate(environment, name).await {
            Ok(()) => {
                info!(certificate = %name, "Deleted replaced certificate");
                report.deleted.push(name.to_string());
            }
            Err(e) => {
                warn!(certificate = %name, error = %e, "Failed to delete replaced certificate");
                report.failed.push(name.to_string());
            }
        }
    }

    report
}

#[cfg(test)]
#[path = "rebind_tests.rs"]
mod rebind_tests;
