// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container Apps platform capability.
//!
//! Installed certificates belong to a managed environment. Container apps in
//! that environment reference them from their ingress custom-domain
//! bindings, so replacing a certificate means uploading the new one,
//! repointing the bindings and then deleting the old resource.

pub mod container_apps;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use container_apps::ContainerAppsStore;

use crate::constants::{CERTIFICATE_NAME_MAX_LEN, CERTIFICATE_NAME_SUFFIX_LEN};
use crate::errors::PlatformError;

/// Managed environment hosting the apps and their certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEnvironment {
    pub id: String,
    pub name: String,
    /// Azure region, required when uploading certificates
    pub location: String,
}

/// Certificate resource installed in a managed environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledCertificate {
    pub id: String,
    pub name: String,
    /// Subject as stored by the platform, e.g. `CN=shop.example.com`
    pub subject_name: String,
    pub expires_on: DateTime<Utc>,
}

/// How a custom domain is bound to its certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingMode {
    #[default]
    Disabled,
    SniEnabled,
    Auto,
}

/// One ingress custom-domain entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomainBinding {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(default)]
    pub binding_type: BindingMode,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ingress configuration of a container app.
///
/// Fields other than the custom domains are carried through untouched so an
/// update writes back exactly what was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub custom_domains: Vec<CustomDomainBinding>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Container app with the parts of its configuration the renewal touches.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerApp {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Resource id of the managed environment the app runs in
    pub environment_id: String,
    pub ingress: Option<Ingress>,
}

impl ContainerApp {
    /// Returns true if the app runs in `environment_id`.
    ///
    /// Resource ids are case-insensitive.
    #[must_use]
    pub fn runs_in(&self, environment_id: &str) -> bool {
        self.environment_id.eq_ignore_ascii_case(environment_id)
    }
}

/// Operations the workflow needs from the compute platform.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Look up a managed environment by resource id.
    async fn get_environment(&self, environment_id: &str)
        -> Result<ManagedEnvironment, PlatformError>;

    /// All certificates installed in `environment`.
    async fn list_certificates(
        &self,
        environment: &ManagedEnvironment,
    ) -> Result<Vec<InstalledCertificate>, PlatformError>;

    /// Upload a PKCS#12 archive under `name`.
    async fn upload_certificate(
        &self,
        environment: &ManagedEnvironment,
        name: &str,
        payload: &[u8],
        password: &str,
    ) -> Result<InstalledCertificate, PlatformError>;

    /// Delete the certificate `name` from `environment`.
    async fn delete_certificate(
        &self,
        environment: &ManagedEnvironment,
        name: &str,
    ) -> Result<(), PlatformError>;

    /// All container apps of the subscription.
    async fn list_apps(&self) -> Result<Vec<ContainerApp>, PlatformError>;

    /// Persist a new ingress configuration for `app`.
    async fn update_app_ingress(
        &self,
        app: &ContainerApp,
        ingress: &Ingress,
    ) -> Result<(), PlatformError>;
}

/// Unique certificate resource name for `domain`.
///
/// The domain is reduced to lowercase alphanumerics and `-`, truncated, and
/// suffixed with random hex so repeated renewals never collide.
#[must_use]
pub fn generate_certificate_name(domain: &str) -> String {
    let sanitized: String = domain
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    let prefix_budget = CERTIFICATE_NAME_MAX_LEN - CERTIFICATE_NAME_SUFFIX_LEN - 1;
    let prefix: String = sanitized
        .trim_matches('-')
        .chars()
        .take(prefix_budget)
        .collect();
    let prefix = prefix.trim_end_matches('-');
    let prefix = if prefix.is_empty() { "cert" } else { prefix };

    // Eight hex digits fill CERTIFICATE_NAME_SUFFIX_LEN
    format!("{prefix}-{:08x}", rand::random::<u32>())
}
