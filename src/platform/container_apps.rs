// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Container Apps implementation of [`CertificateStore`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{CertificateStore, ContainerApp, Ingress, InstalledCertificate, ManagedEnvironment};
use crate::arm::ArmClient;
use crate::constants::CONTAINER_APPS_API_VERSION;
use crate::errors::PlatformError;

#[derive(Debug, Deserialize)]
struct EnvironmentResource {
    id: String,
    name: String,
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateProperties {
    subject_name: Option<String>,
    expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CertificateResource {
    id: String,
    name: String,
    #[serde(default)]
    properties: CertificateProperties,
}

impl CertificateResource {
    fn into_installed(self) -> Option<InstalledCertificate> {
        let Some(expires_on) = self.properties.expiration_date else {
            debug!(certificate = %self.name, "Certificate has no expiration date yet");
            return None;
        };
        Some(InstalledCertificate {
            id: self.id,
            name: self.name,
            subject_name: self.properties.subject_name.unwrap_or_default(),
            expires_on,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct AppConfiguration {
    ingress: Option<Ingress>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppProperties {
    managed_environment_id: Option<String>,
    environment_id: Option<String>,
    configuration: Option<AppConfiguration>,
}

#[derive(Debug, Deserialize)]
struct AppResource {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    properties: AppProperties,
}

impl From<AppResource> for ContainerApp {
    fn from(app: AppResource) -> Self {
        let properties = app.properties;
        Self {
            id: app.id,
            name: app.name,
            location: app.location,
            environment_id: properties
                .managed_environment_id
                .or(properties.environment_id)
                .unwrap_or_default(),
            ingress: properties.configuration.and_then(|c| c.ingress),
        }
    }
}

fn certificate_path(environment: &ManagedEnvironment, name: &str) -> String {
    format!("{}/certificates/{}", environment.id, name)
}

/// Certificates and container apps managed through Azure Resource Manager.
#[derive(Debug, Clone)]
pub struct ContainerAppsStore {
    arm: Arc<ArmClient>,
    subscription_id: String,
}

impl ContainerAppsStore {
    #[must_use]
    pub fn new(arm: Arc<ArmClient>, subscription_id: &str) -> Self {
        Self {
            arm,
            subscription_id: subscription_id.to_string(),
        }
    }
}

#[async_trait]
impl CertificateStore for ContainerAppsStore {
    async fn get_environment(
        &self,
        environment_id: &str,
    ) -> Result<ManagedEnvironment, PlatformError> {
        let resource: EnvironmentResource = self
            .arm
            .get(environment_id, CONTAINER_APPS_API_VERSION)
            .await?;
        let location = resource
            .location
            .filter(|l| !l.is_empty())
            .ok_or_else(|| PlatformError::MissingLocation {
                environment: environment_id.to_string(),
            })?;

        Ok(ManagedEnvironment {
            id: resource.id,
            name: resource.name,
            location,
        })
    }

    async fn list_certificates(
        &self,
        environment: &ManagedEnvironment,
    ) -> Result<Vec<InstalledCertificate>, PlatformError> {
        let path = format!("{}/certificates", environment.id);
        let certificates: Vec<CertificateResource> =
            self.arm.list(&path, CONTAINER_APPS_API_VERSION).await?;

        Ok(certificates
            .into_iter()
            .filter_map(CertificateResource::into_installed)
            .collect())
    }

    async fn upload_certificate(
        &self,
        environment: &ManagedEnvironment,
        name: &str,
        payload: &[u8],
        password: &str,
    ) -> Result<InstalledCertificate, PlatformError> {
        let body = json!({
            "location": environment.location,
            "properties": {
                "password": password,
                "value": STANDARD.encode(payload),
            }
        });

        let path = certificate_path(environment, name);
        let resource: CertificateResource = self
            .arm
            .put(&path, CONTAINER_APPS_API_VERSION, &body)
            .await?;
        info!(
            environment = %environment.name,
            certificate = %resource.name,
            "Uploaded certificate"
        );

        let expires_on = resource.properties.expiration_date.unwrap_or_else(Utc::now);
        Ok(InstalledCertificate {
            id: resource.id,
            name: resource.name,
            subject_name: resource.properties.subject_name.unwrap_or_default(),
            expires_on,
        })
    }

    async fn delete_certificate(
        &self,
        environment: &ManagedEnvironment,
        name: &str,
    ) -> Result<(), PlatformError> {
        let path = certificate_path(environment, name);
        self.arm.delete(&path, CONTAINER_APPS_API_VERSION).await?;
        Ok(())
    }

    async fn list_apps(&self) -> Result<Vec<ContainerApp>, PlatformError> {
        let path = format!(
            "/subscriptions/{}/providers/Microsoft.App/containerApps",
            self.subscription_id
        );
        let apps: Vec<AppResource> = self.arm.list(&path, CONTAINER_APPS_API_VERSION).await?;
        Ok(apps.into_iter().map(ContainerApp::from).collect())
    }

    async fn update_app_ingress(
        &self,
        app: &ContainerApp,
        ingress: &Ingress,
    ) -> Result<(), PlatformError> {
        let body = json!({
            "location": app.location,
            "properties": {
                "configuration": {
                    "ingress": ingress,
                }
            }
        });

        self.arm
            .patch(&app.id, CONTAINER_APPS_API_VERSION, &body)
            .await?;
        info!(app = %app.name, "Updated container app ingress");
        Ok(())
    }
}

#[cfg(test)]
#[path = "container_apps_tests.rs"]
mod container_apps_tests;
