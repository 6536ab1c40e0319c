// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes of the capability traits and mock-server helpers.
//!
//! Every fake records the calls it receives as short strings
//! (`"create_txt _acme-challenge.shop"`) so tests can assert on ordering and
//! on the absence of calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::acme::{
    AuthorizationHandle, AuthorizationStatus, CertificateAuthority, ChallengeHandle, CsrFields,
    DnsChallenge, OrderHandle, PrivateKey,
};
use crate::arm::ArmClient;
use crate::config::{AzureIdentity, Cli, RunConfig};
use crate::credentials::ClientSecretCredential;
use crate::dns::{DnsZone, DnsZoneClient, TxtRecordSet, TxtResolver};
use crate::errors::{ArmError, AuthorityError, DnsZoneError, PlatformError};
use crate::platform::{
    BindingMode, CertificateStore, ContainerApp, CustomDomainBinding, Ingress,
    InstalledCertificate, ManagedEnvironment,
};
use crate::poll::PollPolicy;
use crate::types::AcmeEnvironment;

pub const TEST_ENVIRONMENT_ID: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.App/managedEnvironments/env";

fn record(calls: &Mutex<Vec<String>>, call: String) {
    if let Ok(mut calls) = calls.lock() {
        calls.push(call);
    }
}

fn snapshot(calls: &Mutex<Vec<String>>) -> Vec<String> {
    calls.lock().map(|c| c.clone()).unwrap_or_default()
}

/// Complete raw configuration in scan mode.
pub fn test_cli() -> Cli {
    Cli {
        acme_account: "certs@example.org".to_string(),
        acme_dn: "DE/Bavaria/Munich/Example GmbH/Platform".to_string(),
        acme_environment: AcmeEnvironment::Staging,
        tenant_id: "tenant".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        subscription_id: "sub".to_string(),
        resource_group: "rg".to_string(),
        environment_name: "env".to_string(),
        expiring_days: 30,
        create_for_domain: None,
        dns_resolver: "8.8.8.8:53".to_string(),
        arm_endpoint: "https://management.azure.com".to_string(),
        authority_host: "https://login.microsoftonline.com".to_string(),
    }
}

pub fn test_config() -> RunConfig {
    match RunConfig::from_cli(test_cli()) {
        Ok(config) => config,
        Err(e) => panic!("test configuration is invalid: {e}"),
    }
}

// --------------------------------------------------------------------------
// Mock server helpers
// --------------------------------------------------------------------------

pub fn test_identity() -> AzureIdentity {
    AzureIdentity {
        tenant_id: "tenant".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        subscription_id: "sub".to_string(),
    }
}

/// Answer token requests for [`test_identity`] with `test-token`.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "test-token",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

/// Polling budget for long-running operations against a mock server.
pub fn fast_operation_policy() -> PollPolicy {
    PollPolicy {
        initial_delay: Duration::ZERO,
        interval: Duration::from_millis(10),
        max_attempts: 3,
    }
}

/// ARM client whose management plane and token authority are `server`.
pub async fn arm_client(server: &MockServer) -> Arc<ArmClient> {
    mount_token_endpoint(server).await;
    let http = reqwest::Client::new();
    let credential = ClientSecretCredential::new(http.clone(), &server.uri(), &test_identity());
    Arc::new(
        ArmClient::new(http, &server.uri(), Arc::new(credential))
            .with_operation_policy(fast_operation_policy()),
    )
}

// --------------------------------------------------------------------------
// Certificate authority
// --------------------------------------------------------------------------

/// Authority that issues a placeholder chain.
///
/// Each authorization reports the statuses queued for its index, then
/// `Valid`. Challenge digests are `digest-<index>`.
#[derive(Default)]
pub struct FakeAuthority {
    calls: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<usize, VecDeque<AuthorizationStatus>>>,
    fail_on: Mutex<Option<&'static str>>,
    next_order: AtomicU32,
}

impl FakeAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue statuses reported for authorization `index`.
    pub fn with_statuses(self, index: usize, statuses: &[AuthorizationStatus]) -> Self {
        if let Ok(mut queued) = self.statuses.lock() {
            queued.insert(index, statuses.iter().copied().collect());
        }
        self
    }

    /// Fail the named operation with an order error.
    pub fn failing_on(self, operation: &'static str) -> Self {
        if let Ok(mut fail_on) = self.fail_on.lock() {
            *fail_on = Some(operation);
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        snapshot(&self.calls)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn enter(&self, operation: &'static str, call: String) -> Result<(), AuthorityError> {
        record(&self.calls, call);
        match self.fail_on.lock() {
            Ok(fail_on) if *fail_on == Some(operation) => {
                Err(AuthorityError::Order(format!("{operation} rejected")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CertificateAuthority for FakeAuthority {
    async fn register_account(
        &self,
        account_id: &str,
        environment: AcmeEnvironment,
    ) -> Result<(), AuthorityError> {
        self.enter(
            "register_account",
            format!("register_account {account_id} {environment}"),
        )
    }

    async fn new_order(&self, names: &[String]) -> Result<OrderHandle, AuthorityError> {
        self.enter("new_order", format!("new_order {}", names.join(",")))?;
        Ok(OrderHandle {
            id: u64::from(self.next_order.fetch_add(1, Ordering::SeqCst)) + 1,
            names: names.to_vec(),
        })
    }

    async fn authorizations(
        &self,
        order: &OrderHandle,
    ) -> Result<Vec<AuthorizationHandle>, AuthorityError> {
        self.enter("authorizations", format!("authorizations {}", order.id))?;
        Ok(order
            .names
            .iter()
            .enumerate()
            .map(|(index, name)| AuthorizationHandle {
                order_id: order.id,
                index,
                identifier: name.trim_start_matches("*.").to_string(),
            })
            .collect())
    }

    async fn dns_challenge(
        &self,
        authorization: &AuthorizationHandle,
    ) -> Result<DnsChallenge, AuthorityError> {
        self.enter(
            "dns_challenge",
            format!("dns_challenge {}", authorization.index),
        )?;
        Ok(DnsChallenge {
            token: format!("token-{}", authorization.index),
            digest: format!("digest-{}", authorization.index),
            challenge: ChallengeHandle {
                order_id: authorization.order_id,
                url: format!("https://acme.test/chall/{}", authorization.index),
                identifier: authorization.identifier.clone(),
            },
        })
    }

    async fn notify_ready(&self, challenge: &ChallengeHandle) -> Result<(), AuthorityError> {
        self.enter("notify_ready", format!("notify_ready {}", challenge.url))
    }

    async fn authorization_status(
        &self,
        authorization: &AuthorizationHandle,
    ) -> Result<AuthorizationStatus, AuthorityError> {
        self.enter(
            "authorization_status",
            format!("authorization_status {}", authorization.index),
        )?;
        let next = self
            .statuses
            .lock()
            .ok()
            .and_then(|mut queued| queued.get_mut(&authorization.index)?.pop_front());
        Ok(next.unwrap_or(AuthorizationStatus::Valid))
    }

    async fn finalize(
        &self,
        order: &OrderHandle,
        csr: &CsrFields,
        _key: &PrivateKey,
    ) -> Result<String, AuthorityError> {
        self.enter(
            "finalize",
            format!("finalize {} {}", order.id, csr.common_name),
        )?;
        Ok(format!("CHAIN {}", csr.common_name))
    }

    fn export_pfx(
        &self,
        chain_pem: &str,
        _key: &PrivateKey,
        _password: &str,
        friendly_name: &str,
    ) -> Result<Vec<u8>, AuthorityError> {
        self.enter("export_pfx", format!("export_pfx {friendly_name}"))?;
        Ok(chain_pem.as_bytes().to_vec())
    }
}

// --------------------------------------------------------------------------
// DNS zone and resolver
// --------------------------------------------------------------------------

/// Zone API holding record sets in memory.
#[derive(Default)]
pub struct FakeDns {
    zones: Vec<DnsZone>,
    records: Mutex<HashMap<String, TxtRecordSet>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDns {
    pub fn with_zones(names: &[&str]) -> Self {
        Self {
            zones: names
                .iter()
                .map(|name| DnsZone {
                    id: format!("/zones/{name}"),
                    name: (*name).to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Seed an existing record set.
    pub fn with_record(self, zone: &str, relative_name: &str, values: &[&str]) -> Self {
        let id = format!("/zones/{zone}/TXT/{relative_name}");
        if let Ok(mut records) = self.records.lock() {
            records.insert(
                id.clone(),
                TxtRecordSet {
                    id,
                    name: relative_name.to_string(),
                    ttl: 3600,
                    values: values.iter().map(|v| (*v).to_string()).collect(),
                },
            );
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        snapshot(&self.calls)
    }

    pub fn records(&self) -> Vec<TxtRecordSet> {
        self.records
            .lock()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DnsZoneClient for FakeDns {
    async fn find_zone_for_suffix(&self, domain: &str) -> Result<Option<DnsZone>, DnsZoneError> {
        record(&self.calls, format!("find_zone {domain}"));
        Ok(crate::dns::select_zone(&self.zones, domain).cloned())
    }

    async fn get_txt_record(
        &self,
        zone: &DnsZone,
        relative_name: &str,
    ) -> Result<Option<TxtRecordSet>, DnsZoneError> {
        record(&self.calls, format!("get_txt {relative_name}"));
        let id = format!("{}/TXT/{relative_name}", zone.id);
        Ok(self
            .records
            .lock()
            .ok()
            .and_then(|records| records.get(&id).cloned()))
    }

    async fn delete_txt_record(&self, txt: &TxtRecordSet) -> Result<(), DnsZoneError> {
        record(&self.calls, format!("delete_txt {}", txt.name));
        if let Ok(mut records) = self.records.lock() {
            records.remove(&txt.id);
        }
        Ok(())
    }

    async fn create_txt_record(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        ttl: u32,
        values: &[String],
    ) -> Result<TxtRecordSet, DnsZoneError> {
        record(&self.calls, format!("create_txt {relative_name}"));
        let id = format!("{}/TXT/{relative_name}", zone.id);
        let txt = TxtRecordSet {
            id: id.clone(),
            name: relative_name.to_string(),
            ttl,
            values: values.to_vec(),
        };
        if let Ok(mut records) = self.records.lock() {
            records.insert(id, txt.clone());
        }
        Ok(txt)
    }
}

/// Resolver returning scripted answers, then repeating the last one.
#[derive(Default)]
pub struct ScriptedResolver {
    answers: Mutex<VecDeque<Vec<String>>>,
    last: Mutex<Vec<String>>,
    queries: AtomicU32,
}

impl ScriptedResolver {
    pub fn new(answers: Vec<Vec<&str>>) -> Self {
        Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.into_iter().map(str::to_string).collect())
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Resolver that always returns `values`.
    pub fn always(values: &[&str]) -> Self {
        Self::new(vec![values.to_vec()])
    }

    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxtResolver for ScriptedResolver {
    async fn query_txt(&self, _fqdn: &str) -> Vec<String> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let next = self.answers.lock().ok().and_then(|mut a| a.pop_front());
        match (next, self.last.lock()) {
            (Some(answer), Ok(mut last)) => {
                last.clone_from(&answer);
                answer
            }
            (None, Ok(last)) => last.clone(),
            (Some(answer), Err(_)) => answer,
            (None, Err(_)) => Vec::new(),
        }
    }
}

// --------------------------------------------------------------------------
// Platform
// --------------------------------------------------------------------------

/// Platform holding certificates and apps in memory.
pub struct FakeStore {
    environment: ManagedEnvironment,
    certificates: Mutex<Vec<InstalledCertificate>>,
    apps: Mutex<Vec<ContainerApp>>,
    failing_deletes: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            environment: ManagedEnvironment {
                id: TEST_ENVIRONMENT_ID.to_string(),
                name: "env".to_string(),
                location: "westeurope".to_string(),
            },
            certificates: Mutex::new(Vec::new()),
            apps: Mutex::new(Vec::new()),
            failing_deletes: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

/// Resource id of the certificate `name` in the test environment.
pub fn certificate_id(name: &str) -> String {
    format!("{TEST_ENVIRONMENT_ID}/certificates/{name}")
}

/// Installed certificate for `domain` expiring at `expires_on`.
pub fn installed(name: &str, domain: &str, expires_on: DateTime<Utc>) -> InstalledCertificate {
    InstalledCertificate {
        id: certificate_id(name),
        name: name.to_string(),
        subject_name: format!("CN={domain}"),
        expires_on,
    }
}

/// App in `environment_id` with SNI bindings `(domain, certificate name)`.
pub fn app(name: &str, environment_id: &str, bindings: &[(&str, &str)]) -> ContainerApp {
    ContainerApp {
        id: format!("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.App/containerApps/{name}"),
        name: name.to_string(),
        location: "westeurope".to_string(),
        environment_id: environment_id.to_string(),
        ingress: Some(Ingress {
            custom_domains: bindings
                .iter()
                .map(|(domain, certificate)| CustomDomainBinding {
                    name: (*domain).to_string(),
                    certificate_id: Some(certificate_id(certificate)),
                    binding_type: BindingMode::SniEnabled,
                })
                .collect(),
            extra: serde_json::Map::new(),
        }),
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_certificates(self, certificates: Vec<InstalledCertificate>) -> Self {
        if let Ok(mut installed) = self.certificates.lock() {
            *installed = certificates;
        }
        self
    }

    pub fn with_apps(self, apps: Vec<ContainerApp>) -> Self {
        if let Ok(mut stored) = self.apps.lock() {
            *stored = apps;
        }
        self
    }

    /// Make deleting the certificate `name` fail.
    pub fn failing_delete(mut self, name: &str) -> Self {
        self.failing_deletes.insert(name.to_string());
        self
    }

    pub fn environment(&self) -> ManagedEnvironment {
        self.environment.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        snapshot(&self.calls)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn certificate_names(&self) -> Vec<String> {
        self.certificates
            .lock()
            .map(|c| c.iter().map(|cert| cert.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn apps(&self) -> Vec<ContainerApp> {
        self.apps.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CertificateStore for FakeStore {
    async fn get_environment(
        &self,
        environment_id: &str,
    ) -> Result<ManagedEnvironment, PlatformError> {
        record(&self.calls, format!("get_environment {environment_id}"));
        Ok(self.environment.clone())
    }

    async fn list_certificates(
        &self,
        _environment: &ManagedEnvironment,
    ) -> Result<Vec<InstalledCertificate>, PlatformError> {
        record(&self.calls, "list_certificates".to_string());
        Ok(self
            .certificates
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn upload_certificate(
        &self,
        environment: &ManagedEnvironment,
        name: &str,
        payload: &[u8],
        _password: &str,
    ) -> Result<InstalledCertificate, PlatformError> {
        record(&self.calls, format!("upload_certificate {name}"));
        let subject = String::from_utf8_lossy(payload)
            .trim_start_matches("CHAIN ")
            .to_string();
        let certificate = InstalledCertificate {
            id: format!("{}/certificates/{name}", environment.id),
            name: name.to_string(),
            subject_name: format!("CN={subject}"),
            expires_on: Utc::now() + chrono::Duration::days(90),
        };
        if let Ok(mut installed) = self.certificates.lock() {
            installed.push(certificate.clone());
        }
        Ok(certificate)
    }

    async fn delete_certificate(
        &self,
        _environment: &ManagedEnvironment,
        name: &str,
    ) -> Result<(), PlatformError> {
        record(&self.calls, format!("delete_certificate {name}"));
        if self.failing_deletes.contains(name) {
            return Err(PlatformError::Api(ArmError::Http {
                status: 409,
                url: certificate_id(name),
                message: "certificate is in use".to_string(),
            }));
        }
        if let Ok(mut installed) = self.certificates.lock() {
            installed.retain(|cert| cert.name != name);
        }
        Ok(())
    }

    async fn list_apps(&self) -> Result<Vec<ContainerApp>, PlatformError> {
        record(&self.calls, "list_apps".to_string());
        Ok(self.apps())
    }

    async fn update_app_ingress(
        &self,
        app: &ContainerApp,
        ingress: &Ingress,
    ) -> Result<(), PlatformError> {
        record(&self.calls, format!("update_app_ingress {}", app.name));
        if let Ok(mut apps) = self.apps.lock() {
            if let Some(stored) = apps.iter_mut().find(|a| a.id == app.id) {
                stored.ingress = Some(ingress.clone());
            }
        }
        Ok(())
    }
}
