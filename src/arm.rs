// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Resource Manager HTTP plumbing.
//!
//! This module contains the request helper shared by the DNS zone client and
//! the Container Apps certificate store:
//! - bearer authentication through [`ClientSecretCredential`]
//! - error mapping that preserves the HTTP status
//! - `nextLink` pagination for list operations
//! - waiting for long-running operations (`Azure-AsyncOperation` / `Location`)
//!
//! Failed calls are not retried here; the caller's renewal aborts instead.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::constants::{ARM_CONNECT_TIMEOUT_SECS, ARM_REQUEST_TIMEOUT_SECS};
use crate::credentials::ClientSecretCredential;
use crate::errors::ArmError;
use crate::poll::{poll_until, Attempt, PollError, PollPolicy};

/// Header carrying the operation status URL of an asynchronous ARM call
const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Build the shared HTTP client with call-level timeouts.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client() -> Result<HttpClient, reqwest::Error> {
    HttpClient::builder()
        .connect_timeout(Duration::from_secs(ARM_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(ARM_REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("acacert/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// One page of an ARM list operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    next_link: Option<String>,
}

/// Body of an `Azure-AsyncOperation` status resource.
#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
}

/// Raw response of a management-plane call.
#[derive(Debug)]
struct ArmResponse {
    status: StatusCode,
    operation_url: Option<String>,
    body: String,
}

fn operation_url(status: StatusCode, headers: &HeaderMap) -> Option<String> {
    if status != StatusCode::CREATED && status != StatusCode::ACCEPTED {
        return None;
    }
    headers
        .get(AZURE_ASYNC_OPERATION)
        .or_else(|| headers.get(LOCATION))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ArmError> {
    serde_json::from_str(body).map_err(|e| ArmError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Authenticated client for the Azure Resource Manager API.
pub struct ArmClient {
    http: HttpClient,
    endpoint: String,
    credential: Arc<ClientSecretCredential>,
    operation_policy: PollPolicy,
}

impl ArmClient {
    /// Create a client for `endpoint` (e.g. `https://management.azure.com`).
    #[must_use]
    pub fn new(http: HttpClient, endpoint: &str, credential: Arc<ClientSecretCredential>) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
            operation_policy: PollPolicy::long_running_operation(),
        }
    }

    /// Override the long-running operation polling budget.
    #[must_use]
    pub fn with_operation_policy(mut self, policy: PollPolicy) -> Self {
        self.operation_policy = policy;
        self
    }

    /// Absolute URL of a resource path at the given API version.
    #[must_use]
    pub fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<ArmResponse, ArmError> {
        debug!(method = %method, url = %url, "ARM request");

        let token = self.credential.token().await?;
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ArmError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let operation_url = operation_url(status, response.headers());
        let text = response.text().await.map_err(|e| ArmError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            if status != StatusCode::NOT_FOUND {
                error!(
                    method = %method,
                    url = %url,
                    status = %status,
                    error = %text,
                    "ARM request failed"
                );
            }
            return Err(ArmError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                message: text,
            });
        }

        Ok(ArmResponse {
            status,
            operation_url,
            body: text,
        })
    }

    /// GET a resource.
    ///
    /// # Errors
    ///
    /// Returns an [`ArmError`] on any non-success status or decoding failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<T, ArmError> {
        let url = self.url(path, api_version);
        let response = self.send::<()>(Method::GET, &url, None).await?;
        decode(&url, &response.body)
    }

    /// GET a resource, mapping 404 to `None`.
    ///
    /// # Errors
    ///
    /// Returns an [`ArmError`] on any non-success status other than 404.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<Option<T>, ArmError> {
        match self.get(path, api_version).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List a collection, following `nextLink` until exhausted.
    ///
    /// # Errors
    ///
    /// Returns an [`ArmError`] if any page fails.
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<Vec<T>, ArmError> {
        let mut next = Some(self.url(path, api_version));
        let mut all_items = Vec::new();
        let mut page_count = 0;

        while let Some(url) = next.take() {
            page_count += 1;
            let response = self.send::<()>(Method::GET, &url, None).await?;
            let page: Page<T> = decode(&url, &response.body)?;

            let item_count = page.value.len();
            all_items.extend(page.value);
            debug!(
                page = page_count,
                items_in_page = item_count,
                total_items = all_items.len(),
                "Fetched page from ARM"
            );

            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(all_items)
    }

    /// PUT a resource and return its final representation.
    ///
    /// # Errors
    ///
    /// Returns an [`ArmError`] if the call or its long-running operation fails.
    pub async fn put<B, T>(&self, path: &str, api_version: &str, body: &B) -> Result<T, ArmError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, api_version);
        let response = self.send(Method::PUT, &url, Some(body)).await?;

        match response.operation_url {
            Some(operation) => {
                self.wait_for_operation(&operation).await?;
                self.get(path, api_version).await
            }
            None => decode(&url, &response.body),
        }
    }

    /// PATCH a resource and wait until the update has been applied.
    ///
    /// # Errors
    ///
    /// Returns an [`ArmError`] if the call or its long-running operation fails.
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<(), ArmError> {
        let url = self.url(path, api_version);
        let response = self.send(Method::PATCH, &url, Some(body)).await?;
        if let Some(operation) = response.operation_url {
            self.wait_for_operation(&operation).await?;
        }
        Ok(())
    }

    /// DELETE a resource and wait until it is gone.
    ///
    /// # Errors
    ///
    /// Returns an [`ArmError`] if the call or its long-running operation fails.
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<(), ArmError> {
        let url = self.url(path, api_version);
        let response = self.send::<()>(Method::DELETE, &url, None).await?;
        if let Some(operation) = response.operation_url {
            self.wait_for_operation(&operation).await?;
        }
        debug!(url = %url, status = %response.status, "ARM resource deleted");
        Ok(())
    }

    /// One check of an operation status URL.
    async fn check_operation(&self, operation: &str) -> Result<Attempt<()>, ArmError> {
        let response = self.send::<()>(Method::GET, operation, None).await?;
        if response.status == StatusCode::ACCEPTED {
            return Ok(Attempt::Retry);
        }
        // Location-style operations finish with an empty or resource body
        let Ok(state) = serde_json::from_str::<OperationStatus>(&response.body) else {
            return Ok(Attempt::Done(()));
        };
        match state.status.as_str() {
            "Succeeded" => Ok(Attempt::Done(())),
            "Failed" | "Canceled" | "Cancelled" => Err(ArmError::OperationFailed {
                url: operation.to_string(),
                status: state.status,
            }),
            _ => Ok(Attempt::Retry),
        }
    }

    /// Poll an operation status URL until it reports completion.
    async fn wait_for_operation(&self, operation: &str) -> Result<(), ArmError> {
        debug!(operation = %operation, "Waiting for long-running operation");

        let result = poll_until(
            &self.operation_policy,
            "arm long-running operation",
            move |_| self.check_operation(operation),
        )
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(PollError::Aborted(e)) => Err(e),
            Err(PollError::Exhausted { attempts }) => Err(ArmError::OperationTimeout {
                url: operation.to_string(),
                attempts,
            }),
        }
    }
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "arm_tests.rs"]
mod arm_tests;
