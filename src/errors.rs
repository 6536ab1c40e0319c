// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for acacert.
//!
//! This module provides specialized error types for:
//! - Pre-flight configuration validation
//! - Azure Resource Manager HTTP API operations (DNS zones, Container Apps)
//! - ACME certificate authority operations
//! - The per-domain renewal workflow
//!
//! Every error exposes a stable CamelCase `status_reason()` so a failed
//! renewal can be reported as a single, greppable failure record.

use thiserror::Error;

use crate::acme::AuthorizationStatus;

/// Errors detected while validating the process configuration.
///
/// These are fatal and raised before any external system is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or empty
    #[error("Missing {variable} environment variable")]
    MissingVariable {
        /// The environment variable name
        variable: &'static str,
    },

    /// The distinguished name string does not split into exactly five fields
    #[error(
        "DN has an invalid format ({segments} segments), use Country/State/Locality/Organization/OrgUnit"
    )]
    MalformedDistinguishedName {
        /// Number of `/`-separated segments found
        segments: usize,
    },

    /// The base account identifier does not contain exactly one `@`
    #[error("Account identifier '{account}' must contain exactly one '@'")]
    MalformedAccount {
        /// The offending account identifier
        account: String,
    },

    /// The renewal threshold is negative
    #[error("Expiry threshold must not be negative (got {days})")]
    InvalidThreshold {
        /// The configured number of days
        days: i64,
    },

    /// The resolver address cannot be parsed as `ip:port`
    #[error("Invalid DNS resolver address '{address}'")]
    InvalidResolver {
        /// The configured address
        address: String,
    },
}

/// Errors returned by Azure Resource Manager calls.
///
/// The HTTP status is preserved so callers can map 404 to "absent"
/// without parsing error strings.
#[derive(Error, Debug, Clone)]
pub enum ArmError {
    /// The API answered with a non-success status
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Response body or error message
        message: String,
    },

    /// The request never produced a response (connect, TLS, timeout)
    #[error("HTTP request to {url} failed: {reason}")]
    Request {
        /// Request URL
        url: String,
        /// Transport failure description
        reason: String,
    },

    /// The response body did not match the expected shape
    #[error("Failed to decode response from {url}: {reason}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoding failure description
        reason: String,
    },

    /// The access token could not be acquired
    #[error("Failed to acquire access token: {0}")]
    Credential(String),

    /// A long-running operation ended in a non-success state
    #[error("Long-running operation at {url} ended with status {status}")]
    OperationFailed {
        /// Operation status URL
        url: String,
        /// Terminal status reported by the service
        status: String,
    },

    /// A long-running operation did not finish within the polling budget
    #[error("Long-running operation at {url} did not finish after {attempts} polls")]
    OperationTimeout {
        /// Operation status URL
        url: String,
        /// Number of polls performed
        attempts: u32,
    },
}

impl ArmError {
    /// Returns the HTTP status code when the service answered with an error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the service answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors that can occur while talking to the ACME certificate authority.
#[derive(Error, Debug, Clone)]
pub enum AuthorityError {
    /// No account has been registered for the current renewal
    #[error("ACME account not registered - call register_account() first")]
    NoAccount,

    /// Account registration failed
    #[error("Failed to register ACME account '{account}': {reason}")]
    AccountRegistration {
        /// The derived account identifier
        account: String,
        /// Failure description
        reason: String,
    },

    /// Order creation or refresh failed
    #[error("Certificate order failed: {0}")]
    Order(String),

    /// The order handle does not belong to this client
    #[error("Unknown certificate order #{0}")]
    UnknownOrder(u64),

    /// The authorization does not offer a DNS-01 challenge
    #[error("No DNS-01 challenge available for '{identifier}'")]
    NoDnsChallenge {
        /// The authorization identifier
        identifier: String,
    },

    /// Challenge retrieval or signaling failed
    #[error("Challenge operation failed for '{identifier}': {reason}")]
    Challenge {
        /// The authorization identifier
        identifier: String,
        /// Failure description
        reason: String,
    },

    /// Key generation, CSR construction or finalization failed
    #[error("Failed to finalize certificate: {0}")]
    Finalization(String),

    /// The certificate could not be exported as a PKCS#12 archive
    #[error("Failed to export certificate archive: {0}")]
    Export(String),

    /// A single protocol call exceeded its time limit
    #[error("ACME operation '{operation}' timed out after {timeout_secs}s")]
    Timeout {
        /// The operation that timed out
        operation: &'static str,
        /// The time limit in seconds
        timeout_secs: u64,
    },
}

impl From<instant_acme::Error> for AuthorityError {
    fn from(e: instant_acme::Error) -> Self {
        Self::Order(e.to_string())
    }
}

/// Errors that can occur during DNS zone operations.
#[derive(Error, Debug, Clone)]
pub enum DnsZoneError {
    /// The zone API call failed
    #[error(transparent)]
    Api(#[from] ArmError),

    /// The proof record name does not end with the zone name
    #[error("Record '{record}' is not inside zone '{zone}'")]
    RecordOutsideZone {
        /// The fully-qualified record name
        record: String,
        /// The zone name
        zone: String,
    },
}

/// Errors that can occur during Container Apps platform operations.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// The platform API call failed
    #[error(transparent)]
    Api(#[from] ArmError),

    /// The managed environment resource lacks a location
    #[error("Managed environment '{environment}' has no location")]
    MissingLocation {
        /// The environment resource id
        environment: String,
    },
}

/// Per-domain renewal failures.
///
/// A `RenewalError` aborts the renewal of one domain; the batch continues
/// with the next domain.
#[derive(Error, Debug, Clone)]
pub enum RenewalError {
    /// Input for this domain is malformed
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// An authorization reached a terminal, non-valid status
    #[error("Validation failed for '{identifier}' with status {status:?}")]
    AuthorityValidation {
        /// The authorization identifier
        identifier: String,
        /// The terminal status reported by the authority
        status: AuthorizationStatus,
    },

    /// An authorization stayed pending past the polling budget
    #[error("Authorization for '{identifier}' still pending after {attempts} polls")]
    AuthorizationTimeout {
        /// The authorization identifier
        identifier: String,
        /// Number of polls performed
        attempts: u32,
    },

    /// The proof record never became publicly visible
    #[error("Proof record '{record}' not visible after {attempts} checks, missing {missing:?}")]
    PropagationTimeout {
        /// The fully-qualified proof record name
        record: String,
        /// Number of resolver checks performed
        attempts: u32,
        /// Expected values that were still absent on the last check
        missing: Vec<String>,
    },

    /// Certificate authority call failed
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// DNS zone call failed
    #[error(transparent)]
    DnsZone(#[from] DnsZoneError),

    /// Platform call failed
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl RenewalError {
    /// Returns the stable reason code used in the per-domain failure record.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::AuthorityValidation { .. } => "AuthorityValidationFailure",
            Self::AuthorizationTimeout { .. } => "AuthorizationTimeout",
            Self::PropagationTimeout { .. } => "PropagationTimeout",
            Self::Authority(AuthorityError::Timeout { .. }) => "AuthorityCallTimeout",
            Self::Authority(_) => "AuthorityApiError",
            Self::DnsZone(DnsZoneError::RecordOutsideZone { .. }) => "RecordOutsideZone",
            Self::DnsZone(DnsZoneError::Api(_)) => "DnsApiError",
            Self::Platform(_) => "PlatformApiError",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
