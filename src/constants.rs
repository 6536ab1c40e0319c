// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for acacert.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// ACME Constants
// ============================================================================

/// Let's Encrypt production directory URL
pub const LETSENCRYPT_PRODUCTION_DIRECTORY: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory URL
pub const LETSENCRYPT_STAGING_DIRECTORY: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Upper bound for a single ACME protocol call (account, order, finalize, ...)
pub const ACME_CALL_TIMEOUT_SECS: u64 = 90;

/// Interval between authorization status polls
pub const AUTHORIZATION_POLL_INTERVAL_SECS: u64 = 5;

/// Maximum authorization status polls before giving up (10 minutes)
pub const AUTHORIZATION_POLL_MAX_ATTEMPTS: u32 = 120;

/// Interval between order status polls while the certificate is being issued
pub const ORDER_POLL_INTERVAL_SECS: u64 = 2;

/// Maximum order status polls after finalization
pub const ORDER_POLL_MAX_ATTEMPTS: u32 = 60;

/// Number of random bytes behind a generated archive password
pub const ARCHIVE_PASSWORD_BYTES: usize = 24;

// ============================================================================
// DNS Constants
// ============================================================================

/// Label prefix of the DNS-01 proof record
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// TTL of the DNS-01 proof record set
pub const CHALLENGE_RECORD_TTL_SECS: u32 = 60;

/// Interval between public resolver checks while waiting for propagation
pub const PROPAGATION_POLL_INTERVAL_SECS: u64 = 10;

/// Maximum public resolver checks (~50 minutes)
pub const PROPAGATION_POLL_MAX_ATTEMPTS: u32 = 300;

/// Default public resolver used for propagation checks
pub const DEFAULT_PUBLIC_RESOLVER: &str = "8.8.8.8:53";

/// Timeout of a single resolver query
pub const RESOLVER_QUERY_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Azure Resource Manager Constants
// ============================================================================

/// Default Azure Resource Manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Default Entra ID token authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// OAuth2 scope for the management plane
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// API version for `Microsoft.Network/dnszones`
pub const DNS_API_VERSION: &str = "2018-05-01";

/// API version for `Microsoft.App` resources
pub const CONTAINER_APPS_API_VERSION: &str = "2024-03-01";

/// Timeout of a single management-plane HTTP request
pub const ARM_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connect timeout for management-plane HTTP requests
pub const ARM_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Refresh access tokens this long before they expire
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

/// Interval between long-running operation status polls
pub const LRO_POLL_INTERVAL_SECS: u64 = 5;

/// Maximum long-running operation status polls (10 minutes)
pub const LRO_POLL_MAX_ATTEMPTS: u32 = 120;

// ============================================================================
// Certificate Store Constants
// ============================================================================

/// Maximum length of a generated certificate resource name
pub const CERTIFICATE_NAME_MAX_LEN: usize = 60;

/// Length of the random hex suffix appended to certificate resource names
pub const CERTIFICATE_NAME_SUFFIX_LEN: usize = 8;

/// Prefix of the subject name stored on installed certificates
pub const SUBJECT_COMMON_NAME_PREFIX: &str = "CN=";

// ============================================================================
// Runner Constants
// ============================================================================

/// Default renewal threshold in days
pub const DEFAULT_EXPIRING_DAYS: i64 = 30;
