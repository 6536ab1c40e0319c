// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Core value types shared by the renewal workflow.

use std::fmt;
use std::str::FromStr;

use crate::constants::{LETSENCRYPT_PRODUCTION_DIRECTORY, LETSENCRYPT_STAGING_DIRECTORY};
use crate::errors::ConfigError;

/// Separator between the fields of the `ACME_DN` configuration string.
pub const DN_SEPARATOR: char = '/';

/// Subject fields placed into every certificate signing request.
///
/// Parsed from `Country/State/Locality/Organization/OrgUnit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedNameSpec {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
}

impl FromStr for DistinguishedNameSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split(DN_SEPARATOR).map(str::trim).collect();
        let [country, state, locality, organization, organizational_unit] = segments[..] else {
            return Err(ConfigError::MalformedDistinguishedName {
                segments: segments.len(),
            });
        };

        Ok(Self {
            country: country.to_string(),
            state: state.to_string(),
            locality: locality.to_string(),
            organization: organization.to_string(),
            organizational_unit: organizational_unit.to_string(),
        })
    }
}

/// Derive the per-domain ACME account identifier from the base account.
///
/// The domain is inserted before the `@` using plus-addressing, so
/// `certs@example.org` renewing `shop.example.com` registers as
/// `certs+shop.example.com@example.org`.
///
/// # Errors
///
/// Returns [`ConfigError::MalformedAccount`] unless `base` contains exactly
/// one `@` with non-empty parts on both sides.
pub fn derive_account_id(base: &str, domain: &str) -> Result<String, ConfigError> {
    let malformed = || ConfigError::MalformedAccount {
        account: base.to_string(),
    };

    let mut parts = base.split('@');
    let (Some(local), Some(host), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    if local.is_empty() || host.is_empty() {
        return Err(malformed());
    }

    Ok(format!("{local}+{domain}@{host}"))
}

/// Names requested in every order: the bare domain and its wildcard.
#[must_use]
pub fn requested_names(domain: &str) -> Vec<String> {
    vec![domain.to_string(), format!("*.{domain}")]
}

/// ACME directory the certificates are requested from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum AcmeEnvironment {
    /// Let's Encrypt production
    #[default]
    Production,
    /// Let's Encrypt staging (untrusted certificates, generous rate limits)
    Staging,
}

impl AcmeEnvironment {
    /// Directory URL of this environment.
    #[must_use]
    pub fn directory_url(self) -> &'static str {
        match self {
            Self::Production => LETSENCRYPT_PRODUCTION_DIRECTORY,
            Self::Staging => LETSENCRYPT_STAGING_DIRECTORY,
        }
    }
}

impl fmt::Display for AcmeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("Production"),
            Self::Staging => f.write_str("Staging"),
        }
    }
}

/// Everything the orchestrator needs to renew one domain.
#[derive(Debug, Clone)]
pub struct RenewalRequest {
    /// Fully-qualified domain to issue for
    pub domain: String,
    /// Base account identifier (e-mail)
    pub account: String,
    /// Subject fields of the CSR
    pub dn: DistinguishedNameSpec,
    /// ACME directory to use
    pub environment: AcmeEnvironment,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
