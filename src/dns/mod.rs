// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS capabilities used to publish and confirm the DNS-01 proof record.
//!
//! - [`DnsZoneClient`] manages TXT record sets in the authoritative zone
//! - [`propagation`] confirms that a record is visible through a public resolver
//!
//! The helpers in this module compute record names: the proof record lives at
//! `_acme-challenge.<domain>`, but zone APIs address record sets relative to
//! the zone (`_acme-challenge.shop` in zone `example.com`).

pub mod azure;
pub mod propagation;

use async_trait::async_trait;

pub use azure::AzureDnsClient;
pub use propagation::{DnsPropagationChecker, PublicResolver, TxtResolver};

use crate::constants::ACME_CHALLENGE_LABEL;
use crate::errors::DnsZoneError;

/// An authoritative DNS zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsZone {
    /// Resource id of the zone
    pub id: String,
    /// Zone apex, e.g. `example.com`
    pub name: String,
}

/// A TXT record set inside a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecordSet {
    /// Resource id of the record set
    pub id: String,
    /// Name relative to the zone
    pub name: String,
    /// Time to live in seconds
    pub ttl: u32,
    /// One entry per TXT record
    pub values: Vec<String>,
}

/// Operations on the authoritative zones visible to the credential.
#[async_trait]
pub trait DnsZoneClient: Send + Sync {
    /// First zone that `domain` equals or is a subdomain of.
    async fn find_zone_for_suffix(&self, domain: &str) -> Result<Option<DnsZone>, DnsZoneError>;

    /// TXT record set at `relative_name`, `None` if it does not exist.
    async fn get_txt_record(
        &self,
        zone: &DnsZone,
        relative_name: &str,
    ) -> Result<Option<TxtRecordSet>, DnsZoneError>;

    /// Delete a TXT record set.
    async fn delete_txt_record(&self, record: &TxtRecordSet) -> Result<(), DnsZoneError>;

    /// Create (or replace) the TXT record set at `relative_name`.
    async fn create_txt_record(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        ttl: u32,
        values: &[String],
    ) -> Result<TxtRecordSet, DnsZoneError>;
}

/// Returns true if `domain` is the zone apex or lies below it.
///
/// Matching is case-insensitive and respects label boundaries, so
/// `notexample.com` does not match zone `example.com`.
#[must_use]
pub fn zone_matches(zone: &str, domain: &str) -> bool {
    let zone = zone.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();

    if zone.is_empty() {
        return false;
    }
    domain == zone || domain.ends_with(&format!(".{zone}"))
}

/// First zone in `zones` that owns `domain`.
#[must_use]
pub fn select_zone<'a>(zones: &'a [DnsZone], domain: &str) -> Option<&'a DnsZone> {
    zones.iter().find(|zone| zone_matches(&zone.name, domain))
}

/// Fully-qualified proof record name for `domain`.
#[must_use]
pub fn challenge_record_fqdn(domain: &str) -> String {
    format!("{ACME_CHALLENGE_LABEL}.{}", domain.trim_end_matches('.'))
}

/// Name of `fqdn` relative to `zone`.
///
/// # Errors
///
/// Returns [`DnsZoneError::RecordOutsideZone`] if `fqdn` is not below `zone`.
pub fn relative_record_name(fqdn: &str, zone: &str) -> Result<String, DnsZoneError> {
    let record = fqdn.trim_end_matches('.');
    let zone_name = zone.trim_end_matches('.');
    let outside = || DnsZoneError::RecordOutsideZone {
        record: record.to_string(),
        zone: zone_name.to_string(),
    };

    if record.eq_ignore_ascii_case(zone_name) {
        return Ok("@".to_string());
    }

    let split = record
        .len()
        .checked_sub(zone_name.len() + 1)
        .ok_or_else(outside)?;
    let (Some(relative), Some(suffix)) = (record.get(..split), record.get(split..)) else {
        return Err(outside());
    };
    let suffix_matches = suffix
        .strip_prefix('.')
        .is_some_and(|s| s.eq_ignore_ascii_case(zone_name));

    if !suffix_matches || relative.is_empty() {
        return Err(outside());
    }
    Ok(relative.to_string())
}
