// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Publication of the DNS-01 proof record set.

use tracing::info;

use crate::constants::CHALLENGE_RECORD_TTL_SECS;
use crate::dns::{DnsZone, DnsZoneClient, TxtRecordSet};
use crate::errors::DnsZoneError;

/// Replace the record set at `relative_name` with one holding `values`.
///
/// Any existing record set is deleted first and never merged, so the zone
/// ends up with exactly one record set carrying only the current digests.
///
/// # Errors
///
/// Propagates any [`DnsZoneError`] from the zone API.
pub async fn publish_proof(
    dns: &dyn DnsZoneClient,
    zone: &DnsZone,
    relative_name: &str,
    values: &[String],
) -> Result<TxtRecordSet, DnsZoneError> {
    if let Some(existing) = dns.get_txt_record(zone, relative_name).await? {
        info!(
            zone = %zone.name,
            record = %relative_name,
            stale_values = existing.values.len(),
            "Removing existing proof record set"
        );
        dns.delete_txt_record(&existing).await?;
    }

    dns.create_txt_record(zone, relative_name, CHALLENGE_RECORD_TTL_SECS, values)
        .await
}

#[cfg(test)]
#[path = "proof_tests.rs"]
mod proof_tests;
