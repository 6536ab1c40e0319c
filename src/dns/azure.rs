// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure DNS implementation of [`DnsZoneClient`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{select_zone, DnsZone, DnsZoneClient, TxtRecordSet};
use crate::arm::ArmClient;
use crate::constants::DNS_API_VERSION;
use crate::errors::DnsZoneError;

#[derive(Debug, Deserialize)]
struct ZoneResource {
    id: String,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TxtValue {
    value: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordSetProperties {
    #[serde(rename = "TTL", default)]
    ttl: u32,
    #[serde(rename = "TXTRecords", default)]
    txt_records: Vec<TxtValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordSetResource {
    #[serde(default, skip_serializing)]
    id: String,
    #[serde(default, skip_serializing)]
    name: String,
    #[serde(default)]
    properties: RecordSetProperties,
}

impl From<RecordSetResource> for TxtRecordSet {
    fn from(resource: RecordSetResource) -> Self {
        Self {
            id: resource.id,
            name: resource.name,
            ttl: resource.properties.ttl,
            // Long values arrive split into 255-byte chunks
            values: resource
                .properties
                .txt_records
                .into_iter()
                .map(|txt| txt.value.concat())
                .collect(),
        }
    }
}

fn record_set_path(zone: &DnsZone, relative_name: &str) -> String {
    format!("{}/TXT/{}", zone.id, relative_name)
}

/// DNS zones of one subscription, managed through Azure Resource Manager.
#[derive(Debug, Clone)]
pub struct AzureDnsClient {
    arm: Arc<ArmClient>,
    subscription_id: String,
}

impl AzureDnsClient {
    #[must_use]
    pub fn new(arm: Arc<ArmClient>, subscription_id: &str) -> Self {
        Self {
            arm,
            subscription_id: subscription_id.to_string(),
        }
    }

    async fn list_zones(&self) -> Result<Vec<DnsZone>, DnsZoneError> {
        let path = format!(
            "/subscriptions/{}/providers/Microsoft.Network/dnszones",
            self.subscription_id
        );
        let zones: Vec<ZoneResource> = self.arm.list(&path, DNS_API_VERSION).await?;
        Ok(zones
            .into_iter()
            .map(|z| DnsZone {
                id: z.id,
                name: z.name,
            })
            .collect())
    }
}

#[async_trait]
impl DnsZoneClient for AzureDnsClient {
    async fn find_zone_for_suffix(&self, domain: &str) -> Result<Option<DnsZone>, DnsZoneError> {
        let zones = self.list_zones().await?;
        debug!(domain = %domain, zone_count = zones.len(), "Searching DNS zones");
        Ok(select_zone(&zones, domain).cloned())
    }

    async fn get_txt_record(
        &self,
        zone: &DnsZone,
        relative_name: &str,
    ) -> Result<Option<TxtRecordSet>, DnsZoneError> {
        let path = record_set_path(zone, relative_name);
        let record: Option<RecordSetResource> =
            self.arm.get_optional(&path, DNS_API_VERSION).await?;
        Ok(record.map(TxtRecordSet::from))
    }

    async fn delete_txt_record(&self, record: &TxtRecordSet) -> Result<(), DnsZoneError> {
        self.arm.delete(&record.id, DNS_API_VERSION).await?;
        info!(record = %record.name, "Deleted TXT record set");
        Ok(())
    }

    async fn create_txt_record(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        ttl: u32,
        values: &[String],
    ) -> Result<TxtRecordSet, DnsZoneError> {
        let body = RecordSetResource {
            id: String::new(),
            name: String::new(),
            properties: RecordSetProperties {
                ttl,
                txt_records: values
                    .iter()
                    .map(|v| TxtValue {
                        value: vec![v.clone()],
                    })
                    .collect(),
            },
        };

        let path = record_set_path(zone, relative_name);
        let created: RecordSetResource = self.arm.put(&path, DNS_API_VERSION, &body).await?;
        info!(
            zone = %zone.name,
            record = %relative_name,
            values = values.len(),
            ttl = ttl,
            "Created TXT record set"
        );
        Ok(created.into())
    }
}

#[cfg(test)]
#[path = "azure_tests.rs"]
mod azure_tests;
