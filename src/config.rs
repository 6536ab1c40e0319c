// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration.
//!
//! Every option is read from the environment (the long flags mirror the same
//! options). [`RunConfig::from_cli`] performs all pre-flight validation so a
//! malformed configuration aborts the run before any external call.

use std::fmt;
use std::net::SocketAddr;

use clap::Parser;

use crate::constants::{
    DEFAULT_ARM_ENDPOINT, DEFAULT_AUTHORITY_HOST, DEFAULT_EXPIRING_DAYS, DEFAULT_PUBLIC_RESOLVER,
};
use crate::errors::ConfigError;
use crate::types::{derive_account_id, AcmeEnvironment, DistinguishedNameSpec};

/// Raw configuration surface.
#[derive(Parser, Clone)]
#[command(
    name = "acacert",
    version,
    about = "Issue and renew DNS-01 certificates for Azure Container Apps"
)]
pub struct Cli {
    /// Base ACME account e-mail
    #[arg(long, env = "ACME_ACCOUNT", default_value = "")]
    pub acme_account: String,

    /// Certificate subject as Country/State/Locality/Organization/OrgUnit
    #[arg(long, env = "ACME_DN", default_value = "")]
    pub acme_dn: String,

    /// ACME directory to request certificates from
    #[arg(long, env = "ACME_ENVIRONMENT", value_enum, ignore_case = true, default_value_t = AcmeEnvironment::Production)]
    pub acme_environment: AcmeEnvironment,

    /// Entra ID tenant
    #[arg(long, env = "ARM_TENANTID", default_value = "")]
    pub tenant_id: String,

    /// Service principal client id
    #[arg(long, env = "ARM_CLIENTID", default_value = "")]
    pub client_id: String,

    /// Service principal secret
    #[arg(long, env = "ARM_CLIENTSECRET", default_value = "", hide_env_values = true)]
    pub client_secret: String,

    /// Subscription holding the DNS zones and container apps
    #[arg(long, env = "ARM_SUBSCRIPTIONID", default_value = "")]
    pub subscription_id: String,

    /// Resource group of the managed environment
    #[arg(long, env = "ACA_RG", default_value = "")]
    pub resource_group: String,

    /// Managed environment name
    #[arg(long, env = "ACA_APPENV", default_value = "")]
    pub environment_name: String,

    /// Renew certificates expiring within this many days
    #[arg(long, env = "ACA_EXPIRING_DAYS", default_value_t = DEFAULT_EXPIRING_DAYS, allow_negative_numbers = true)]
    pub expiring_days: i64,

    /// Issue a certificate for this domain instead of scanning
    #[arg(long, env = "ACA_CREATE_FOR_DOMAIN")]
    pub create_for_domain: Option<String>,

    /// Public resolver used to confirm proof record propagation
    #[arg(long, env = "DNS_RESOLVER", default_value = DEFAULT_PUBLIC_RESOLVER)]
    pub dns_resolver: String,

    /// Azure Resource Manager endpoint
    #[arg(long, env = "ARM_ENDPOINT", default_value = DEFAULT_ARM_ENDPOINT)]
    pub arm_endpoint: String,

    /// Entra ID token authority
    #[arg(long, env = "ARM_AUTHORITY_HOST", default_value = DEFAULT_AUTHORITY_HOST)]
    pub authority_host: String,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("acme_account", &self.acme_account)
            .field("acme_environment", &self.acme_environment)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .field("resource_group", &self.resource_group)
            .field("environment_name", &self.environment_name)
            .field("create_for_domain", &self.create_for_domain)
            .finish_non_exhaustive()
    }
}

/// Service principal identity used for the management plane.
#[derive(Clone)]
pub struct AzureIdentity {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
}

impl fmt::Debug for AzureIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureIdentity")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// Which batch the process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Renew every installed certificate due within the threshold
    Scan {
        /// Threshold in days
        threshold_days: i64,
    },
    /// Issue a first certificate for one domain
    Bootstrap {
        /// Domain to issue for
        domain: String,
    },
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub account: String,
    pub dn: DistinguishedNameSpec,
    pub acme_environment: AcmeEnvironment,
    pub identity: AzureIdentity,
    pub resource_group: String,
    pub environment_name: String,
    pub resolver: SocketAddr,
    pub arm_endpoint: String,
    pub authority_host: String,
    pub mode: RunMode,
}

fn required(value: &str, variable: &'static str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingVariable { variable });
    }
    Ok(trimmed.to_string())
}

impl RunConfig {
    /// Validate the raw configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: a missing required variable,
    /// a DN without exactly five fields, an account without exactly one `@`,
    /// a negative threshold or an unparsable resolver address.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let account = required(&cli.acme_account, "ACME_ACCOUNT")?;
        let dn: DistinguishedNameSpec = required(&cli.acme_dn, "ACME_DN")?.parse()?;

        let identity = AzureIdentity {
            tenant_id: required(&cli.tenant_id, "ARM_TENANTID")?,
            client_id: required(&cli.client_id, "ARM_CLIENTID")?,
            client_secret: required(&cli.client_secret, "ARM_CLIENTSECRET")?,
            subscription_id: required(&cli.subscription_id, "ARM_SUBSCRIPTIONID")?,
        };
        let resource_group = required(&cli.resource_group, "ACA_RG")?;
        let environment_name = required(&cli.environment_name, "ACA_APPENV")?;

        // The domain only shapes the local part; any placeholder checks the base.
        derive_account_id(&account, "validation")?;

        if cli.expiring_days < 0 {
            return Err(ConfigError::InvalidThreshold {
                days: cli.expiring_days,
            });
        }

        let resolver = cli
            .dns_resolver
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidResolver {
                address: cli.dns_resolver.clone(),
            })?;

        let mode = match cli
            .create_for_domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            Some(domain) => RunMode::Bootstrap {
                domain: domain.trim_end_matches('.').to_ascii_lowercase(),
            },
            None => RunMode::Scan {
                threshold_days: cli.expiring_days,
            },
        };

        Ok(Self {
            account,
            dn,
            acme_environment: cli.acme_environment,
            identity,
            resource_group,
            environment_name,
            resolver,
            arm_endpoint: cli.arm_endpoint.trim_end_matches('/').to_string(),
            authority_host: cli.authority_host.trim_end_matches('/').to_string(),
            mode,
        })
    }

    /// Resource id of the managed environment.
    #[must_use]
    pub fn managed_environment_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.App/managedEnvironments/{}",
            self.identity.subscription_id, self.resource_group, self.environment_name
        )
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
