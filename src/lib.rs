// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # acacert - DNS-01 certificates for Azure Container Apps
//!
//! acacert issues and renews Let's Encrypt certificates for custom domains
//! served by Azure Container Apps, proving domain control through DNS-01 proof
//! records in Azure DNS.
//!
//! ## Overview
//!
//! One run either scans the certificates installed on a managed environment
//! and renews those close to expiry, or issues a first certificate for one
//! explicitly named domain. Every domain goes through the same sequence:
//!
//! 1. Find the Azure DNS zone that owns the domain (skip the domain if none)
//! 2. Register the per-domain ACME account and order `domain` + `*.domain`
//! 3. Publish the DNS-01 digests and wait until public DNS serves them
//! 4. Let the authority validate, then finalize and export the certificate
//! 5. Upload it, repoint every custom-domain binding and retire old certificates
//!
//! ## Modules
//!
//! - [`config`] - environment-driven configuration and pre-flight validation
//! - [`acme`] - the certificate authority capability and its ACME client
//! - [`dns`] - Azure DNS zone client and public propagation checks
//! - [`platform`] - Container Apps certificate store and ingress bindings
//! - [`renewal`] - the per-domain renewal workflow
//! - [`scanner`] - expiry scanning of installed certificates
//! - [`runner`] - scan and bootstrap batch entrypoints
//! - [`arm`] / [`credentials`] - Azure Resource Manager plumbing
//!
//! ## Example
//!
//! ```rust,no_run
//! use acacert::types::{derive_account_id, requested_names};
//!
//! let account = derive_account_id("certs@example.org", "shop.example.com").unwrap();
//! assert_eq!(account, "certs+shop.example.com@example.org");
//! assert_eq!(requested_names("shop.example.com")[1], "*.shop.example.com");
//! ```

pub mod acme;
pub mod arm;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod dns;
pub mod errors;
pub mod platform;
pub mod poll;
pub mod renewal;
pub mod runner;
pub mod scanner;
pub mod types;

#[cfg(test)]
pub mod testing;
