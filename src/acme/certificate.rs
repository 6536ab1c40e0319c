// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Key generation, CSR construction and PKCS#12 export.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use crate::constants::ARCHIVE_PASSWORD_BYTES;
use crate::errors::AuthorityError;
use crate::types::{requested_names, DistinguishedNameSpec};

/// Freshly generated certificate key (ECDSA P-256).
pub struct PrivateKey(KeyPair);

impl PrivateKey {
    /// Generate a new key; one is generated per issuance.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::Finalization`] if the crypto backend fails.
    pub fn generate() -> Result<Self, AuthorityError> {
        KeyPair::generate()
            .map(Self)
            .map_err(|e| AuthorityError::Finalization(format!("failed to generate key: {e}")))
    }

    /// PKCS#8 DER encoding of the key.
    #[must_use]
    pub fn pkcs8_der(&self) -> Vec<u8> {
        self.0.serialize_der()
    }

    pub(crate) fn key_pair(&self) -> &KeyPair {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").finish_non_exhaustive()
    }
}

/// Subject and names of a certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrFields {
    /// Subject common name
    pub common_name: String,
    /// Subject alternative names (bare domain and wildcard)
    pub subject_alt_names: Vec<String>,
    /// Remaining subject fields
    pub dn: DistinguishedNameSpec,
}

impl CsrFields {
    /// CSR fields for `domain` with subject `dn`.
    #[must_use]
    pub fn for_domain(domain: &str, dn: &DistinguishedNameSpec) -> Self {
        Self {
            common_name: domain.to_string(),
            subject_alt_names: requested_names(domain),
            dn: dn.clone(),
        }
    }
}

/// DER-encoded CSR for `fields`, signed with `key`.
///
/// # Errors
///
/// Returns [`AuthorityError::Finalization`] if a name is invalid or signing fails.
pub fn build_csr(fields: &CsrFields, key: &PrivateKey) -> Result<Vec<u8>, AuthorityError> {
    let mut params = CertificateParams::new(fields.subject_alt_names.clone())
        .map_err(|e| AuthorityError::Finalization(format!("invalid CSR names: {e}")))?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, fields.dn.country.as_str());
    dn.push(DnType::StateOrProvinceName, fields.dn.state.as_str());
    dn.push(DnType::LocalityName, fields.dn.locality.as_str());
    dn.push(DnType::OrganizationName, fields.dn.organization.as_str());
    dn.push(DnType::OrganizationalUnitName, fields.dn.organizational_unit.as_str());
    dn.push(DnType::CommonName, fields.common_name.as_str());
    params.distinguished_name = dn;

    let csr = params
        .serialize_request(key.key_pair())
        .map_err(|e| AuthorityError::Finalization(format!("failed to serialize CSR: {e}")))?;
    Ok(csr.der().to_vec())
}

/// Bundle the PEM chain and key into a password-protected PKCS#12 archive.
///
/// The first certificate of the chain is the leaf; the rest are added as CA
/// certificates.
///
/// # Errors
///
/// Returns [`AuthorityError::Export`] if the chain holds no certificate or
/// the archive cannot be built.
pub fn export_pfx(
    chain_pem: &str,
    key: &PrivateKey,
    password: &str,
    friendly_name: &str,
) -> Result<Vec<u8>, AuthorityError> {
    let blocks = pem::parse_many(chain_pem)
        .map_err(|e| AuthorityError::Export(format!("invalid PEM chain: {e}")))?;
    let certificates: Vec<&[u8]> = blocks
        .iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(pem::Pem::contents)
        .collect();

    let Some((leaf, cas)) = certificates.split_first() else {
        return Err(AuthorityError::Export(
            "certificate chain is empty".to_string(),
        ));
    };

    let key_der = key.pkcs8_der();
    let pfx = p12::PFX::new_with_cas(leaf, &key_der, cas, password, friendly_name)
        .ok_or_else(|| AuthorityError::Export("failed to assemble PKCS#12 archive".to_string()))?;
    Ok(pfx.to_der())
}

/// Random password protecting one exported archive.
#[must_use]
pub fn generate_archive_password() -> String {
    let bytes: [u8; ARCHIVE_PASSWORD_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[path = "certificate_tests.rs"]
mod certificate_tests;
