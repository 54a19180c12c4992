//! Repository certificates.
//!
//! Each content repository has at most one certificate on file, installed
//! through `putCert`. The certificate carries the SAP system's public key
//! (used to verify `secKey` URL signatures), the authentication id of the
//! installing system, a permission bitmask, and an enabled flag toggled by
//! the administrator.

use std::time::SystemTime;

use der::{Decode, Encode};
use sha1::{Digest, Sha1};
use x509_cert::Certificate;

use crate::error::CertificateError;

/// SHA-1 thumbprint of a DER-encoded certificate.
pub type Thumbprint = [u8; 20];

/// An X.509 certificate on file for one content repository.
#[derive(Debug, Clone)]
pub struct ArchiveCertificate {
    der: Vec<u8>,
    certificate: Certificate,
    auth_id: String,
    permissions: u32,
    enabled: bool,
}

impl ArchiveCertificate {
    /// Parses a DER-encoded certificate.
    pub fn from_der(
        der: Vec<u8>,
        auth_id: impl Into<String>,
        permissions: u32,
        enabled: bool,
    ) -> Result<Self, CertificateError> {
        let certificate = Certificate::from_der(&der)
            .map_err(|err| CertificateError::Malformed(err.to_string()))?;
        Ok(Self {
            der,
            certificate,
            auth_id: auth_id.into(),
            permissions,
            enabled,
        })
    }

    /// Returns the raw DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the parsed certificate.
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Returns the authentication id recorded at installation.
    #[must_use]
    pub fn auth_id(&self) -> &str {
        &self.auth_id
    }

    /// Returns the granted permission bitmask (see
    /// [`arclink_core::access_mode`]).
    #[must_use]
    pub fn permissions(&self) -> u32 {
        self.permissions
    }

    /// Returns `true` when the administrator has enabled the certificate.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the SHA-1 thumbprint of the DER encoding.
    #[must_use]
    pub fn thumbprint(&self) -> Thumbprint {
        thumbprint(&self.der)
    }

    /// Returns the certificate subject as an RFC 4514 string.
    #[must_use]
    pub fn subject(&self) -> String {
        self.certificate.tbs_certificate.subject.to_string()
    }

    /// Returns `true` when `at` falls inside the certificate's validity
    /// period.
    #[must_use]
    pub fn is_valid_at(&self, at: SystemTime) -> bool {
        let validity = &self.certificate.tbs_certificate.validity;
        validity.not_before.to_system_time() <= at && at <= validity.not_after.to_system_time()
    }
}

/// Computes the SHA-1 thumbprint of DER bytes.
#[must_use]
pub fn thumbprint(der: &[u8]) -> Thumbprint {
    Sha1::digest(der).into()
}

/// Computes the thumbprint of a parsed certificate by re-encoding it.
pub(crate) fn certificate_thumbprint(cert: &Certificate) -> Result<Thumbprint, der::Error> {
    Ok(thumbprint(&cert.to_der()?))
}
