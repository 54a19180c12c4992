//! The low-level signature verification primitive.
//!
//! A `secKey` is a base64-encoded blob that is either a detached CMS/PKCS#7
//! `SignedData` over the canonical string-to-sign, or - from older SAP
//! kernels - a bare X.509 certificate that must equal the certificate on
//! file. The blob is classified by an explicit two-stage parse into
//! [`SignatureBlob`]; there is no exception-driven fallback.
//!
//! Every failure, at any stage, surfaces as the single opaque
//! [`VerificationFailed`] value. Collapsing the detail is deliberate: the
//! response must not tell an attacker which stage rejected the request.

use std::time::SystemTime;

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Encode};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::debug;
use x509_cert::Certificate;

use crate::certificate::{certificate_thumbprint, ArchiveCertificate};
use crate::error::VerificationFailed;

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const OID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const OID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
const OID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

/// The decoded form of a signature blob.
#[derive(Debug)]
pub enum SignatureBlob {
    /// A CMS/PKCS#7 `SignedData` structure (detached content).
    CmsSigned(Box<SignedData>),
    /// A bare X.509 certificate.
    RawCertificate(Box<Certificate>),
    /// Neither; the blob is rejected without further detail.
    Invalid,
}

impl SignatureBlob {
    /// Classifies a DER blob. CMS is attempted first, then a bare
    /// certificate; anything else is [`SignatureBlob::Invalid`].
    #[must_use]
    pub fn parse(der: &[u8]) -> Self {
        if let Ok(content_info) = ContentInfo::from_der(der) {
            if content_info.content_type == ID_SIGNED_DATA {
                if let Ok(content_der) = content_info.content.to_der() {
                    if let Ok(signed_data) = SignedData::from_der(&content_der) {
                        return Self::CmsSigned(Box::new(signed_data));
                    }
                }
            }
        }
        if let Ok(certificate) = Certificate::from_der(der) {
            return Self::RawCertificate(Box::new(certificate));
        }
        Self::Invalid
    }
}

/// Verifies a base64 `secKey` against the certificates on file.
///
/// `signed_content` is the charset-encoded string-to-sign;
/// `required_permission` is the bitmask of the command's access mode (0
/// disables the permission gate, for commands outside the permission
/// model).
///
/// On success returns the subject of the matched certificate.
pub fn verify_url_signature(
    sec_key_b64: &str,
    signed_content: &[u8],
    trusted: &[ArchiveCertificate],
    required_permission: u32,
) -> Result<String, VerificationFailed> {
    use base64::prelude::*;

    let blob = BASE64_STANDARD
        .decode(sec_key_b64.trim())
        .map_err(|_| VerificationFailed)?;

    let matched = match SignatureBlob::parse(&blob) {
        SignatureBlob::CmsSigned(signed_data) => {
            verify_cms(&signed_data, signed_content, trusted)?
        }
        SignatureBlob::RawCertificate(certificate) => verify_raw(&certificate, trusted)?,
        SignatureBlob::Invalid => return Err(VerificationFailed),
    };

    if required_permission != 0 && matched.permissions() & required_permission == 0 {
        debug!("signature structurally valid but permission bit not granted");
        return Err(VerificationFailed);
    }
    Ok(matched.subject())
}

/// Verifies a detached `SignedData` over `content`, returning the matched
/// trusted certificate.
fn verify_cms<'a>(
    signed_data: &SignedData,
    content: &[u8],
    trusted: &'a [ArchiveCertificate],
) -> Result<&'a ArchiveCertificate, VerificationFailed> {
    let now = SystemTime::now();
    for signer_info in signed_data.signer_infos.0.iter() {
        for candidate in match_candidates(signed_data, signer_info, trusted) {
            if !candidate.is_valid_at(now) {
                continue;
            }
            if verify_signer(signer_info, content, candidate).is_ok() {
                return Ok(candidate);
            }
        }
    }
    Err(VerificationFailed)
}

/// Finds the trusted certificates a signer could correspond to: by
/// issuer-name + serial-number from the signer identifier, or by SHA-1
/// thumbprint of a certificate embedded in the `SignedData`.
fn match_candidates<'a>(
    signed_data: &SignedData,
    signer_info: &SignerInfo,
    trusted: &'a [ArchiveCertificate],
) -> Vec<&'a ArchiveCertificate> {
    let mut candidates = Vec::new();

    if let SignerIdentifier::IssuerAndSerialNumber(isn) = &signer_info.sid {
        if let Ok(issuer_der) = isn.issuer.to_der() {
            for cert in trusted {
                let tbs = &cert.certificate().tbs_certificate;
                if tbs.serial_number == isn.serial_number
                    && tbs.issuer.to_der().ok().as_deref() == Some(issuer_der.as_slice())
                {
                    candidates.push(cert);
                }
            }
        }
    }

    if let Some(embedded) = &signed_data.certificates {
        for choice in embedded.0.iter() {
            let CertificateChoices::Certificate(embedded_cert) = choice else {
                continue;
            };
            let Ok(tp) = certificate_thumbprint(embedded_cert) else {
                continue;
            };
            for cert in trusted {
                if cert.thumbprint() == tp && !candidates.iter().any(|c| std::ptr::eq(*c, cert)) {
                    candidates.push(cert);
                }
            }
        }
    }

    candidates
}

/// Verifies one signer's signature with the candidate certificate's RSA
/// public key.
///
/// With signed attributes present, the messageDigest attribute must equal
/// the content digest and the signature covers the DER of the attribute
/// set; without them the signature covers the content directly.
fn verify_signer(
    signer_info: &SignerInfo,
    content: &[u8],
    candidate: &ArchiveCertificate,
) -> Result<(), VerificationFailed> {
    let digest_oid = signer_info.digest_alg.oid;
    let signature = signer_info.signature.as_bytes();

    let message: Vec<u8> = if let Some(signed_attrs) = &signer_info.signed_attrs {
        let declared = signed_attrs
            .iter()
            .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
            .and_then(|attr| attr.values.iter().next())
            .ok_or(VerificationFailed)?;
        let declared_der = declared.to_der().map_err(|_| VerificationFailed)?;
        let declared_digest =
            OctetString::from_der(&declared_der).map_err(|_| VerificationFailed)?;
        if declared_digest.as_bytes() != digest(digest_oid, content)?.as_slice() {
            return Err(VerificationFailed);
        }
        signed_attrs.to_der().map_err(|_| VerificationFailed)?
    } else {
        content.to_vec()
    };

    rsa_verify(candidate, digest_oid, &message, signature)
}

/// Verifies a bare-certificate blob: it must equal a certificate on file by
/// thumbprint and be inside its validity period.
fn verify_raw<'a>(
    certificate: &Certificate,
    trusted: &'a [ArchiveCertificate],
) -> Result<&'a ArchiveCertificate, VerificationFailed> {
    let tp = certificate_thumbprint(certificate).map_err(|_| VerificationFailed)?;
    let matched = trusted
        .iter()
        .find(|cert| cert.thumbprint() == tp)
        .ok_or(VerificationFailed)?;
    if !matched.is_valid_at(SystemTime::now()) {
        return Err(VerificationFailed);
    }
    Ok(matched)
}

fn digest(oid: ObjectIdentifier, data: &[u8]) -> Result<Vec<u8>, VerificationFailed> {
    if oid == OID_SHA1 {
        Ok(Sha1::digest(data).to_vec())
    } else if oid == OID_SHA256 {
        Ok(Sha256::digest(data).to_vec())
    } else if oid == OID_SHA384 {
        Ok(Sha384::digest(data).to_vec())
    } else if oid == OID_SHA512 {
        Ok(Sha512::digest(data).to_vec())
    } else {
        Err(VerificationFailed)
    }
}

fn rsa_verify(
    candidate: &ArchiveCertificate,
    digest_oid: ObjectIdentifier,
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerificationFailed> {
    let spki_der = candidate
        .certificate()
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|_| VerificationFailed)?;
    let key = RsaPublicKey::from_public_key_der(&spki_der).map_err(|_| VerificationFailed)?;

    let hashed = digest(digest_oid, message)?;
    let scheme = if digest_oid == OID_SHA1 {
        Pkcs1v15Sign::new::<Sha1>()
    } else if digest_oid == OID_SHA256 {
        Pkcs1v15Sign::new::<Sha256>()
    } else if digest_oid == OID_SHA384 {
        Pkcs1v15Sign::new::<Sha384>()
    } else if digest_oid == OID_SHA512 {
        Pkcs1v15Sign::new::<Sha512>()
    } else {
        return Err(VerificationFailed);
    };
    key.verify(scheme, &hashed, signature)
        .map_err(|_| VerificationFailed)
}
