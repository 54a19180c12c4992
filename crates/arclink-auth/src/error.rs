//! Error types for arclink-auth.

use thiserror::Error;

/// Certificate parsing/handling errors.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The certificate DER could not be parsed.
    #[error("malformed certificate: {0}")]
    Malformed(String),
}

/// The single, opaque signature-verification failure.
///
/// Every failure inside the verifier - undecodable blob, unmatched signer,
/// expired certificate, digest mismatch, bad signature, insufficient
/// permission - collapses into this value. No internal detail is leaked
/// upward; callers translate it into one uniform 403 response.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("URL signature verification failed")]
pub struct VerificationFailed;
