//! Request authentication for arclink.
//!
//! Two layers:
//!
//! - [`verifier`] - the cryptographic primitive: classify a `secKey` blob
//!   as CMS `SignedData` or a bare X.509 certificate and verify it against
//!   the certificate on file, enforcing the permission bitmask. All
//!   failures collapse into one opaque value.
//! - [`RequestAuthenticator`] - the protocol pipeline: version and
//!   transport checks, expiration, access-mode enforcement, and promotion
//!   of an [`arclink_core::UnverifiedCommand`] into a signed
//!   [`arclink_core::DispatchCommand`].

pub mod authenticator;
pub mod certificate;
pub mod error;
pub mod verifier;

pub use authenticator::{is_supported_version, RequestAuthenticator, SUPPORTED_VERSIONS};
pub use certificate::{thumbprint, ArchiveCertificate, Thumbprint};
pub use error::{CertificateError, VerificationFailed};
pub use verifier::{verify_url_signature, SignatureBlob};
