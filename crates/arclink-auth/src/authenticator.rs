//! The protocol-level request authentication pipeline.
//!
//! [`RequestAuthenticator::check_request`] is a short-circuiting sequence
//! of checks; the first failure decides the response. A command that passes
//! leaves as a [`DispatchCommand`]: either `Anonymous` (no signature was
//! required) or `Signed` (the `secKey` verified against the repository
//! certificate). The half-verified states of the wire protocol do not
//! exist in this model - promotion to `Signed` happens in one step, after
//! the cryptographic check.

use chrono::{NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

use arclink_core::{
    ArchiveError, ArchiveResult, AuthenticatedCommand, CommandTemplate, DispatchCommand,
    UnverifiedCommand, SEC_KEY,
};

use crate::certificate::ArchiveCertificate;
use crate::verifier::verify_url_signature;

/// Protocol versions this server speaks.
pub const SUPPORTED_VERSIONS: [&str; 3] = ["0045", "0046", "0047"];

/// Templates the server rejects outright with 501.
const UNSUPPORTED_TEMPLATES: [CommandTemplate; 5] = [
    CommandTemplate::AdminContRep,
    CommandTemplate::AppendNote,
    CommandTemplate::GetAnnotations,
    CommandTemplate::GetNotes,
    CommandTemplate::StoreAnnotations,
];

/// Returns `true` for a supported `pVersion` literal.
#[must_use]
pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// The request authentication pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestAuthenticator;

impl RequestAuthenticator {
    /// Creates an authenticator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the authentication pipeline over a parsed command.
    ///
    /// `certificate` is the certificate on file for the addressed
    /// repository, when one exists. The pipeline, in order:
    ///
    /// 1. explicitly unsupported templates are rejected (501)
    /// 2. the protocol version must be a supported literal (400)
    /// 3. `signUrl` requires an HTTPS transport (400)
    /// 4. POST/PUT must declare a valid, non-negative Content-Length (400)
    /// 5. when no signature is required, the command passes as `Anonymous`
    /// 6. otherwise the signature parameters are validated and the
    ///    `secKey` verified; failures are 401 (missing parameters),
    ///    400 (malformed expiration) or 403 (expired, mode mismatch, any
    ///    verification failure)
    pub fn check_request(
        &self,
        command: UnverifiedCommand,
        certificate: Option<&ArchiveCertificate>,
    ) -> ArchiveResult<DispatchCommand> {
        let template = command.template();

        if UNSUPPORTED_TEMPLATES.contains(&template) {
            return Err(ArchiveError::not_implemented(format!(
                "Unsupported command: {template}"
            )));
        }

        match command.params().get_non_empty("pVersion") {
            Some(version) if is_supported_version(version) => {}
            Some(version) => {
                return Err(ArchiveError::validation(format!(
                    "Unsupported protocol version: {version}"
                )))
            }
            None => {
                return Err(ArchiveError::validation(
                    "Missing required parameter: pVersion",
                ))
            }
        }

        if template == CommandTemplate::SignUrl && !command.request().is_https() {
            return Err(ArchiveError::validation(
                "signUrl requires a secure (HTTPS) transport",
            ));
        }

        let method = &command.request().method;
        if (method == http::Method::POST || method == http::Method::PUT)
            && !command.request().content_length.is_some_and(|len| len >= 0)
        {
            return Err(ArchiveError::validation(
                "Missing or invalid Content-Length",
            ));
        }

        if !signature_required(&command) {
            return Ok(DispatchCommand::Anonymous(command));
        }

        let outcome = self.verify_signed(command, certificate)?;
        // rms-pi demands a verified command; with the state machine this is
        // structurally guaranteed, the check stays as a final barrier.
        if outcome.command().params().contains("rms-pi") && !outcome.is_signed() {
            warn!("rms-pi request passed the pipeline without verification");
            return Err(ArchiveError::forbidden("URL signature verification failed"));
        }
        Ok(outcome)
    }

    /// Steps 6-7: parameter validation, expiration, access-mode
    /// containment, signature verification.
    fn verify_signed(
        &self,
        command: UnverifiedCommand,
        certificate: Option<&ArchiveCertificate>,
    ) -> ArchiveResult<DispatchCommand> {
        let params = command.params();

        let sec_key = params
            .get_non_empty(SEC_KEY)
            .ok_or_else(|| ArchiveError::unauthorized("Missing required parameter: secKey"))?
            .to_string();
        params
            .get_non_empty("authId")
            .ok_or_else(|| ArchiveError::unauthorized("Missing required parameter: authId"))?;
        let expiration = params
            .get_non_empty("expiration")
            .ok_or_else(|| ArchiveError::unauthorized("Missing required parameter: expiration"))?;
        let declared_modes = params
            .get_non_empty("accessMode")
            .ok_or_else(|| ArchiveError::unauthorized("Missing required parameter: accessMode"))?
            .to_string();

        let expires_at = parse_expiration(expiration)?;
        if expires_at < Utc::now() {
            debug!(%expires_at, "signed URL expired");
            return Err(ArchiveError::forbidden("URL expired"));
        }

        let required = command.template().access_mode();
        if let Some(mode) = required {
            if !declared_modes.contains(mode.as_char()) {
                return Err(ArchiveError::forbidden(
                    "Access mode not covered by URL signature",
                ));
            }
        }

        let certificate = certificate.ok_or_else(|| {
            ArchiveError::forbidden("No certificate on file for the repository")
        })?;

        let signed_content = command.string_to_sign(false);
        let required_permission = required.map_or(0, |mode| mode.bit());
        let trusted = std::slice::from_ref(certificate);
        let subject =
            verify_url_signature(&sec_key, signed_content.as_bytes(), trusted, required_permission)
                .map_err(|_| ArchiveError::forbidden("URL signature verification failed"))?;

        debug!(subject = %subject, template = %command.template(), "URL signature verified");
        let authenticated = AuthenticatedCommand::new(command, subject)?;
        Ok(DispatchCommand::Signed(authenticated))
    }
}

/// A signature is required when the URL carries a `secKey`, when the
/// request originates from a records-management integration (`rms-pi` /
/// `rms-node`), or for `signUrl` itself.
fn signature_required(command: &UnverifiedCommand) -> bool {
    let params = command.params();
    params.contains(SEC_KEY)
        || params.contains("rms-pi")
        || params.contains("rms-node")
        || command.template() == CommandTemplate::SignUrl
}

/// Parses a strict `yyyyMMddHHmmss` expiration timestamp as UTC.
fn parse_expiration(value: &str) -> ArchiveResult<chrono::DateTime<Utc>> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ArchiveError::validation(format!(
            "Malformed expiration timestamp: {value}"
        )));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S")
        .map_err(|_| ArchiveError::validation(format!("Malformed expiration timestamp: {value}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}
