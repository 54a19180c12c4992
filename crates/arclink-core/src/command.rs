//! Parsed commands and their verification state.
//!
//! A command starts life as an [`UnverifiedCommand`], produced by parsing a
//! [`RawRequest`]. The request authenticator is the only component that can
//! promote it: a signed request becomes an [`AuthenticatedCommand`], which
//! is immutable and always carries a non-empty signer subject. There is no
//! observable half-verified state.

use bytes::Bytes;
use http::Method;

use crate::access_mode::AccessMode;
use crate::error::{ArchiveError, ArchiveResult};
use crate::params::ParameterStore;
use crate::template::CommandTemplate;

/// The transport-neutral facts of one incoming HTTP request.
///
/// The HTTP host extracts these once and hands them to the dispatcher;
/// nothing in the engine touches the transport again.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// HTTP method.
    pub method: Method,
    /// URL scheme (`http` or `https`).
    pub scheme: String,
    /// Host, including the port when non-default.
    pub host: String,
    /// URL path.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: String,
    /// Declared Content-Length, when the header was present and numeric.
    pub content_length: Option<i64>,
    /// Declared Content-Type of the request body, when present.
    pub content_type: Option<String>,
    /// Request body. Empty for bodyless commands.
    pub body: Bytes,
}

impl RawRequest {
    /// Returns `true` when the request arrived over TLS.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }

    /// Reassembles the full request URL for error messages.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}://{}{}?{}",
            self.scheme, self.host, self.path, self.query
        )
    }
}

/// A parsed command whose signature has not been checked.
///
/// The template is resolved exactly once, at construction; it cannot change
/// afterwards.
#[derive(Debug, Clone)]
pub struct UnverifiedCommand {
    template: CommandTemplate,
    params: ParameterStore,
    request: RawRequest,
}

impl UnverifiedCommand {
    /// Parses a raw request into a command.
    ///
    /// Returns a validation error when the (method, command) pair is not in
    /// the resolution table.
    pub fn from_request(request: RawRequest) -> ArchiveResult<Self> {
        let (command, params) = ParameterStore::parse(&request.query);
        let template = CommandTemplate::resolve(&request.method, &command).ok_or_else(|| {
            ArchiveError::validation(format!(
                "Unsupported command in URL or HTTP method: {} {}",
                request.method,
                request.url()
            ))
        })?;
        Ok(Self {
            template,
            params,
            request,
        })
    }

    /// Returns the resolved command template.
    #[must_use]
    pub fn template(&self) -> CommandTemplate {
        self.template
    }

    /// Returns the parsed parameters.
    #[must_use]
    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    /// Returns the underlying request facts.
    #[must_use]
    pub fn request(&self) -> &RawRequest {
        &self.request
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.request.body
    }

    /// Returns the access mode this command requires, derived solely from
    /// the template.
    #[must_use]
    pub fn access_mode(&self) -> Option<AccessMode> {
        self.template.access_mode()
    }

    /// Builds the canonical string-to-sign for this command.
    #[must_use]
    pub fn string_to_sign(&self, include_sec_key: bool) -> String {
        self.params.string_to_sign(
            &self.request.scheme,
            &self.request.host,
            &self.request.path,
            include_sec_key,
        )
    }
}

/// A command whose URL signature was verified.
///
/// Constructed only by the request authenticator after the cryptographic
/// check succeeds; the signer's certificate subject is always non-empty.
#[derive(Debug, Clone)]
pub struct AuthenticatedCommand {
    command: UnverifiedCommand,
    cert_subject: String,
}

impl AuthenticatedCommand {
    /// Promotes a verified command, recording the signer subject.
    ///
    /// Fails when the subject is empty: a verified command without a signer
    /// would be indistinguishable from an anonymous one.
    pub fn new(command: UnverifiedCommand, cert_subject: String) -> ArchiveResult<Self> {
        if cert_subject.is_empty() {
            return Err(ArchiveError::internal(
                "verified command requires a certificate subject",
            ));
        }
        Ok(Self {
            command,
            cert_subject,
        })
    }

    /// Returns the wrapped command.
    #[must_use]
    pub fn command(&self) -> &UnverifiedCommand {
        &self.command
    }

    /// Returns the signer's certificate subject.
    #[must_use]
    pub fn cert_subject(&self) -> &str {
        &self.cert_subject
    }
}

/// The terminal verification state a command reaches before dispatch.
#[derive(Debug, Clone)]
pub enum DispatchCommand {
    /// No signature was required; the command runs unauthenticated.
    Anonymous(UnverifiedCommand),
    /// The URL signature was verified against the repository certificate.
    Signed(AuthenticatedCommand),
}

impl DispatchCommand {
    /// Returns the underlying command regardless of verification state.
    #[must_use]
    pub fn command(&self) -> &UnverifiedCommand {
        match self {
            Self::Anonymous(command) => command,
            Self::Signed(authenticated) => authenticated.command(),
        }
    }

    /// Returns the command template.
    #[must_use]
    pub fn template(&self) -> CommandTemplate {
        self.command().template()
    }

    /// Returns the parsed parameters.
    #[must_use]
    pub fn params(&self) -> &ParameterStore {
        self.command().params()
    }

    /// Returns `true` for a signature-verified command.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }

    /// Returns the signer subject of a verified command.
    #[must_use]
    pub fn cert_subject(&self) -> Option<&str> {
        match self {
            Self::Anonymous(_) => None,
            Self::Signed(authenticated) => Some(authenticated.cert_subject()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(method: Method, query: &str) -> RawRequest {
        RawRequest {
            method,
            scheme: "http".to_string(),
            host: "cs.example.com".to_string(),
            path: "/archive".to_string(),
            query: query.to_string(),
            content_length: None,
            content_type: None,
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_get_command_resolves_read_mode() {
        let cmd =
            UnverifiedCommand::from_request(raw(Method::GET, "get&compId=1&docId=2&Pversion=0045"))
                .unwrap();
        assert_eq!(cmd.template(), CommandTemplate::Get);
        assert_eq!(cmd.access_mode(), Some(AccessMode::Read));
        assert_eq!(cmd.params().get("pVersion"), Some("0045"));
    }

    #[test]
    fn test_put_create_resolves_create_mode() {
        let cmd = UnverifiedCommand::from_request(raw(
            Method::PUT,
            "create&compId=abc&docId=def&Pversion=0047",
        ))
        .unwrap();
        assert_eq!(cmd.template(), CommandTemplate::CreatePut);
        assert_eq!(cmd.access_mode(), Some(AccessMode::Create));
    }

    #[test]
    fn test_unknown_command_is_validation_error() {
        let err = UnverifiedCommand::from_request(raw(Method::GET, "nonsense&docId=1"))
            .unwrap_err();
        assert!(err.message().contains("Unsupported command"));
        assert!(err.message().contains("GET"));
    }

    #[test]
    fn test_authenticated_command_requires_subject() {
        let cmd = UnverifiedCommand::from_request(raw(Method::GET, "get&docId=1")).unwrap();
        assert!(AuthenticatedCommand::new(cmd.clone(), String::new()).is_err());
        let signed = AuthenticatedCommand::new(cmd, "CN=SAP R3".to_string()).unwrap();
        assert_eq!(signed.cert_subject(), "CN=SAP R3");
    }

    #[test]
    fn test_dispatch_command_state() {
        let cmd = UnverifiedCommand::from_request(raw(Method::GET, "get&docId=1")).unwrap();
        let anon = DispatchCommand::Anonymous(cmd.clone());
        assert!(!anon.is_signed());
        assert!(anon.cert_subject().is_none());

        let signed = DispatchCommand::Signed(
            AuthenticatedCommand::new(cmd, "CN=SAP R3".to_string()).unwrap(),
        );
        assert!(signed.is_signed());
        assert_eq!(signed.cert_subject(), Some("CN=SAP R3"));
    }

    #[test]
    fn test_string_to_sign_uses_request_parts() {
        let cmd = UnverifiedCommand::from_request(raw(
            Method::GET,
            "get&contRep=A1&docId=9&secKey=zzz",
        ))
        .unwrap();
        assert_eq!(
            cmd.string_to_sign(false),
            "http://cs.example.com/archive?contRep=A1&docId=9"
        );
    }
}
