//! Top-level request orchestration.
//!
//! The dispatcher turns a [`RawRequest`] into a [`CommandResponse`]:
//! parse, feature check, certificate resolution, authentication, handler
//! lookup, invocation. Every failure along the way maps through the error
//! taxonomy into a protocol error response; the dispatcher itself never
//! returns `Err`.
//!
//! Handlers are registered once at startup in a [`HandlerRegistry`];
//! registering the same template twice is a configuration error surfaced at
//! build time, not a silent overwrite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use arclink_auth::{is_supported_version, ArchiveCertificate, RequestAuthenticator};
use arclink_core::{
    ArchiveError, ArchiveResult, CommandTemplate, DispatchCommand, RawRequest, UnverifiedCommand,
};

use crate::response::CommandResponse;

/// A command implementation invoked by the dispatcher.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Executes the command and builds its response.
    async fn handle(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse>;
}

/// The environment the dispatcher consults before invoking handlers.
#[async_trait]
pub trait DispatchEnv: Send + Sync {
    /// Whether the content-server feature is activated for this
    /// installation.
    async fn feature_activated(&self) -> bool;

    /// Returns the certificate on file for a content repository, when one
    /// exists.
    async fn certificate(&self, cont_rep: &str) -> ArchiveResult<Option<ArchiveCertificate>>;
}

/// Immutable template-to-handler map, built once at startup.
pub struct HandlerRegistry {
    handlers: HashMap<CommandTemplate, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    /// Starts a registry builder.
    #[must_use]
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Looks up the handler for a template.
    #[must_use]
    pub fn get(&self, template: CommandTemplate) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(&template)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys())
            .finish()
    }
}

/// Builder for [`HandlerRegistry`].
pub struct HandlerRegistryBuilder {
    handlers: HashMap<CommandTemplate, Arc<dyn CommandHandler>>,
}

impl HandlerRegistryBuilder {
    /// Registers a handler for a template.
    ///
    /// # Errors
    ///
    /// Returns an error when the template already has a handler.
    pub fn register(
        mut self,
        template: CommandTemplate,
        handler: Arc<dyn CommandHandler>,
    ) -> ArchiveResult<Self> {
        if self.handlers.insert(template, handler).is_some() {
            return Err(ArchiveError::internal(format!(
                "Handler for {template} registered twice"
            )));
        }
        Ok(self)
    }

    /// Registers one handler for several templates.
    ///
    /// # Errors
    ///
    /// Returns an error when any of the templates already has a handler.
    pub fn register_all(
        mut self,
        templates: &[CommandTemplate],
        handler: Arc<dyn CommandHandler>,
    ) -> ArchiveResult<Self> {
        for &template in templates {
            self = self.register(template, Arc::clone(&handler))?;
        }
        Ok(self)
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Templates served without certificate resolution or URL-signature
/// checks: `putCert` bootstraps the trust anchor, `serverInfo` reports on
/// all repositories at once.
const AUTH_EXEMPT: [CommandTemplate; 2] =
    [CommandTemplate::PutCert, CommandTemplate::ServerInfo];

/// The request dispatcher.
pub struct Dispatcher<E> {
    env: Arc<E>,
    registry: HandlerRegistry,
    authenticator: RequestAuthenticator,
}

impl<E: DispatchEnv> Dispatcher<E> {
    /// Creates a dispatcher over an environment and a built registry.
    #[must_use]
    pub fn new(env: Arc<E>, registry: HandlerRegistry) -> Self {
        Self {
            env,
            registry,
            authenticator: RequestAuthenticator::new(),
        }
    }

    /// Runs one request end to end. Failures become protocol error
    /// responses; this function does not fail.
    pub async fn dispatch(&self, request: RawRequest) -> CommandResponse {
        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(status = %err.status_code(), message = err.message(), "request failed");
                CommandResponse::from_error(&err)
            }
        }
    }

    async fn try_dispatch(&self, request: RawRequest) -> ArchiveResult<CommandResponse> {
        let command = UnverifiedCommand::from_request(request)?;
        let template = command.template();
        debug!(%template, "dispatching command");

        if !self.env.feature_activated().await {
            warn!("request rejected, content-server feature not activated");
            return Err(ArchiveError::forbidden(
                "Content server feature is not activated",
            ));
        }

        let command = if AUTH_EXEMPT.contains(&template) {
            if template == CommandTemplate::ServerInfo {
                check_version(&command)?;
            }
            DispatchCommand::Anonymous(command)
        } else {
            let cont_rep = command
                .params()
                .get_non_empty("contRep")
                .ok_or_else(|| ArchiveError::validation("Missing required parameter: contRep"))?
                .to_string();
            let certificate = self.env.certificate(&cont_rep).await?;
            let certificate = match &certificate {
                Some(cert) if !cert.enabled() => {
                    return Err(ArchiveError::forbidden(format!(
                        "Certificate for content repository {cont_rep} is disabled"
                    )))
                }
                Some(cert) => cert,
                None => {
                    return Err(ArchiveError::not_found(format!(
                        "No certificate for content repository {cont_rep}"
                    )))
                }
            };
            self.authenticator.check_request(command, Some(certificate))?
        };

        let handler = self.registry.get(template).ok_or_else(|| {
            ArchiveError::not_implemented(format!("Unsupported command: {template}"))
        })?;
        handler.handle(&command).await
    }
}

impl<E> std::fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// `serverInfo` skips the authenticator, so the protocol-version check
/// runs here instead.
fn check_version(command: &UnverifiedCommand) -> ArchiveResult<()> {
    match command.params().get_non_empty("pVersion") {
        Some(version) if is_supported_version(version) => Ok(()),
        Some(version) => Err(ArchiveError::validation(format!(
            "Unsupported protocol version: {version}"
        ))),
        None => Err(ArchiveError::validation(
            "Missing required parameter: pVersion",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};

    struct StaticEnv {
        activated: bool,
        certificate: Option<ArchiveCertificate>,
    }

    #[async_trait]
    impl DispatchEnv for StaticEnv {
        async fn feature_activated(&self) -> bool {
            self.activated
        }

        async fn certificate(&self, _cont_rep: &str) -> ArchiveResult<Option<ArchiveCertificate>> {
            Ok(self.certificate.clone())
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl CommandHandler for EchoHandler {
        async fn handle(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
            Ok(CommandResponse::protocol_text(
                StatusCode::OK,
                command.template().to_string(),
            ))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl CommandHandler for FailingHandler {
        async fn handle(&self, _command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
            Err(ArchiveError::not_found("Document not found"))
        }
    }

    fn request(method: Method, query: &str) -> RawRequest {
        RawRequest {
            method,
            scheme: "http".to_string(),
            host: "cs.example.com".to_string(),
            path: "/archive".to_string(),
            query: query.to_string(),
            content_length: Some(0),
            content_type: None,
            body: Bytes::new(),
        }
    }

    fn dispatcher(env: StaticEnv, registry: HandlerRegistry) -> Dispatcher<StaticEnv> {
        Dispatcher::new(Arc::new(env), registry)
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let result = HandlerRegistry::builder()
            .register(CommandTemplate::Get, Arc::new(EchoHandler))
            .unwrap()
            .register(CommandTemplate::Get, Arc::new(EchoHandler));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_command_is_400() {
        let registry = HandlerRegistry::builder().build();
        let d = dispatcher(
            StaticEnv {
                activated: true,
                certificate: None,
            },
            registry,
        );
        let response = d.dispatch(request(Method::GET, "bogus&pVersion=0046")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.text().unwrap().contains("Unsupported command"));
    }

    #[tokio::test]
    async fn test_feature_flag_gates_everything() {
        let registry = HandlerRegistry::builder()
            .register(CommandTemplate::ServerInfo, Arc::new(EchoHandler))
            .unwrap()
            .build();
        let d = dispatcher(
            StaticEnv {
                activated: false,
                certificate: None,
            },
            registry,
        );
        let response = d
            .dispatch(request(Method::GET, "serverinfo&pVersion=0046"))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_certificate_is_404() {
        let registry = HandlerRegistry::builder()
            .register(CommandTemplate::Get, Arc::new(EchoHandler))
            .unwrap()
            .build();
        let d = dispatcher(
            StaticEnv {
                activated: true,
                certificate: None,
            },
            registry,
        );
        let response = d
            .dispatch(request(Method::GET, "get&contRep=A1&docId=9&pVersion=0046"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_server_info_skips_certificate_but_checks_version() {
        let registry = HandlerRegistry::builder()
            .register(CommandTemplate::ServerInfo, Arc::new(EchoHandler))
            .unwrap()
            .build();
        let d = dispatcher(
            StaticEnv {
                activated: true,
                certificate: None,
            },
            registry,
        );

        let ok = d
            .dispatch(request(Method::GET, "serverinfo&pVersion=0046"))
            .await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.text(), Some("SERVERINFO"));

        let bad = d
            .dispatch(request(Method::GET, "serverinfo&pVersion=0099"))
            .await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_cont_rep_is_400() {
        let registry = HandlerRegistry::builder()
            .register(CommandTemplate::Get, Arc::new(EchoHandler))
            .unwrap()
            .build();
        let d = dispatcher(
            StaticEnv {
                activated: true,
                certificate: None,
            },
            registry,
        );
        let response = d
            .dispatch(request(Method::GET, "get&docId=9&pVersion=0046"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handler_error_maps_to_protocol_response() {
        let registry = HandlerRegistry::builder()
            .register(CommandTemplate::ServerInfo, Arc::new(FailingHandler))
            .unwrap()
            .build();
        let d = dispatcher(
            StaticEnv {
                activated: true,
                certificate: None,
            },
            registry,
        );
        let response = d
            .dispatch(request(Method::GET, "serverinfo&pVersion=0046"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), Some("ErrorMessage=Document not found"));
        assert_eq!(
            response.headers().get("x-errordescription").unwrap(),
            "Document not found"
        );
    }

    #[tokio::test]
    async fn test_unhandled_template_is_501() {
        // The command resolves and passes the checks but nothing serves it.
        let registry = HandlerRegistry::builder().build();
        let d = dispatcher(
            StaticEnv {
                activated: true,
                certificate: None,
            },
            registry,
        );
        let response = d
            .dispatch(request(Method::GET, "serverinfo&pVersion=0046"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(response.text().unwrap().contains("SERVERINFO"));
    }
}
