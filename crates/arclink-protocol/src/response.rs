//! The multi-modal command response.
//!
//! A [`CommandResponse`] is built in exactly one of five shapes, fixed at
//! construction:
//!
//! - **ProtocolText** - `text/plain` key=value protocol answers and all
//!   error responses
//! - **HtmlReport** - human-readable `text/html` renderings (`info` with
//!   `resultAs=html`)
//! - **Document** - one binary component streamed as the entire body
//! - **Multipart** - component bytes framed as `multipart/form-data`
//! - **InfoMetadata** - the multipart framing with zero-length bodies,
//!   carrying only the `X-*` metadata headers
//!
//! Error responses are ProtocolText with body `ErrorMessage=<text>` and
//! the text repeated in the `X-ErrorDescription` header.

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use uuid::Uuid;

use arclink_core::{ArchiveError, SapDocumentComponent};

/// Content-Disposition decision for single-document responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Rendered by the browser.
    Inline,
    /// Forced download; always paired with `X-Content-Type-Options: nosniff`.
    Attachment,
}

/// MIME types safe to render inline.
const INLINE_MIME_WHITELIST: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/csv",
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/bmp",
    "image/tiff",
];

/// File extensions never rendered inline, whatever the declared type.
const EXTENSION_BLACKLIST: &[&str] = &[
    "html", "htm", "xhtml", "mht", "mhtml", "svg", "xml", "xsl", "js", "vbs", "exe", "dll",
    "bat", "cmd", "com", "scr", "ps1", "jar",
];

/// Decides the Content-Disposition for a component: the declared MIME type
/// must be whitelisted and the file extension must not be blacklisted,
/// otherwise the content is forced to download.
#[must_use]
pub fn disposition_for(content_type: &str, file_name: Option<&str>) -> Disposition {
    let base = arclink_core::normalize_content_type(content_type);
    if !INLINE_MIME_WHITELIST.contains(&base.as_str()) {
        return Disposition::Attachment;
    }
    if let Some(name) = file_name {
        let extension = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        if EXTENSION_BLACKLIST.contains(&extension.as_str()) {
            return Disposition::Attachment;
        }
    }
    Disposition::Inline
}

/// The body of a [`CommandResponse`]; exactly one shape per response.
#[derive(Debug)]
pub enum ResponseBody {
    /// Plain protocol text.
    ProtocolText(String),
    /// HTML report.
    HtmlReport(String),
    /// One binary component streamed as the body.
    Document(SapDocumentComponent),
    /// Multipart framing with component bytes.
    Multipart(Vec<SapDocumentComponent>),
    /// Multipart framing, metadata only (all `Content-Length: 0`).
    InfoMetadata(Vec<SapDocumentComponent>),
}

/// A fully built response, ready for wire serialization.
#[derive(Debug)]
pub struct CommandResponse {
    status: StatusCode,
    content_type: String,
    headers: HeaderMap,
    boundary: Option<String>,
    body: ResponseBody,
}

impl CommandResponse {
    /// Builds a plain protocol-text response.
    #[must_use]
    pub fn protocol_text(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=UTF-8".to_string(),
            headers: HeaderMap::new(),
            boundary: None,
            body: ResponseBody::ProtocolText(text.into()),
        }
    }

    /// Builds an HTML report response.
    #[must_use]
    pub fn html_report(status: StatusCode, html: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/html; charset=UTF-8".to_string(),
            headers: HeaderMap::new(),
            boundary: None,
            body: ResponseBody::HtmlReport(html.into()),
        }
    }

    /// Builds a single-document response; the component's stream becomes
    /// the body. The Content-Disposition policy and, for attachments,
    /// `X-Content-Type-Options: nosniff` are applied here.
    #[must_use]
    pub fn document(component: SapDocumentComponent) -> Self {
        let mut content_type = component.content_type.clone();
        if let Some(charset) = &component.charset {
            content_type.push_str("; charset=");
            content_type.push_str(charset);
        }

        let mut headers = HeaderMap::new();
        let disposition = disposition_for(&component.content_type, component.file_name.as_deref());
        let disposition_value = match (disposition, &component.file_name) {
            (Disposition::Inline, _) => "inline".to_string(),
            (Disposition::Attachment, Some(name)) => {
                format!("attachment; filename=\"{name}\"")
            }
            (Disposition::Attachment, None) => "attachment".to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&disposition_value) {
            headers.insert(http::header::CONTENT_DISPOSITION, value);
        }
        if disposition == Disposition::Attachment {
            headers.insert(
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            );
        }

        Self {
            status: StatusCode::OK,
            content_type,
            headers,
            boundary: None,
            body: ResponseBody::Document(component),
        }
    }

    /// Builds a multipart response streaming the component bytes.
    #[must_use]
    pub fn multipart_document(components: Vec<SapDocumentComponent>) -> Self {
        let boundary = new_boundary();
        Self {
            status: StatusCode::OK,
            content_type: format!("multipart/form-data; boundary={boundary}"),
            headers: HeaderMap::new(),
            boundary: Some(boundary),
            body: ResponseBody::Multipart(components),
        }
    }

    /// Builds a metadata-only multipart response (`info`).
    #[must_use]
    pub fn info_metadata(components: Vec<SapDocumentComponent>) -> Self {
        let boundary = new_boundary();
        Self {
            status: StatusCode::OK,
            content_type: format!("multipart/form-data; boundary={boundary}"),
            headers: HeaderMap::new(),
            boundary: Some(boundary),
            body: ResponseBody::InfoMetadata(components),
        }
    }

    /// Builds the uniform protocol error response.
    #[must_use]
    pub fn error(status: StatusCode, message: &str) -> Self {
        let mut response = Self::protocol_text(status, format!("ErrorMessage={message}"));
        if let Ok(value) = HeaderValue::from_str(message) {
            response
                .headers
                .insert(HeaderName::from_static("x-errordescription"), value);
        }
        response
    }

    /// Maps an [`ArchiveError`] through the taxonomy into an error
    /// response.
    #[must_use]
    pub fn from_error(err: &ArchiveError) -> Self {
        Self::error(err.status_code(), err.message())
    }

    /// Adds or replaces a response header.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    /// Returns the HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the Content-Type line.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the extra response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the multipart boundary, when the body is multipart.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// Returns the body shape.
    #[must_use]
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Consumes the response, returning its body.
    #[must_use]
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Returns `true` when the body is streamed (document or multipart)
    /// rather than buffered protocol text.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(
            self.body,
            ResponseBody::Document(_) | ResponseBody::Multipart(_) | ResponseBody::InfoMetadata(_)
        )
    }

    /// Returns the text of a ProtocolText or HtmlReport body.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::ProtocolText(text) | ResponseBody::HtmlReport(text) => Some(text),
            _ => None,
        }
    }
}

fn new_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}
