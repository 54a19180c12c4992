//! Wire serialization of a [`CommandResponse`] body.
//!
//! The writer owns the final byte layout of multipart answers. Every part
//! carries the full ArchiveLink header set in a fixed order; the metadata
//! variant writes `Content-Length: 0` while keeping the true length in
//! `X-Content-Length`. Backing temp files are deleted best-effort after
//! the body is written, on success and on error.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use arclink_core::{ArchiveResult, SapDocumentComponent};

use crate::response::{CommandResponse, ResponseBody};

/// Serializes response bodies onto an [`AsyncWrite`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseWriter;

impl ResponseWriter {
    /// Creates a writer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Writes the body of `response` to `out`, consuming the response.
    ///
    /// # Errors
    ///
    /// Returns an error when the sink fails or a file-backed component
    /// cannot be read.
    pub async fn write_body<W>(&self, response: CommandResponse, out: &mut W) -> ArchiveResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let boundary = response.boundary().map(str::to_string);
        match response.into_body() {
            ResponseBody::ProtocolText(text) | ResponseBody::HtmlReport(text) => {
                out.write_all(text.as_bytes()).await?;
            }
            ResponseBody::Document(component) => {
                let result = self.write_component_bytes(&component, out).await;
                cleanup_streams(std::slice::from_ref(&component));
                result?;
            }
            ResponseBody::Multipart(components) => {
                let boundary = boundary.unwrap_or_default();
                let result = self.write_parts(&boundary, &components, true, out).await;
                cleanup_streams(&components);
                result?;
            }
            ResponseBody::InfoMetadata(components) => {
                let boundary = boundary.unwrap_or_default();
                let result = self.write_parts(&boundary, &components, false, out).await;
                cleanup_streams(&components);
                result?;
            }
        }
        out.flush().await?;
        Ok(())
    }

    async fn write_parts<W>(
        &self,
        boundary: &str,
        components: &[SapDocumentComponent],
        with_bytes: bool,
        out: &mut W,
    ) -> ArchiveResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        for component in components {
            self.write_part(boundary, component, with_bytes, out).await?;
        }
        out.write_all(format!("--{boundary}--\r\n").as_bytes())
            .await?;
        Ok(())
    }

    /// Convenience for tests and buffered callers: serializes the body into
    /// a `Vec<u8>`.
    ///
    /// # Errors
    ///
    /// Returns an error when a file-backed component cannot be read.
    pub async fn write_to_bytes(&self, response: CommandResponse) -> ArchiveResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_body(response, &mut out).await?;
        Ok(out)
    }

    async fn write_part<W>(
        &self,
        boundary: &str,
        component: &SapDocumentComponent,
        with_bytes: bool,
        out: &mut W,
    ) -> ArchiveResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        out.write_all(format!("--{boundary}\r\n").as_bytes()).await?;

        let mut content_type = component.content_type.clone();
        if let Some(charset) = &component.charset {
            content_type.push_str("; charset=");
            content_type.push_str(charset);
        }
        if let Some(version) = &component.version {
            content_type.push_str("; version=");
            content_type.push_str(version);
        }
        let body_length = if with_bytes { component.content_length } else { 0 };

        let mut headers = String::new();
        headers.push_str(&format!("Content-Type: {content_type}\r\n"));
        headers.push_str(&format!("Content-Length: {body_length}\r\n"));
        headers.push_str(&format!("X-Content-Length: {}\r\n", component.content_length));
        headers.push_str(&format!("X-compId: {}\r\n", component.comp_id));
        headers.push_str(&format!(
            "X-compDateC: {}\r\n",
            component.creation_date.format("%Y-%m-%d")
        ));
        headers.push_str(&format!(
            "X-compTimeC: {}\r\n",
            component.creation_date.format("%H:%M:%S")
        ));
        headers.push_str(&format!(
            "X-compDateM: {}\r\n",
            component.modified_date.format("%Y-%m-%d")
        ));
        headers.push_str(&format!(
            "X-compTimeM: {}\r\n",
            component.modified_date.format("%H:%M:%S")
        ));
        headers.push_str(&format!("X-compStatus: {}\r\n", component.status));
        headers.push_str(&format!("X-pVersion: {}\r\n", component.p_version));
        headers.push_str("\r\n");
        out.write_all(headers.as_bytes()).await?;

        if with_bytes {
            self.write_component_bytes(component, out).await?;
        }
        out.write_all(b"\r\n").await?;
        Ok(())
    }

    async fn write_component_bytes<W>(
        &self,
        component: &SapDocumentComponent,
        out: &mut W,
    ) -> ArchiveResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if let Some(stream) = &component.data {
            let bytes = stream.read_all().await?;
            out.write_all(&bytes).await?;
        }
        Ok(())
    }
}

fn cleanup_streams(components: &[SapDocumentComponent]) {
    for component in components {
        if let Some(stream) = &component.data {
            stream.cleanup();
        }
    }
}
