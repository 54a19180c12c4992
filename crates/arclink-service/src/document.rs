//! The document service: every ArchiveLink command the server answers.
//!
//! One [`DocumentService`] instance backs all handlers; per-command entry
//! points validate parameters, talk to the repository, count the access
//! and build the response. [`handler_registry`] wires the service into the
//! dispatcher's template table.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::StatusCode;
use tracing::debug;

use arclink_core::access_mode::mask_from_str;
use arclink_core::{
    ArchiveError, ArchiveResult, CommandTemplate, ContentStream, DispatchCommand, ParameterStore,
    SapDocumentComponent,
};
use arclink_counter::{CounterKind, CounterService};
use arclink_protocol::{
    resolve_range, CommandHandler, CommandResponse, HandlerRegistry,
};

use crate::append::AppenderRegistry;
use crate::extract::ExtractorRegistry;
use crate::multipart::{boundary_from_content_type, parse_multipart};
use crate::repository::{with_content, CertificateUpload, ContentRepository, NewRecord, RecordHandle};
use crate::search::match_pattern;

/// Default component id tried first when `compId` is absent.
const DEFAULT_COMP_ID: &str = "data";
/// Fallback component id for records archived without a `data` component.
const FALLBACK_COMP_ID: &str = "data1";
/// Component searched by `attrSearch`.
const ATTRIBUTE_COMP_ID: &str = "descr";
/// Permission string granted to a certificate installed without one.
const DEFAULT_PERMISSIONS: &str = "rcude";
/// Match cap when `numResults` is absent.
const DEFAULT_NUM_RESULTS: usize = 100;

/// Orchestrates commands against the repository, counters and the content
/// strategy registries.
pub struct DocumentService {
    repository: Arc<dyn ContentRepository>,
    counters: CounterService,
    extractors: Arc<ExtractorRegistry>,
    appenders: Arc<AppenderRegistry>,
}

impl DocumentService {
    /// Creates a service with the built-in strategy registries.
    #[must_use]
    pub fn new(repository: Arc<dyn ContentRepository>, counters: CounterService) -> Self {
        Self::with_registries(
            repository,
            counters,
            Arc::new(ExtractorRegistry::with_defaults()),
            Arc::new(AppenderRegistry::with_defaults()),
        )
    }

    /// Creates a service over custom registries.
    #[must_use]
    pub fn with_registries(
        repository: Arc<dyn ContentRepository>,
        counters: CounterService,
        extractors: Arc<ExtractorRegistry>,
        appenders: Arc<AppenderRegistry>,
    ) -> Self {
        Self {
            repository,
            counters,
            extractors,
            appenders,
        }
    }

    async fn load_record(
        &self,
        cont_rep: &str,
        doc_id: &str,
    ) -> ArchiveResult<Box<dyn RecordHandle>> {
        self.repository
            .get_record(cont_rep, doc_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(format!("Document not found: {doc_id}")))
    }

    /// `get`: a single component, optionally a byte range of it.
    pub async fn get(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let record = self.load_record(cont_rep, doc_id).await?;

        let component = resolve_component(record.as_ref(), params.get_non_empty("compId")).await?;
        let bytes = match &component.data {
            Some(stream) => stream.read_all().await?,
            None => Bytes::new(),
        };

        let from = int_param(params, "fromOffset")?;
        let to = int_param(params, "toOffset")?;
        let (start, length) = resolve_range(from, to, bytes.len() as u64)?;
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        let window = bytes.slice(start..start + length);

        self.counters
            .update_counter(cont_rep, CounterKind::View, 1);

        let mut response = CommandResponse::document(with_content(component.clone(), window));
        record_headers(&mut response, record.as_ref());
        component_headers(&mut response, &component);
        Ok(response)
    }

    /// `docGet`: all components, as multipart with content.
    pub async fn doc_get(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let record = self.load_record(cont_rep, doc_id).await?;
        let components = record.extract_all().await?;

        self.counters
            .update_counter(cont_rep, CounterKind::View, 1);

        let mut response = CommandResponse::multipart_document(components);
        record_headers(&mut response, record.as_ref());
        Ok(response)
    }

    /// `info`: component metadata, multipart or HTML.
    pub async fn info(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let record = self.load_record(cont_rep, doc_id).await?;

        let components = match params.get_non_empty("compId") {
            Some(comp_id) => {
                let component = record.find_component(comp_id).await?.ok_or_else(|| {
                    ArchiveError::not_found(format!("Component not found: {comp_id}"))
                })?;
                vec![component]
            }
            None => record.all_components().await?,
        };

        self.counters
            .update_counter(cont_rep, CounterKind::View, 1);

        let as_html = params
            .get_non_empty("resultAs")
            .is_some_and(|v| v.eq_ignore_ascii_case("html"));
        let mut response = if as_html {
            CommandResponse::html_report(StatusCode::OK, info_html(doc_id, &components))
        } else {
            CommandResponse::info_metadata(components)
        };
        record_headers(&mut response, record.as_ref());
        Ok(response)
    }

    /// `serverInfo`: the repository listing.
    pub async fn server_info(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let p_version = params.get_non_empty("pVersion").unwrap_or("0045");
        let repositories = self
            .repository
            .server_info(params.get_non_empty("contRep"))
            .await?;

        let mut text = format!(
            "serverStatus=\"running\";serverVendorId=\"arclink\";pVersion=\"{p_version}\";\n"
        );
        for info in repositories {
            let status = if info.enabled { "running" } else { "disabled" };
            text.push_str(&format!(
                "contRep=\"{}\";contRepStatus=\"{status}\";pVersion=\"{}\";",
                info.cont_rep, info.p_version
            ));
            if let Some(count) = info.document_count {
                text.push_str(&format!("numberDocs=\"{count}\";"));
            }
            text.push('\n');
        }
        Ok(CommandResponse::protocol_text(StatusCode::OK, text))
    }

    /// `putCert`: installs a repository certificate.
    pub async fn put_cert(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let auth_id = require(params, "authId")?;
        let permissions = params
            .get_non_empty("permissions")
            .unwrap_or(DEFAULT_PERMISSIONS);
        let mask = mask_from_str(permissions)?;

        let body = command.command().body();
        if body.is_empty() {
            return Err(ArchiveError::validation("Empty certificate body"));
        }
        // Parse once to reject garbage before it reaches the store.
        arclink_auth::ArchiveCertificate::from_der(body.to_vec(), auth_id, mask, true)
            .map_err(|err| ArchiveError::validation(format!("Malformed certificate: {err}")))?;

        self.repository
            .save_certificate(
                cont_rep,
                CertificateUpload {
                    der: body.to_vec(),
                    auth_id: auth_id.to_string(),
                    permissions: mask,
                },
            )
            .await?;
        debug!(cont_rep, auth_id, "certificate installed");
        Ok(CommandResponse::protocol_text(StatusCode::OK, ""))
    }

    /// `create` (PUT single / POST multipart) and `mCreate`.
    pub async fn create(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let components = self.components_from_request(command)?;
        if components.is_empty() {
            return Err(ArchiveError::validation("Request carries no components"));
        }
        let count = components.len() as i64;

        match self.repository.get_record(cont_rep, doc_id).await? {
            Some(mut record) => {
                for component in &components {
                    if record.has_component(&component.comp_id).await? {
                        return Err(ArchiveError::forbidden(format!(
                            "Component already exists: {}",
                            component.comp_id
                        )));
                    }
                }
                for component in components {
                    record.add_component(component).await?;
                }
                record.set_metadata(Utc::now());
                record.save().await?;
            }
            None => {
                let record = NewRecord {
                    cont_rep: cont_rep.to_string(),
                    doc_id: doc_id.to_string(),
                    p_version: params.get_non_empty("pVersion").unwrap_or("0045").to_string(),
                    components,
                };
                let _handle = self.repository.create_record(record).await?;
            }
        }

        self.counters
            .update_counter(cont_rep, CounterKind::Create, count);
        Ok(CommandResponse::protocol_text(StatusCode::CREATED, ""))
    }

    /// `update` (PUT single / POST multipart): replaces existing
    /// components.
    pub async fn update(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let components = self.components_from_request(command)?;
        if components.is_empty() {
            return Err(ArchiveError::validation("Request carries no components"));
        }
        let count = components.len() as i64;

        let mut record = self.load_record(cont_rep, doc_id).await?;
        for component in &components {
            if !record.has_component(&component.comp_id).await? {
                return Err(ArchiveError::not_found(format!(
                    "Component not found: {}",
                    component.comp_id
                )));
            }
        }
        for component in components {
            record.update_component(component).await?;
        }
        record.set_metadata(Utc::now());
        record.save().await?;

        self.counters
            .update_counter(cont_rep, CounterKind::Update, count);
        Ok(CommandResponse::protocol_text(StatusCode::OK, ""))
    }

    /// `append`: merges the uploaded bytes into an existing component
    /// through the appender registry.
    pub async fn append(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let comp_id = params.get_non_empty("compId").unwrap_or(DEFAULT_COMP_ID);

        let mut record = self.load_record(cont_rep, doc_id).await?;
        let component = record
            .extract_component(comp_id, true)
            .await?
            .ok_or_else(|| ArchiveError::not_found(format!("Component not found: {comp_id}")))?;

        let existing = match &component.data {
            Some(stream) => stream.read_all().await?,
            None => Bytes::new(),
        };
        let merged = self
            .appenders
            .append(&component.content_type, &existing, command.command().body())
            .await?;

        record
            .update_component(with_content(component, Bytes::from(merged)))
            .await?;
        record.set_metadata(Utc::now());
        record.save().await?;

        self.counters
            .update_counter(cont_rep, CounterKind::Update, 1);
        Ok(CommandResponse::protocol_text(StatusCode::OK, ""))
    }

    /// `delete`: one component, or the whole record when `compId` is
    /// absent.
    pub async fn delete(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let mut record = self.load_record(cont_rep, doc_id).await?;

        match params.get_non_empty("compId") {
            Some(comp_id) => {
                if !record.has_component(comp_id).await? {
                    return Err(ArchiveError::not_found(format!(
                        "Component not found: {comp_id}"
                    )));
                }
                record.delete_component(comp_id).await?;
                record.set_metadata(Utc::now());
                record.save().await?;
            }
            None => record.delete_record().await?,
        }

        self.counters
            .update_counter(cont_rep, CounterKind::Delete, 1);
        Ok(CommandResponse::protocol_text(StatusCode::OK, ""))
    }

    /// `search` / `attrSearch`: extract text, run the pattern matcher.
    pub async fn search(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        let params = command.params();
        let cont_rep = require(params, "contRep")?;
        let doc_id = require(params, "docId")?;
        let pattern = require(params, "pattern")?;

        let comp_id = if command.template() == CommandTemplate::AttrSearch {
            ATTRIBUTE_COMP_ID
        } else {
            params.get_non_empty("compId").unwrap_or(DEFAULT_COMP_ID)
        };

        let case_sensitive = params
            .get_non_empty("caseSensitive")
            .map_or(true, |v| !matches!(v, "0" | "false" | "no"));
        let num_results = match params.get_non_empty("numResults") {
            Some(raw) => raw.parse().map_err(|_| {
                ArchiveError::validation(format!("Malformed numResults value: {raw}"))
            })?,
            None => DEFAULT_NUM_RESULTS,
        };

        let record = self.load_record(cont_rep, doc_id).await?;
        let component = record
            .extract_component(comp_id, true)
            .await?
            .ok_or_else(|| ArchiveError::not_found(format!("Component not found: {comp_id}")))?;
        let bytes = match &component.data {
            Some(stream) => stream.read_all().await?,
            None => Bytes::new(),
        };

        let text = self.extractors.extract(&component.content_type, &bytes)?;
        let result = match_pattern(&text, pattern, case_sensitive, num_results)?;

        self.counters
            .update_counter(cont_rep, CounterKind::View, 1);
        Ok(CommandResponse::protocol_text(StatusCode::OK, result))
    }

    /// Builds the uploaded components: the whole body for PUT, parsed
    /// multipart parts for POST.
    fn components_from_request(
        &self,
        command: &DispatchCommand,
    ) -> ArchiveResult<Vec<SapDocumentComponent>> {
        let params = command.params();
        let request = command.command().request();
        let p_version = params.get_non_empty("pVersion").unwrap_or("0045");

        if request.method == http::Method::PUT {
            let comp_id = params.get_non_empty("compId").unwrap_or(DEFAULT_COMP_ID);
            let content_type = request
                .content_type
                .as_deref()
                .unwrap_or("application/octet-stream");
            return Ok(vec![build_component(
                comp_id,
                content_type,
                request.body.clone(),
                p_version,
            )]);
        }

        let content_type = request.content_type.as_deref().ok_or_else(|| {
            ArchiveError::validation("Missing Content-Type on multipart request")
        })?;
        let boundary = boundary_from_content_type(content_type).ok_or_else(|| {
            ArchiveError::validation("Missing multipart boundary in Content-Type")
        })?;
        let parts = parse_multipart(&request.body, &boundary)?;

        let mut components = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let comp_id = match part.header("X-compId") {
                Some(id) => id.to_string(),
                None if index == 0 => DEFAULT_COMP_ID.to_string(),
                None => format!("data{index}"),
            };
            let content_type = part.header("Content-Type").unwrap_or("application/octet-stream");
            components.push(build_component(
                &comp_id,
                content_type,
                part.data.clone(),
                p_version,
            ));
        }
        Ok(components)
    }
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("extractors", &self.extractors)
            .field("appenders", &self.appenders)
            .finish_non_exhaustive()
    }
}

/// The dispatcher handler over a shared [`DocumentService`].
struct ServiceHandler {
    service: Arc<DocumentService>,
}

#[async_trait]
impl CommandHandler for ServiceHandler {
    async fn handle(&self, command: &DispatchCommand) -> ArchiveResult<CommandResponse> {
        match command.template() {
            CommandTemplate::Get => self.service.get(command).await,
            CommandTemplate::DocGet => self.service.doc_get(command).await,
            CommandTemplate::Info => self.service.info(command).await,
            CommandTemplate::ServerInfo => self.service.server_info(command).await,
            CommandTemplate::PutCert => self.service.put_cert(command).await,
            CommandTemplate::CreatePut | CommandTemplate::CreatePost | CommandTemplate::MCreate => {
                self.service.create(command).await
            }
            CommandTemplate::UpdatePut | CommandTemplate::UpdatePost => {
                self.service.update(command).await
            }
            CommandTemplate::Append => self.service.append(command).await,
            CommandTemplate::Delete => self.service.delete(command).await,
            CommandTemplate::Search | CommandTemplate::AttrSearch => {
                self.service.search(command).await
            }
            template => Err(ArchiveError::not_implemented(format!(
                "Unsupported command: {template}"
            ))),
        }
    }
}

/// Wires the service into a dispatcher handler registry.
///
/// # Errors
///
/// Propagates the registry's duplicate-template configuration error.
pub fn handler_registry(service: Arc<DocumentService>) -> ArchiveResult<HandlerRegistry> {
    let handler: Arc<dyn CommandHandler> = Arc::new(ServiceHandler { service });
    Ok(HandlerRegistry::builder()
        .register_all(
            &[
                CommandTemplate::Get,
                CommandTemplate::DocGet,
                CommandTemplate::Info,
                CommandTemplate::ServerInfo,
                CommandTemplate::PutCert,
                CommandTemplate::CreatePut,
                CommandTemplate::CreatePost,
                CommandTemplate::MCreate,
                CommandTemplate::UpdatePut,
                CommandTemplate::UpdatePost,
                CommandTemplate::Append,
                CommandTemplate::Delete,
                CommandTemplate::Search,
                CommandTemplate::AttrSearch,
            ],
            handler,
        )?
        .build())
}

fn require<'a>(params: &'a ParameterStore, name: &str) -> ArchiveResult<&'a str> {
    params
        .get_non_empty(name)
        .ok_or_else(|| ArchiveError::validation(format!("Missing required parameter: {name}")))
}

fn int_param(params: &ParameterStore, name: &str) -> ArchiveResult<i64> {
    match params.get_non_empty(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ArchiveError::validation(format!("Malformed {name} value: {raw}"))),
        None => Ok(0),
    }
}

/// Resolves the requested component, or the `data`/`data1` default.
async fn resolve_component(
    record: &dyn RecordHandle,
    comp_id: Option<&str>,
) -> ArchiveResult<SapDocumentComponent> {
    if let Some(comp_id) = comp_id {
        return record
            .extract_component(comp_id, true)
            .await?
            .ok_or_else(|| ArchiveError::not_found(format!("Component not found: {comp_id}")));
    }
    if let Some(component) = record.extract_component(DEFAULT_COMP_ID, true).await? {
        return Ok(component);
    }
    record
        .extract_component(FALLBACK_COMP_ID, true)
        .await?
        .ok_or_else(|| ArchiveError::not_found("Document has no default component"))
}

fn build_component(
    comp_id: &str,
    content_type: &str,
    data: Bytes,
    p_version: &str,
) -> SapDocumentComponent {
    let (content_type, charset) = split_charset(content_type);
    let now = Utc::now();
    SapDocumentComponent {
        comp_id: comp_id.to_string(),
        content_type,
        charset,
        version: None,
        content_length: data.len() as u64,
        creation_date: now,
        modified_date: now,
        status: "online".to_string(),
        p_version: p_version.to_string(),
        file_name: None,
        data: Some(ContentStream::from(data)),
    }
}

/// Splits a `charset` parameter off a content type, keeping the rest.
fn split_charset(content_type: &str) -> (String, Option<String>) {
    let mut base = String::new();
    let mut charset = None;
    for (index, piece) in content_type.split(';').enumerate() {
        let trimmed = piece.trim();
        if index > 0 {
            if let Some(value) = trimmed
                .strip_prefix("charset=")
                .or_else(|| trimmed.strip_prefix("CHARSET="))
            {
                charset = Some(value.trim_matches('"').to_string());
                continue;
            }
        }
        if !base.is_empty() {
            base.push_str("; ");
        }
        base.push_str(trimmed);
    }
    (base, charset)
}

fn component_headers(response: &mut CommandResponse, component: &SapDocumentComponent) {
    response.set_header("X-compId", &component.comp_id);
    response.set_header("X-Content-Length", &component.content_length.to_string());
    response.set_header("X-compStatus", &component.status);
    response.set_header("X-pVersion", &component.p_version);
    set_date_headers(
        response,
        "X-compDateC",
        "X-compTimeC",
        component.creation_date,
    );
    set_date_headers(
        response,
        "X-compDateM",
        "X-compTimeM",
        component.modified_date,
    );
}

fn record_headers(response: &mut CommandResponse, record: &dyn RecordHandle) {
    set_date_headers(response, "X-dateC", "X-timeC", record.date_created());
    set_date_headers(response, "X-dateM", "X-timeM", record.date_modified());
    response.set_header("X-numberComps", &record.component_count().to_string());
}

fn set_date_headers(
    response: &mut CommandResponse,
    date_name: &str,
    time_name: &str,
    at: DateTime<Utc>,
) {
    response.set_header(date_name, &at.format("%Y-%m-%d").to_string());
    response.set_header(time_name, &at.format("%H:%M:%S").to_string());
}

fn info_html(doc_id: &str, components: &[SapDocumentComponent]) -> String {
    let mut html = String::from("<html><head><title>Document info</title></head><body>");
    html.push_str(&format!("<h1>Document {doc_id}</h1><table border=\"1\">"));
    html.push_str(
        "<tr><th>compId</th><th>contentType</th><th>length</th>\
         <th>created</th><th>modified</th><th>status</th></tr>",
    );
    for component in components {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            component.comp_id,
            component.content_type,
            component.content_length,
            component.creation_date.format("%Y-%m-%d %H:%M:%S"),
            component.modified_date.format("%Y-%m-%d %H:%M:%S"),
            component.status,
        ));
    }
    html.push_str("</table></body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use arclink_core::{RawRequest, UnverifiedCommand};
    use arclink_counter::CounterCache;
    use arclink_protocol::ResponseBody;

    use crate::repository::RepositoryInfo;

    type RecordKey = (String, String);

    #[derive(Debug, Clone)]
    struct StoredRecord {
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
        components: Vec<SapDocumentComponent>,
    }

    #[derive(Default)]
    struct MemStore {
        records: Mutex<HashMap<RecordKey, StoredRecord>>,
        certificates: Mutex<HashMap<String, CertificateUpload>>,
    }

    struct MemRepository {
        store: Arc<MemStore>,
    }

    impl MemRepository {
        fn new() -> Self {
            Self {
                store: Arc::new(MemStore::default()),
            }
        }

        fn insert(&self, cont_rep: &str, doc_id: &str, components: Vec<SapDocumentComponent>) {
            let now = Utc::now();
            self.store.records.lock().unwrap().insert(
                (cont_rep.to_string(), doc_id.to_string()),
                StoredRecord {
                    created: now,
                    modified: now,
                    components,
                },
            );
        }
    }

    #[async_trait]
    impl ContentRepository for MemRepository {
        async fn get_record(
            &self,
            cont_rep: &str,
            doc_id: &str,
        ) -> ArchiveResult<Option<Box<dyn RecordHandle>>> {
            let key = (cont_rep.to_string(), doc_id.to_string());
            let snapshot = self.store.records.lock().unwrap().get(&key).cloned();
            Ok(snapshot.map(|record| {
                Box::new(MemRecord {
                    key,
                    record,
                    store: Arc::clone(&self.store),
                }) as Box<dyn RecordHandle>
            }))
        }

        async fn create_record(&self, record: NewRecord) -> ArchiveResult<Box<dyn RecordHandle>> {
            let key = (record.cont_rep.clone(), record.doc_id.clone());
            let now = Utc::now();
            let stored = StoredRecord {
                created: now,
                modified: now,
                components: record.components,
            };
            self.store
                .records
                .lock()
                .unwrap()
                .insert(key.clone(), stored.clone());
            Ok(Box::new(MemRecord {
                key,
                record: stored,
                store: Arc::clone(&self.store),
            }))
        }

        async fn save_certificate(
            &self,
            cont_rep: &str,
            upload: CertificateUpload,
        ) -> ArchiveResult<()> {
            self.store
                .certificates
                .lock()
                .unwrap()
                .insert(cont_rep.to_string(), upload);
            Ok(())
        }

        async fn archive_certificate(
            &self,
            _cont_rep: &str,
        ) -> ArchiveResult<Option<arclink_auth::ArchiveCertificate>> {
            Ok(None)
        }

        async fn feature_activated(&self) -> bool {
            true
        }

        async fn is_initialized(&self) -> bool {
            true
        }

        async fn server_info(
            &self,
            cont_rep: Option<&str>,
        ) -> ArchiveResult<Vec<RepositoryInfo>> {
            let all = vec![
                RepositoryInfo {
                    cont_rep: "A1".to_string(),
                    enabled: true,
                    p_version: "0046".to_string(),
                    document_count: Some(12),
                },
                RepositoryInfo {
                    cont_rep: "A2".to_string(),
                    enabled: false,
                    p_version: "0046".to_string(),
                    document_count: None,
                },
            ];
            Ok(match cont_rep {
                Some(name) => all.into_iter().filter(|r| r.cont_rep == name).collect(),
                None => all,
            })
        }

        async fn save_counters(
            &self,
            _cont_rep: &str,
            _snapshot: arclink_counter::CounterSnapshot,
        ) -> ArchiveResult<()> {
            Ok(())
        }
    }

    struct MemRecord {
        key: RecordKey,
        record: StoredRecord,
        store: Arc<MemStore>,
    }

    impl MemRecord {
        fn metadata_only(component: &SapDocumentComponent) -> SapDocumentComponent {
            let mut stripped = component.clone();
            stripped.data = None;
            stripped
        }
    }

    #[async_trait]
    impl RecordHandle for MemRecord {
        fn date_created(&self) -> DateTime<Utc> {
            self.record.created
        }

        fn date_modified(&self) -> DateTime<Utc> {
            self.record.modified
        }

        fn component_count(&self) -> usize {
            self.record.components.len()
        }

        async fn all_components(&self) -> ArchiveResult<Vec<SapDocumentComponent>> {
            Ok(self
                .record
                .components
                .iter()
                .map(Self::metadata_only)
                .collect())
        }

        async fn find_component(
            &self,
            comp_id: &str,
        ) -> ArchiveResult<Option<SapDocumentComponent>> {
            Ok(self
                .record
                .components
                .iter()
                .find(|c| c.comp_id == comp_id)
                .map(Self::metadata_only))
        }

        async fn has_component(&self, comp_id: &str) -> ArchiveResult<bool> {
            Ok(self.record.components.iter().any(|c| c.comp_id == comp_id))
        }

        async fn extract_component(
            &self,
            comp_id: &str,
            with_content: bool,
        ) -> ArchiveResult<Option<SapDocumentComponent>> {
            Ok(self
                .record
                .components
                .iter()
                .find(|c| c.comp_id == comp_id)
                .map(|c| {
                    if with_content {
                        c.clone()
                    } else {
                        Self::metadata_only(c)
                    }
                }))
        }

        async fn extract_all(&self) -> ArchiveResult<Vec<SapDocumentComponent>> {
            Ok(self.record.components.clone())
        }

        async fn add_component(&mut self, component: SapDocumentComponent) -> ArchiveResult<()> {
            self.record.components.push(component);
            Ok(())
        }

        async fn update_component(
            &mut self,
            component: SapDocumentComponent,
        ) -> ArchiveResult<()> {
            let slot = self
                .record
                .components
                .iter_mut()
                .find(|c| c.comp_id == component.comp_id)
                .ok_or_else(|| ArchiveError::not_found("component"))?;
            *slot = component;
            Ok(())
        }

        async fn delete_component(&mut self, comp_id: &str) -> ArchiveResult<()> {
            self.record.components.retain(|c| c.comp_id != comp_id);
            Ok(())
        }

        async fn delete_record(&mut self) -> ArchiveResult<()> {
            self.store.records.lock().unwrap().remove(&self.key);
            Ok(())
        }

        async fn save(&mut self) -> ArchiveResult<()> {
            self.store
                .records
                .lock()
                .unwrap()
                .insert(self.key.clone(), self.record.clone());
            Ok(())
        }

        fn set_metadata(&mut self, modified: DateTime<Utc>) {
            self.record.modified = modified;
        }
    }

    fn text_component(comp_id: &str, bytes: &'static [u8]) -> SapDocumentComponent {
        build_component(comp_id, "text/plain", Bytes::from_static(bytes), "0046")
    }

    fn service_over(repository: MemRepository) -> (DocumentService, Arc<CounterCache>) {
        let cache = Arc::new(CounterCache::new());
        let counters = CounterService::with_cache(Arc::clone(&cache));
        (
            DocumentService::new(Arc::new(repository), counters),
            cache,
        )
    }

    fn command(method: http::Method, query: &str, body: Bytes) -> DispatchCommand {
        command_with_type(method, query, body, None)
    }

    fn command_with_type(
        method: http::Method,
        query: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> DispatchCommand {
        let length = i64::try_from(body.len()).unwrap();
        DispatchCommand::Anonymous(
            UnverifiedCommand::from_request(RawRequest {
                method,
                scheme: "http".to_string(),
                host: "cs.example.com".to_string(),
                path: "/archive".to_string(),
                query: query.to_string(),
                content_length: Some(length),
                content_type: content_type.map(str::to_string),
                body,
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_get_returns_default_component_with_headers() {
        let repository = MemRepository::new();
        repository.insert("A1", "doc1", vec![text_component("data", b"hello world")]);
        let (service, cache) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        let response = service.get(&cmd).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-numbercomps").unwrap(), "1");
        match response.body() {
            ResponseBody::Document(component) => {
                assert_eq!(component.comp_id, "data");
                assert_eq!(component.content_length, 11);
            }
            other => panic!("unexpected body: {other:?}"),
        }
        assert_eq!(cache.get("A1").unwrap().get(CounterKind::View), 1);
    }

    #[tokio::test]
    async fn test_get_falls_back_to_data1() {
        let repository = MemRepository::new();
        repository.insert("A1", "doc1", vec![text_component("data1", b"fallback")]);
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        let response = service.get(&cmd).await.unwrap();
        match response.body() {
            ResponseBody::Document(component) => assert_eq!(component.comp_id, "data1"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_applies_byte_range() {
        let repository = MemRepository::new();
        repository.insert("A1", "doc1", vec![text_component("data", b"0123456789")]);
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&pVersion=0046&fromOffset=2&toOffset=5",
            Bytes::new(),
        );
        let response = service.get(&cmd).await.unwrap();
        match response.into_body() {
            ResponseBody::Document(component) => {
                let bytes = component.data.unwrap().read_all().await.unwrap();
                assert_eq!(bytes.as_ref(), b"234");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_range_beyond_length_is_400() {
        let repository = MemRepository::new();
        repository.insert("A1", "doc1", vec![text_component("data", b"0123")]);
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&pVersion=0046&fromOffset=9&toOffset=12",
            Bytes::new(),
        );
        let err = service.get(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_document_is_404() {
        let (service, _) = service_over(MemRepository::new());
        let cmd = command(
            http::Method::GET,
            "get&contRep=A1&docId=nope&pVersion=0046",
            Bytes::new(),
        );
        let err = service.get(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_doc_get_returns_all_components() {
        let repository = MemRepository::new();
        repository.insert(
            "A1",
            "doc1",
            vec![text_component("data", b"a"), text_component("descr", b"b")],
        );
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "docget&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        let response = service.doc_get(&cmd).await.unwrap();
        match response.body() {
            ResponseBody::Multipart(components) => assert_eq!(components.len(), 2),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_info_metadata_and_html() {
        let repository = MemRepository::new();
        repository.insert("A1", "doc1", vec![text_component("data", b"abc")]);
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "info&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        let response = service.info(&cmd).await.unwrap();
        assert!(matches!(response.body(), ResponseBody::InfoMetadata(c) if c.len() == 1));

        let cmd = command(
            http::Method::GET,
            "info&contRep=A1&docId=doc1&pVersion=0046&resultAs=html",
            Bytes::new(),
        );
        let response = service.info(&cmd).await.unwrap();
        assert_eq!(response.content_type(), "text/html; charset=UTF-8");
        assert!(response.text().unwrap().contains("<td>data</td>"));
    }

    #[tokio::test]
    async fn test_create_put_then_duplicate_is_403() {
        let (service, cache) = service_over(MemRepository::new());
        let cmd = command_with_type(
            http::Method::PUT,
            "create&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::from_static(b"payload"),
            Some("text/plain"),
        );

        let response = service.create(&cmd).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(cache.get("A1").unwrap().get(CounterKind::Create), 1);

        let err = service.create(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_mcreate_parses_multipart_components() {
        let (service, _) = service_over(MemRepository::new());
        let body = Bytes::from_static(
            b"--B\r\nContent-Type: text/plain\r\nX-compId: data\r\n\r\nfirst\r\n\
              --B\r\nContent-Type: text/plain\r\nX-compId: descr\r\n\r\nsecond\r\n\
              --B--\r\n",
        );
        let cmd = command_with_type(
            http::Method::POST,
            "mcreate&contRep=A1&docId=doc1&pVersion=0046",
            body,
            Some("multipart/form-data; boundary=B"),
        );
        service.create(&cmd).await.unwrap();

        let get = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&compId=descr&pVersion=0046",
            Bytes::new(),
        );
        let response = service.get(&get).await.unwrap();
        match response.into_body() {
            ResponseBody::Document(component) => {
                let bytes = component.data.unwrap().read_all().await.unwrap();
                assert_eq!(bytes.as_ref(), b"second");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_requires_existing_component() {
        let repository = MemRepository::new();
        repository.insert("A1", "doc1", vec![text_component("data", b"old")]);
        let (service, _) = service_over(repository);

        let cmd = command_with_type(
            http::Method::PUT,
            "update&contRep=A1&docId=doc1&compId=missing&pVersion=0046",
            Bytes::from_static(b"new"),
            Some("text/plain"),
        );
        let err = service.update(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let cmd = command_with_type(
            http::Method::PUT,
            "update&contRep=A1&docId=doc1&compId=data&pVersion=0046",
            Bytes::from_static(b"new"),
            Some("text/plain"),
        );
        service.update(&cmd).await.unwrap();

        let get = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        let response = service.get(&get).await.unwrap();
        match response.into_body() {
            ResponseBody::Document(component) => {
                let bytes = component.data.unwrap().read_all().await.unwrap();
                assert_eq!(bytes.as_ref(), b"new");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_append_merges_text_and_counts_update() {
        let repository = MemRepository::new();
        repository.insert("A1", "doc1", vec![text_component("data", b"first")]);
        let (service, cache) = service_over(repository);

        let cmd = command_with_type(
            http::Method::PUT,
            "append&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::from_static(b"second"),
            Some("text/plain"),
        );
        service.append(&cmd).await.unwrap();
        assert_eq!(cache.get("A1").unwrap().get(CounterKind::Update), 1);

        let get = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        let response = service.get(&get).await.unwrap();
        match response.into_body() {
            ResponseBody::Document(component) => {
                let bytes = component.data.unwrap().read_all().await.unwrap();
                assert_eq!(bytes.as_ref(), b"first\nsecond");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_append_unknown_content_type_is_404() {
        let repository = MemRepository::new();
        repository.insert(
            "A1",
            "doc1",
            vec![build_component(
                "data",
                "image/png",
                Bytes::from_static(b"png"),
                "0046",
            )],
        );
        let (service, _) = service_over(repository);

        let cmd = command_with_type(
            http::Method::PUT,
            "append&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::from_static(b"more"),
            Some("image/png"),
        );
        let err = service.append(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message().contains("Unsupported content type"));
    }

    #[tokio::test]
    async fn test_delete_component_then_record() {
        let repository = MemRepository::new();
        repository.insert(
            "A1",
            "doc1",
            vec![text_component("data", b"a"), text_component("descr", b"b")],
        );
        let (service, cache) = service_over(repository);

        let cmd = command(
            http::Method::DELETE,
            "delete&contRep=A1&docId=doc1&compId=descr&pVersion=0046",
            Bytes::new(),
        );
        service.delete(&cmd).await.unwrap();

        let cmd = command(
            http::Method::DELETE,
            "delete&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        service.delete(&cmd).await.unwrap();
        assert_eq!(cache.get("A1").unwrap().get(CounterKind::Delete), 2);

        let get = command(
            http::Method::GET,
            "get&contRep=A1&docId=doc1&pVersion=0046",
            Bytes::new(),
        );
        assert_eq!(
            service.get(&get).await.unwrap_err().status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_search_matches_pattern_lines() {
        let repository = MemRepository::new();
        repository.insert(
            "A1",
            "doc1",
            vec![text_component(
                "data",
                b"73 138 001 first payload\n211 120 001 second payload\n",
            )],
        );
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "search&contRep=A1&docId=doc1&pattern=0%2B3%2B001&pVersion=0046",
            Bytes::new(),
        );
        let response = service.search(&cmd).await.unwrap();
        assert_eq!(response.text(), Some("2;73;138;211;120;"));
    }

    #[tokio::test]
    async fn test_attr_search_reads_descr_component() {
        let repository = MemRepository::new();
        repository.insert(
            "A1",
            "doc1",
            vec![
                text_component("data", b"1 2 XXX\n"),
                text_component("descr", b"5 6 001attr\n"),
            ],
        );
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "attrsearch&contRep=A1&docId=doc1&pattern=0%2B3%2B001&pVersion=0046",
            Bytes::new(),
        );
        let response = service.search(&cmd).await.unwrap();
        assert_eq!(response.text(), Some("1;5;6;"));
    }

    #[tokio::test]
    async fn test_search_unsupported_content_type_is_406() {
        let repository = MemRepository::new();
        repository.insert(
            "A1",
            "doc1",
            vec![build_component(
                "data",
                "image/png",
                Bytes::from_static(b"png"),
                "0046",
            )],
        );
        let (service, _) = service_over(repository);

        let cmd = command(
            http::Method::GET,
            "search&contRep=A1&docId=doc1&pattern=0%2B3%2B001&pVersion=0046",
            Bytes::new(),
        );
        let err = service.search(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_server_info_lists_repositories() {
        let (service, _) = service_over(MemRepository::new());
        let cmd = command(
            http::Method::GET,
            "serverinfo&pVersion=0046",
            Bytes::new(),
        );
        let response = service.server_info(&cmd).await.unwrap();
        let text = response.text().unwrap();
        assert!(text.starts_with("serverStatus=\"running\""));
        assert!(text.contains("contRep=\"A1\";contRepStatus=\"running\""));
        assert!(text.contains("contRep=\"A2\";contRepStatus=\"disabled\""));
        assert!(text.contains("numberDocs=\"12\""));
    }

    #[tokio::test]
    async fn test_put_cert_requires_auth_id_and_valid_der() {
        let (service, _) = service_over(MemRepository::new());

        let cmd = command(
            http::Method::POST,
            "putcert&contRep=A1&pVersion=0046",
            Bytes::from_static(b"\x30\x03\x02\x01\x01"),
        );
        let err = service.put_cert(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("authId"));

        let cmd = command(
            http::Method::POST,
            "putcert&contRep=A1&authId=R3&pVersion=0046",
            Bytes::from_static(b"\x30\x03\x02\x01\x01"),
        );
        let err = service.put_cert(&cmd).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("Malformed certificate"));
    }

    #[tokio::test]
    async fn test_handler_registry_covers_all_served_templates() {
        let (service, _) = service_over(MemRepository::new());
        let registry = handler_registry(Arc::new(service)).unwrap();
        assert_eq!(registry.len(), 14);
        assert!(registry.get(CommandTemplate::Get).is_some());
        assert!(registry.get(CommandTemplate::PutCert).is_some());
        assert!(registry.get(CommandTemplate::Lock).is_none());
    }

    #[test]
    fn test_split_charset() {
        assert_eq!(
            split_charset("text/plain; charset=UTF-8"),
            ("text/plain".to_string(), Some("UTF-8".to_string()))
        );
        assert_eq!(
            split_charset("application/pdf"),
            ("application/pdf".to_string(), None)
        );
        assert_eq!(
            split_charset("text/plain; version=1; charset=\"latin1\""),
            ("text/plain; version=1".to_string(), Some("latin1".to_string()))
        );
    }
}
