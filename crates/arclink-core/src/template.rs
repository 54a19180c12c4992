//! Command templates and the static resolution table.
//!
//! An ArchiveLink command is identified by the pair (HTTP method, first
//! query token). Resolution is a fixed compile-time table; there is no
//! dynamic registration. Each template carries two pieces of metadata: the
//! access-mode character a signed URL must grant, and the canonical HTTP
//! method.

use http::Method;

use crate::access_mode::AccessMode;

/// The enumerated ArchiveLink command templates.
///
/// Commands that exist under more than one HTTP method (`create`, `update`)
/// resolve to distinct templates, mirroring the wire protocol where the
/// method changes the command's semantics (single vs. multipart body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CommandTemplate {
    // GET
    Get,
    DocGet,
    Info,
    Search,
    AttrSearch,
    FreeSearch,
    GetAttribute,
    GetDocHistory,
    GetAts,
    GetCert,
    ServerInfo,
    SignUrl,
    ValidUser,
    GetNotes,
    GetAnnotations,
    VerifySig,
    AnalyzeSec,
    AdminContRep,
    Lock,
    Unlock,
    ReserveDocId,
    Cache,
    // POST
    CreatePost,
    MCreate,
    UpdatePost,
    AppendNote,
    StoreAnnotations,
    SetAttribute,
    DelAttribute,
    SetDocFlag,
    Flush,
    Migrate,
    PutCert,
    // PUT
    CreatePut,
    UpdatePut,
    Append,
    // DELETE
    Delete,
}

/// The full resolution table: (method, lower-cased command name, template).
const TEMPLATES: &[(&Method, &str, CommandTemplate)] = &[
    (&Method::GET, "get", CommandTemplate::Get),
    (&Method::GET, "docget", CommandTemplate::DocGet),
    (&Method::GET, "info", CommandTemplate::Info),
    (&Method::GET, "search", CommandTemplate::Search),
    (&Method::GET, "attrsearch", CommandTemplate::AttrSearch),
    (&Method::GET, "freesearch", CommandTemplate::FreeSearch),
    (&Method::GET, "getattribute", CommandTemplate::GetAttribute),
    (&Method::GET, "getdochistory", CommandTemplate::GetDocHistory),
    (&Method::GET, "getats", CommandTemplate::GetAts),
    (&Method::GET, "getcert", CommandTemplate::GetCert),
    (&Method::GET, "serverinfo", CommandTemplate::ServerInfo),
    (&Method::GET, "signurl", CommandTemplate::SignUrl),
    (&Method::GET, "validuser", CommandTemplate::ValidUser),
    (&Method::GET, "getnotes", CommandTemplate::GetNotes),
    (&Method::GET, "getannotations", CommandTemplate::GetAnnotations),
    (&Method::GET, "verifysig", CommandTemplate::VerifySig),
    (&Method::GET, "analyzesec", CommandTemplate::AnalyzeSec),
    (&Method::GET, "admincontrep", CommandTemplate::AdminContRep),
    (&Method::GET, "lock", CommandTemplate::Lock),
    (&Method::GET, "unlock", CommandTemplate::Unlock),
    (&Method::GET, "reservedocid", CommandTemplate::ReserveDocId),
    (&Method::GET, "cache", CommandTemplate::Cache),
    (&Method::POST, "create", CommandTemplate::CreatePost),
    (&Method::POST, "mcreate", CommandTemplate::MCreate),
    (&Method::POST, "update", CommandTemplate::UpdatePost),
    (&Method::POST, "appendnote", CommandTemplate::AppendNote),
    (
        &Method::POST,
        "storeannotations",
        CommandTemplate::StoreAnnotations,
    ),
    (&Method::POST, "setattribute", CommandTemplate::SetAttribute),
    (&Method::POST, "delattribute", CommandTemplate::DelAttribute),
    (&Method::POST, "setdocflag", CommandTemplate::SetDocFlag),
    (&Method::POST, "flush", CommandTemplate::Flush),
    (&Method::POST, "migrate", CommandTemplate::Migrate),
    (&Method::POST, "putcert", CommandTemplate::PutCert),
    (&Method::PUT, "create", CommandTemplate::CreatePut),
    (&Method::PUT, "update", CommandTemplate::UpdatePut),
    (&Method::PUT, "append", CommandTemplate::Append),
    (&Method::DELETE, "delete", CommandTemplate::Delete),
];

impl CommandTemplate {
    /// Resolves (HTTP method, lower-cased command name) against the static
    /// table.
    #[must_use]
    pub fn resolve(method: &Method, command: &str) -> Option<Self> {
        TEMPLATES
            .iter()
            .find(|(m, name, _)| *m == method && *name == command)
            .map(|(_, _, template)| *template)
    }

    /// Returns the access mode a signed URL must grant for this template,
    /// or `None` for commands outside the permission model (certificate
    /// exchange, server administration).
    #[must_use]
    pub const fn access_mode(self) -> Option<AccessMode> {
        match self {
            Self::Get
            | Self::DocGet
            | Self::Info
            | Self::Search
            | Self::AttrSearch
            | Self::FreeSearch
            | Self::GetAttribute
            | Self::GetDocHistory
            | Self::GetAts
            | Self::ValidUser
            | Self::GetNotes
            | Self::GetAnnotations
            | Self::VerifySig
            | Self::Cache => Some(AccessMode::Read),
            Self::CreatePost | Self::MCreate | Self::CreatePut | Self::ReserveDocId => {
                Some(AccessMode::Create)
            }
            Self::UpdatePost
            | Self::UpdatePut
            | Self::Append
            | Self::AppendNote
            | Self::StoreAnnotations
            | Self::SetAttribute
            | Self::DelAttribute
            | Self::SetDocFlag
            | Self::Flush
            | Self::Migrate
            | Self::Lock
            | Self::Unlock => Some(AccessMode::Update),
            Self::Delete => Some(AccessMode::Delete),
            Self::GetCert | Self::ServerInfo | Self::SignUrl | Self::AnalyzeSec
            | Self::AdminContRep | Self::PutCert => None,
        }
    }

    /// Returns the canonical HTTP method for this template.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Get
            | Self::DocGet
            | Self::Info
            | Self::Search
            | Self::AttrSearch
            | Self::FreeSearch
            | Self::GetAttribute
            | Self::GetDocHistory
            | Self::GetAts
            | Self::GetCert
            | Self::ServerInfo
            | Self::SignUrl
            | Self::ValidUser
            | Self::GetNotes
            | Self::GetAnnotations
            | Self::VerifySig
            | Self::AnalyzeSec
            | Self::AdminContRep
            | Self::Lock
            | Self::Unlock
            | Self::ReserveDocId
            | Self::Cache => Method::GET,
            Self::CreatePost
            | Self::MCreate
            | Self::UpdatePost
            | Self::AppendNote
            | Self::StoreAnnotations
            | Self::SetAttribute
            | Self::DelAttribute
            | Self::SetDocFlag
            | Self::Flush
            | Self::Migrate
            | Self::PutCert => Method::POST,
            Self::CreatePut | Self::UpdatePut | Self::Append => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    /// Returns the template name used in protocol error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::DocGet => "DOCGET",
            Self::Info => "INFO",
            Self::Search => "SEARCH",
            Self::AttrSearch => "ATTRSEARCH",
            Self::FreeSearch => "FREESEARCH",
            Self::GetAttribute => "GETATTRIBUTE",
            Self::GetDocHistory => "GETDOCHISTORY",
            Self::GetAts => "GETATS",
            Self::GetCert => "GETCERT",
            Self::ServerInfo => "SERVERINFO",
            Self::SignUrl => "SIGNURL",
            Self::ValidUser => "VALIDUSER",
            Self::GetNotes => "GETNOTES",
            Self::GetAnnotations => "GETANNOTATIONS",
            Self::VerifySig => "VERIFYSIG",
            Self::AnalyzeSec => "ANALYZESEC",
            Self::AdminContRep => "ADMINCONTREP",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::ReserveDocId => "RESERVEDOCID",
            Self::Cache => "CACHE",
            Self::CreatePost => "CREATEPOST",
            Self::MCreate => "MCREATE",
            Self::UpdatePost => "UPDATEPOST",
            Self::AppendNote => "APPENDNOTE",
            Self::StoreAnnotations => "STOREANNOTATIONS",
            Self::SetAttribute => "SETATTRIBUTE",
            Self::DelAttribute => "DELATTRIBUTE",
            Self::SetDocFlag => "SETDOCFLAG",
            Self::Flush => "FLUSH",
            Self::Migrate => "MIGRATE",
            Self::PutCert => "PUTCERT",
            Self::CreatePut => "CREATEPUT",
            Self::UpdatePut => "UPDATEPUT",
            Self::Append => "APPEND",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_get() {
        assert_eq!(
            CommandTemplate::resolve(&Method::GET, "get"),
            Some(CommandTemplate::Get)
        );
    }

    #[test]
    fn test_resolve_create_depends_on_method() {
        assert_eq!(
            CommandTemplate::resolve(&Method::PUT, "create"),
            Some(CommandTemplate::CreatePut)
        );
        assert_eq!(
            CommandTemplate::resolve(&Method::POST, "create"),
            Some(CommandTemplate::CreatePost)
        );
        assert_eq!(CommandTemplate::resolve(&Method::GET, "create"), None);
    }

    #[test]
    fn test_resolve_unknown_command() {
        assert_eq!(CommandTemplate::resolve(&Method::GET, "frobnicate"), None);
    }

    #[test]
    fn test_every_table_entry_resolves_to_itself() {
        for &(method, name, template) in TEMPLATES {
            assert_eq!(CommandTemplate::resolve(method, name), Some(template));
            assert_eq!(&template.method(), method);
        }
    }

    #[test]
    fn test_access_modes() {
        assert_eq!(
            CommandTemplate::Get.access_mode(),
            Some(AccessMode::Read)
        );
        assert_eq!(
            CommandTemplate::CreatePut.access_mode(),
            Some(AccessMode::Create)
        );
        assert_eq!(
            CommandTemplate::UpdatePost.access_mode(),
            Some(AccessMode::Update)
        );
        assert_eq!(
            CommandTemplate::Delete.access_mode(),
            Some(AccessMode::Delete)
        );
        assert_eq!(CommandTemplate::ServerInfo.access_mode(), None);
        assert_eq!(CommandTemplate::PutCert.access_mode(), None);
    }

    #[test]
    fn test_names_match_protocol_spelling() {
        assert_eq!(CommandTemplate::CreatePut.name(), "CREATEPUT");
        assert_eq!(CommandTemplate::DocGet.name(), "DOCGET");
        assert_eq!(CommandTemplate::AdminContRep.name(), "ADMINCONTREP");
    }
}
