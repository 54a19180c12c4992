//! Query-string parameters and the canonical string-to-sign.
//!
//! ArchiveLink URLs carry the command as the first query token and the
//! parameters after it: `?get&contRep=A1&docId=4711&pVersion=0046`. The
//! [`ParameterStore`] preserves the wire order of the parameters, because
//! the canonical string-to-sign must be reproduced byte-for-byte both when
//! a URL is signed and when a request is verified.

use std::borrow::Cow;

/// The parameter carrying the detached signature; excluded from the
/// string-to-sign unless explicitly requested.
pub const SEC_KEY: &str = "secKey";

/// An ordered, case-insensitive key/value parameter store.
///
/// Parsing rules:
///
/// - pairs split on the **first** `=`; a pair without `=` has an empty value
/// - values are URL-decoded
/// - duplicate keys overwrite in place: the last value wins, the position
///   of the first occurrence is kept
/// - key lookup is ASCII case-insensitive (`pVersion` and `Pversion` are
///   the same parameter), but the original spelling is preserved for the
///   string-to-sign
///
/// # Example
///
/// ```
/// use arclink_core::ParameterStore;
///
/// let (command, params) = ParameterStore::parse("get&docId=4711&compId=data");
/// assert_eq!(command, "get");
/// assert_eq!(params.get("docid"), Some("4711"));
/// assert_eq!(params.get("compId"), Some("data"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterStore {
    params: Vec<(String, String)>,
}

impl ParameterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw query string.
    ///
    /// Returns the lower-cased command name (the token before the first
    /// `&`, cut at its own `=`) and the remaining parameters.
    #[must_use]
    pub fn parse(query: &str) -> (String, Self) {
        let mut pieces = query.split('&');
        let command = pieces
            .next()
            .unwrap_or_default()
            .split('=')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut store = Self::new();
        for piece in pieces {
            if piece.is_empty() {
                continue;
            }
            let (key, value) = match piece.split_once('=') {
                Some((k, v)) => (k, decode(v)),
                None => (piece, Cow::Borrowed("")),
            };
            store.set(key, value.as_ref());
        }
        (command, store)
    }

    /// Sets a parameter, overwriting in place when the key is already
    /// present (case-insensitive).
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(existing) = self
            .params
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            existing.1 = value.to_string();
        } else {
            self.params.push((key.to_string(), value.to_string()));
        }
    }

    /// Returns the value for a key (case-insensitive).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value for a key, treating an empty value as absent.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Returns `true` when the key is present (case-insensitive).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of stored parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` when no parameters are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates the parameters in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Builds the canonical string-to-sign.
    ///
    /// The result is `scheme://host` + `path` followed by `?` and the
    /// parameters in wire order as `key=value` joined by `&`. The
    /// [`SEC_KEY`] parameter is excluded unless `include_sec_key` is set.
    /// This exact string is the signed payload; signing and verification
    /// must produce identical bytes.
    #[must_use]
    pub fn string_to_sign(
        &self,
        scheme: &str,
        host: &str,
        path: &str,
        include_sec_key: bool,
    ) -> String {
        let mut out = format!("{scheme}://{host}{path}?");
        let mut first = true;
        for (key, value) in self.iter() {
            if !include_sec_key && key.eq_ignore_ascii_case(SEC_KEY) {
                continue;
            }
            if !first {
                out.push('&');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            first = false;
        }
        out
    }
}

/// URL-decodes a query value, leaving it untouched when malformed.
fn decode(value: &str) -> Cow<'_, str> {
    urlencoding::decode(value).unwrap_or(Cow::Borrowed(value))
}
