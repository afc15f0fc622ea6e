//! Request parameters
//!
//! Parameters keep every value given for a key, in arrival order. Keys
//! starting with `-` are control parameters (`-history`, `-latest`,
//! `-propertyns`, `-link`, `-query`); all other keys are value assignments.

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

/// Prefix marking a control parameter
pub const ESCAPE_PREFIX: char = '-';

pub const HISTORY: &str = "-history";
pub const LATEST: &str = "-latest";
pub const PROPERTY_NS: &str = "-propertyns";
pub const LINK: &str = "-link";
pub const QUERY: &str = "-query";

/// Whether `key` names a control parameter rather than a value
pub fn is_escape(key: &str) -> bool {
    key.starts_with(ESCAPE_PREFIX)
}

/// Multi-valued request parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: IndexMap<String, Vec<String>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string
    ///
    /// `+` decodes to a space. Pairs without `=` get an empty value.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.push(decode_component(key), decode_component(value));
        }
        params
    }

    /// Append a value for `key`
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// All values given for `key`
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// First value given for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
