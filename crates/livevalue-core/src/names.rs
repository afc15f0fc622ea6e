//! Broker vocabulary: namespaces, reserved predicates and name splitting
//!
//! Hubs and leaves are addressed by IRI-like names:
//!
//! ```text
//! <BASE>local/proxy/hub#<id>        hub
//! <BASE>local/proxy/leaf#<id>       scalar leaf
//! <BASE>local/proxy/array#<id>      array leaf
//! <BASE>instant / <BASE>datetime    reserved predicates
//! ```

/// Root namespace of the broker vocabulary
pub const NAME_BASE: &str = "http://bizar.aitc.jp/ns/fos/0.1/";
/// Namespace for locally minted names
pub const LOCAL_NAME_BASE: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/";
/// Namespace of tag labels used by path queries
pub const TAG_BASE: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/label#";
/// Predicate linking a structure node to its tag label
pub const TAG_PREDICATE: &str = "http://bizar.aitc.jp/ns/fos/0.1/tag";
/// Namespace for hub and leaf names
pub const PROXY_BASE: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/proxy/";
/// Prefix shared by every hub name
pub const HUB_PREFIX: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/proxy/hub#";
/// Prefix of scalar leaf names
pub const LEAF_PREFIX: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/proxy/leaf#";
/// Prefix of array leaf names
pub const ARRAY_PREFIX: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/proxy/array#";

/// Reserved predicate receiving the commit time as epoch milliseconds
pub const INSTANT_PREDICATE: &str = "http://bizar.aitc.jp/ns/fos/0.1/instant";
/// Reserved predicate receiving the commit time as an RFC 3339 string
pub const DATETIME_PREDICATE: &str = "http://bizar.aitc.jp/ns/fos/0.1/datetime";

/// Local id of the broker's own statistics hub
pub const SYSTEM_ID: &str = "_system";
/// Leaf name of the open push-connection counter
pub const CONNECTIONS_LEAF: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/proxy/leaf#_system_websocket";
/// Leaf name of the peak send-rate meter
pub const PEAK_SEND_RATE_LEAF: &str = "http://bizar.aitc.jp/ns/fos/0.1/local/proxy/leaf#_system_send";
/// Predicate of the open push-connection counter on the system hub
pub const CONNECTIONS_PREDICATE: &str = "http://bizar.aitc.jp/ns/fos/0.1/connections";
/// Predicate of the peak send-rate meter on the system hub
pub const PEAK_SEND_RATE_PREDICATE: &str = "http://bizar.aitc.jp/ns/fos/0.1/peak_send_rate";

/// Reserved vocabulary terms a hub fills in itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocab {
    Instant,
    Datetime,
}

impl Vocab {
    /// Label used as the key in formatted snapshots
    pub fn short_label(&self) -> &'static str {
        match self {
            Vocab::Instant => "instant",
            Vocab::Datetime => "datetime",
        }
    }

    /// Full predicate name
    pub fn predicate(&self) -> &'static str {
        match self {
            Vocab::Instant => INSTANT_PREDICATE,
            Vocab::Datetime => DATETIME_PREDICATE,
        }
    }

    /// Look up a reserved term by predicate name
    pub fn from_predicate(predicate: &str) -> Option<Self> {
        match predicate {
            INSTANT_PREDICATE => Some(Vocab::Instant),
            DATETIME_PREDICATE => Some(Vocab::Datetime),
            _ => None,
        }
    }
}

/// Kind of leaf encoded in a leaf name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Scalar,
    Array,
}

/// Full hub name for a local id
pub fn hub_name(id: &str) -> String {
    format!("{HUB_PREFIX}{id}")
}

/// Local id of a hub name, if the name lies in the hub namespace
///
/// The id doubles as the hub's history file name, so ids that are empty or
/// contain `/`, `\`, `..` or NUL are rejected.
pub fn hub_local_id(name: &str) -> Option<&str> {
    name.strip_prefix(HUB_PREFIX).filter(|id| is_valid_hub_id(id))
}

fn is_valid_hub_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\', '\0']) && !id.contains("..")
}

/// Id a hub is known by: its local id, or the trailing segment of a name
/// outside the hub namespace
pub fn hub_id(name: &str) -> &str {
    hub_local_id(name).unwrap_or_else(|| local_name(name))
}

/// Classify a leaf name as scalar or array
pub fn leaf_kind(name: &str) -> Option<LeafKind> {
    if name
        .strip_prefix(LEAF_PREFIX)
        .is_some_and(|id| !id.is_empty())
    {
        Some(LeafKind::Scalar)
    } else if name
        .strip_prefix(ARRAY_PREFIX)
        .is_some_and(|id| !id.is_empty())
    {
        Some(LeafKind::Array)
    } else {
        None
    }
}

/// Trailing segment of a name: everything after the last `#`, `|` or `/`
///
/// The segment is never empty; a name ending in a separator keeps that
/// separator in its trailing segment. Names without a usable separator are
/// returned whole.
pub fn local_name(name: &str) -> &str {
    let Some((last_start, _)) = name.char_indices().last() else {
        return name;
    };
    match name[..last_start].rfind(['#', '|', '/']) {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://x/a/temp"), "temp");
        assert_eq!(local_name("http://x/a#temp"), "temp");
        assert_eq!(local_name("a|b"), "b");
        assert_eq!(local_name("plain"), "plain");
        assert_eq!(local_name("http://x/a/"), "a/");
        assert_eq!(local_name(""), "");
    }

    #[test]
    fn test_hub_names() {
        let name = hub_name("room1");
        assert_eq!(hub_local_id(&name), Some("room1"));
        assert_eq!(hub_local_id(HUB_PREFIX), None);
        assert_eq!(hub_local_id("http://elsewhere/hub#x"), None);
    }

    #[test]
    fn test_hub_local_id_rejects_path_like_ids() {
        for id in ["../escaped", "a/b", "..", "a..b", r"a\b", "a\0b", "/abs"] {
            assert_eq!(hub_local_id(&hub_name(id)), None, "{id:?}");
        }
        assert_eq!(hub_local_id(&hub_name(".hidden")), Some(".hidden"));
        assert_eq!(hub_local_id(&hub_name("部屋")), Some("部屋"));
    }

    #[test]
    fn test_hub_id_keeps_separators_inside_the_local_id() {
        assert_eq!(hub_id(&hub_name("a#b")), "a#b");
        assert_eq!(hub_id(&hub_name("a|b")), "a|b");
        assert_eq!(hub_id("http://example.org/elsewhere#x"), "x");
        assert_eq!(hub_id(&hub_name("a/b")), "b");
    }

    #[test]
    fn test_leaf_kind() {
        assert_eq!(leaf_kind(&format!("{LEAF_PREFIX}t1")), Some(LeafKind::Scalar));
        assert_eq!(leaf_kind(&format!("{ARRAY_PREFIX}t1")), Some(LeafKind::Array));
        assert_eq!(leaf_kind(LEAF_PREFIX), None);
        assert_eq!(leaf_kind(&hub_name("x")), None);
    }

    #[test]
    fn test_vocab() {
        assert_eq!(Vocab::from_predicate(INSTANT_PREDICATE), Some(Vocab::Instant));
        assert_eq!(Vocab::from_predicate(DATETIME_PREDICATE), Some(Vocab::Datetime));
        assert_eq!(Vocab::from_predicate(CONNECTIONS_PREDICATE), None);
        assert_eq!(Vocab::Instant.short_label(), "instant");
    }
}
