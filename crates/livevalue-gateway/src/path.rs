//! Tag paths and the graph collaborator that resolves them
//!
//! A tag path names hubs by walking labelled structure nodes:
//!
//! ```text
//! /building/floor-3/room/temp
//!  ^root     ^link-tag ^tag ^leaf tag
//! ```
//!
//! Every segment but the last is a tag on a structure node. From the second
//! segment on, a segment of the form `link-tag` also names the relation from
//! the previous node (`*` for any relation); a plain segment uses the default
//! relation from `-link`, or any relation when none is given. The last
//! segment is the predicate tag linking the final node to its hub.

use crate::{Error, Result};
use livevalue_core::names;
use std::fmt::Write;

/// Wildcard relation
pub const LINK_ANY: &str = "*";

/// Relation between two consecutive structure nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Any,
    /// Local name of the relation, resolved against the property namespace
    Named(String),
}

impl Link {
    fn from_label(label: &str) -> Self {
        if label == LINK_ANY {
            Link::Any
        } else {
            Link::Named(label.to_string())
        }
    }
}

/// One structure node of a path, with the relation leading to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagStep {
    pub link: Link,
    pub tag: String,
}

/// A parsed tag path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPath {
    /// Structure nodes; the first step's link is [`Link::Any`] and unused
    steps: Vec<TagStep>,
    leaf_tag: String,
}

impl TagPath {
    /// Parse path segments, using `default_link` for segments without one
    ///
    /// Segments and the default link must not contain whitespace, control
    /// characters or any of `` <>"{}|^`\ ``.
    pub fn parse<S: AsRef<str>>(segments: &[S], default_link: Option<&str>) -> Result<Self> {
        let Some((leaf_tag, nodes)) = segments.split_last() else {
            return Err(Error::NoPathSpecified);
        };
        for segment in segments {
            check_label(segment.as_ref())?;
        }
        if let Some(label) = default_link {
            check_label(label)?;
        }
        let default = match default_link {
            Some(label) => Link::from_label(label),
            None => Link::Any,
        };

        let steps = nodes
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let segment = segment.as_ref();
                match segment.rsplit_once('-') {
                    Some((link, tag)) if i > 0 && !link.is_empty() && !tag.is_empty() => TagStep {
                        link: Link::from_label(link),
                        tag: tag.to_string(),
                    },
                    _ => TagStep {
                        link: if i == 0 { Link::Any } else { default.clone() },
                        tag: segment.to_string(),
                    },
                }
            })
            .collect();

        Ok(Self {
            steps,
            leaf_tag: leaf_tag.as_ref().to_string(),
        })
    }

    pub fn steps(&self) -> &[TagStep] {
        &self.steps
    }

    pub fn leaf_tag(&self) -> &str {
        &self.leaf_tag
    }

    /// SPARQL selecting the names of matching hubs as `?hub`
    ///
    /// Structure tags live in the tag namespace; relations and the leaf tag
    /// are resolved against `property_ns`.
    pub fn select_query(&self, property_ns: &str) -> String {
        let mut query = String::from("SELECT ?hub\nWHERE {\n");
        let mut any = 0;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                let link = match &step.link {
                    Link::Any => {
                        any += 1;
                        format!("?t{}", any - 1)
                    }
                    Link::Named(label) => format!("<{property_ns}{label}>"),
                };
                let _ = writeln!(query, "      ?s{} {} ?s{} .", i - 1, link, i);
            }
            let _ = writeln!(
                query,
                "      ?s{} <{}> <{}{}> .",
                i,
                names::TAG_PREDICATE,
                names::TAG_BASE,
                step.tag
            );
        }
        let last = self.steps.len().saturating_sub(1);
        let _ = writeln!(query, "      ?s{} <{}{}> ?hub .", last, property_ns, self.leaf_tag);
        query.push_str("}\n");
        query
    }
}

/// Whether `text` can be placed inside `<...>` without ending or splitting the IRI
pub(crate) fn is_iri_safe(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "<>\"{}|^`\\".contains(c))
}

fn check_label(label: &str) -> Result<()> {
    if is_iri_safe(label) {
        Ok(())
    } else {
        Err(Error::IllegalTag(label.to_string()))
    }
}

/// Graph-store collaborator resolving structural lookups to hub names
pub trait PathResolver {
    /// Names of the hubs reached by `path` in `dataset`
    fn resolve_path(&self, dataset: &str, path: &TagPath, property_ns: &str) -> Vec<String>;

    /// Result rows of `query` in `dataset`, each row's bound values in column order
    fn resolve_query(&self, dataset: &str, query: &str) -> Vec<Vec<String>>;
}

/// Resolver for deployments without a graph store: resolves nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl PathResolver for NoResolver {
    fn resolve_path(&self, _dataset: &str, _path: &TagPath, _property_ns: &str) -> Vec<String> {
        Vec::new()
    }

    fn resolve_query(&self, _dataset: &str, _query: &str) -> Vec<Vec<String>> {
        Vec::new()
    }
}
