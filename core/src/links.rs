//! Hypermedia links and the rules for picking one.
//!
//! # Design
//! Resource transitions are matched loosely: a link qualifies for an
//! operation when its `rel` contains one of the operation's candidate
//! substrings, case-insensitively, and candidates are tried in order. The
//! candidate lists live in [`LinkIntent`] so every service resolves links the
//! same way. Pagination transitions (`next`, `previous`) are matched exactly.

use serde::{Deserialize, Serialize};

/// A server-offered transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    pub method: String,
}

impl Link {
    pub fn new(href: impl Into<String>, rel: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            method: method.into(),
        }
    }

    /// `rel` contains `needle`, ignoring case.
    pub fn rel_contains(&self, needle: &str) -> bool {
        self.rel.to_lowercase().contains(&needle.to_lowercase())
    }

    /// `rel` equals `name`, ignoring case.
    pub fn rel_is(&self, name: &str) -> bool {
        self.rel.to_lowercase() == name.to_lowercase()
    }
}

/// A single entity plus the links valid for this snapshot of it.
///
/// Links are only authoritative for the `data` they arrived with; after a
/// mutation the envelope must be fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEnvelope<T> {
    pub data: T,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl<T> ResourceEnvelope<T> {
    pub fn resolve(&self, intent: LinkIntent) -> Option<&Link> {
        intent.resolve(&self.links)
    }
}

/// Operations that look up a link on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkIntent {
    Update,
    Read,
    Delete,
}

impl LinkIntent {
    /// Candidate `rel` substrings, highest priority first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            // Submitting an update through a `self` link is kept for servers
            // that only advertise `self`.
            LinkIntent::Update => &["update", "self"],
            LinkIntent::Read => &["self"],
            LinkIntent::Delete => &["delete"],
        }
    }

    pub fn resolve(self, links: &[Link]) -> Option<&Link> {
        self.candidates()
            .iter()
            .find_map(|needle| find_containing(links, needle))
    }
}

/// First link whose `rel` contains `needle`, ignoring case.
pub fn find_containing<'a>(links: &'a [Link], needle: &str) -> Option<&'a Link> {
    links.iter().find(|link| link.rel_contains(needle))
}

/// First link whose `rel` is exactly `name`, ignoring case.
pub fn find_exact<'a>(links: &'a [Link], name: &str) -> Option<&'a Link> {
    links.iter().find(|link| link.rel_is(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(rels: &[&str]) -> Vec<Link> {
        rels.iter()
            .map(|rel| Link::new(format!("http://api/{rel}"), *rel, "GET"))
            .collect()
    }

    #[test]
    fn update_prefers_update_over_self() {
        let links = links(&["self", "Update-Person"]);
        assert_eq!(LinkIntent::Update.resolve(&links).unwrap().rel, "Update-Person");
    }

    #[test]
    fn update_falls_back_to_self_substring() {
        let links = links(&["delete-person", "self-link"]);
        assert_eq!(LinkIntent::Update.resolve(&links).unwrap().rel, "self-link");
    }

    #[test]
    fn update_without_candidates_resolves_nothing() {
        assert!(LinkIntent::Update.resolve(&links(&["delete"])).is_none());
        assert!(LinkIntent::Update.resolve(&[]).is_none());
    }

    #[test]
    fn delete_matches_substring() {
        let links = links(&["self", "DELETE_person"]);
        assert_eq!(LinkIntent::Delete.resolve(&links).unwrap().rel, "DELETE_person");
    }

    #[test]
    fn first_match_wins_within_a_candidate() {
        let links = links(&["update-a", "update-b"]);
        assert_eq!(LinkIntent::Update.resolve(&links).unwrap().rel, "update-a");
    }

    #[test]
    fn exact_match_does_not_accept_substrings() {
        let links = links(&["next-page", "Next"]);
        assert_eq!(find_exact(&links, "next").unwrap().rel, "Next");
        assert!(find_exact(&links, "previous").is_none());
    }

    #[test]
    fn envelope_without_links_deserializes() {
        let env: ResourceEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"data":{"id":1}}"#).unwrap();
        assert!(env.links.is_empty());
        assert!(env.resolve(LinkIntent::Read).is_none());
    }
}
