use serde::{Deserialize, Serialize};

/// Application-specific data, a parameterized replaceable kind.
pub const APP_DATA_KIND: u32 = 30078;

/// `d` tag value addressing the admin hashtag whitelist.
pub const ADMIN_WHITELIST_IDENTIFIER: &str = "anmore/admin/hashtag-whitelist";

/// Signed record replicated by relays.
///
/// Signature verification happens in the relay layer; by the time an
/// assertion reaches this crate it is taken as authored by `pubkey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAssertion {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl AdminAssertion {
    /// First value of the first tag named `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }

    /// The `d` tag of a parameterized replaceable event.
    pub fn identifier(&self) -> Option<&str> {
        self.tag_value("d")
    }
}

/// Relay query/subscription filter (NIP-01 subset).
///
/// Empty lists match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(rename = "#d", default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

impl AssertionFilter {
    /// Filter for whitelist assertions authored by any of `authors`.
    pub fn admin_whitelist(authors: Vec<String>) -> Self {
        Self {
            authors,
            kinds: vec![APP_DATA_KIND],
            identifiers: vec![ADMIN_WHITELIST_IDENTIFIER.to_string()],
        }
    }

    pub fn matches(&self, event: &AdminAssertion) -> bool {
        (self.authors.is_empty() || self.authors.iter().any(|a| *a == event.pubkey))
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && (self.identifiers.is_empty()
                || event
                    .identifier()
                    .is_some_and(|d| self.identifiers.iter().any(|i| i == d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(pubkey: &str, kind: u32, d: Option<&str>) -> AdminAssertion {
        AdminAssertion {
            id: "id".to_string(),
            pubkey: pubkey.to_string(),
            created_at: 1,
            kind,
            tags: d
                .map(|d| vec![vec!["d".to_string(), d.to_string()]])
                .unwrap_or_default(),
            content: String::new(),
            sig: String::new(),
        }
    }

    #[test]
    fn test_tag_value() {
        let mut e = event("a", APP_DATA_KIND, Some("x"));
        e.tags.insert(0, vec!["t".to_string(), "nostr".to_string()]);
        e.tags.push(vec!["d".to_string(), "second".to_string()]);
        e.tags.push(vec!["empty".to_string()]);

        assert_eq!(e.identifier(), Some("x"));
        assert_eq!(e.tag_value("t"), Some("nostr"));
        assert_eq!(e.tag_value("empty"), None);
        assert_eq!(e.tag_value("missing"), None);
    }

    #[test]
    fn test_admin_whitelist_filter() {
        let filter = AssertionFilter::admin_whitelist(vec!["a".to_string()]);

        assert!(filter.matches(&event("a", APP_DATA_KIND, Some(ADMIN_WHITELIST_IDENTIFIER))));
        assert!(!filter.matches(&event("b", APP_DATA_KIND, Some(ADMIN_WHITELIST_IDENTIFIER))));
        assert!(!filter.matches(&event("a", 1, Some(ADMIN_WHITELIST_IDENTIFIER))));
        assert!(!filter.matches(&event("a", APP_DATA_KIND, Some("other"))));
        assert!(!filter.matches(&event("a", APP_DATA_KIND, None)));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(AssertionFilter::default().matches(&event("z", 7, None)));
    }

    #[test]
    fn test_filter_wire_format() {
        let filter = AssertionFilter::admin_whitelist(vec!["a".to_string()]);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "authors": ["a"],
                "kinds": [30078],
                "#d": [ADMIN_WHITELIST_IDENTIFIER],
            })
        );
    }
}
