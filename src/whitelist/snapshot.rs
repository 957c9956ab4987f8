use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::nostr::{AdminAssertion, RelayError};
use crate::store::StoreError;

/// JSON field in an admin assertion's content carrying the tag array.
pub const WHITELIST_CONTENT_FIELD: &str = "hashtagWhitelist";

/// Whitelist resolution errors. None of these reach consumers; they decide
/// which fallback applies and get logged.
#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("Whitelist content is malformed: {0}")]
    ContentMalformed(String),

    #[error("Admin assertions unavailable: {0}")]
    NetworkUnavailable(#[from] RelayError),

    #[error("Whitelist cache error: {0}")]
    Store(#[from] StoreError),
}

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotOrigin {
    Local,
    Static,
    Network,
}

impl SnapshotOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Static => "static",
            Self::Network => "network",
        }
    }
}

/// An immutable moderation whitelist.
///
/// An empty tag set means "no restriction": every tag is permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistSnapshot {
    tags: BTreeSet<String>,
    origin_timestamp: Option<i64>,
    origin: SnapshotOrigin,
}

impl WhitelistSnapshot {
    /// Build from raw tags, normalizing each one and dropping blanks.
    pub fn new<I, S>(tags: I, origin: SnapshotOrigin, origin_timestamp: Option<i64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .filter_map(|t| normalize_tag(t.as_ref()))
                .collect(),
            origin_timestamp,
            origin,
        }
    }

    /// The allow-all snapshot.
    pub fn allow_all(origin: SnapshotOrigin) -> Self {
        Self::new(std::iter::empty::<&str>(), origin, None)
    }

    /// Parse the content of an admin assertion.
    ///
    /// `Ok(None)` when the content is valid JSON but carries no tag array;
    /// `Err(ContentMalformed)` when it is not JSON or the array holds non-strings.
    pub fn from_assertion(assertion: &AdminAssertion) -> Result<Option<Self>, WhitelistError> {
        let content: Value = serde_json::from_str(&assertion.content)
            .map_err(|e| WhitelistError::ContentMalformed(e.to_string()))?;

        let Some(Value::Array(entries)) = content.get(WHITELIST_CONTENT_FIELD) else {
            return Ok(None);
        };

        let tags = entries
            .iter()
            .map(|entry| {
                entry.as_str().ok_or_else(|| {
                    WhitelistError::ContentMalformed(format!("non-string entry: {}", entry))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Self::new(
            tags,
            SnapshotOrigin::Network,
            Some(assertion.created_at),
        )))
    }

    /// Whether `tag` may be shown. Always true for an empty snapshot.
    pub fn is_permitted(&self, tag: &str) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        normalize_tag(tag).is_some_and(|t| self.tags.contains(&t))
    }

    /// Keep only the permitted tags of a post, preserving order.
    pub fn filter_tags<'a, I>(&self, tags: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tags.into_iter().filter(|t| self.is_permitted(t)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn origin_timestamp(&self) -> Option<i64> {
        self.origin_timestamp
    }
}

/// Lowercase, trim and strip one leading `#`. Blank tags normalize to `None`.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    let tag = tag.strip_prefix('#').unwrap_or(tag).trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_lowercase())
    }
}

/// Render the assertion content an admin publishes for `tags`.
pub fn whitelist_content<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let normalized: BTreeSet<String> = tags
        .into_iter()
        .filter_map(|t| normalize_tag(t.as_ref()))
        .collect();

    let mut content = serde_json::Map::new();
    content.insert(
        WHITELIST_CONTENT_FIELD.to_string(),
        Value::from(normalized.into_iter().collect::<Vec<_>>()),
    );
    Value::Object(content).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nostr::{ADMIN_WHITELIST_IDENTIFIER, APP_DATA_KIND};
    use proptest::prelude::*;

    fn assertion_with(content: &str) -> AdminAssertion {
        AdminAssertion {
            id: "e1".to_string(),
            pubkey: "admin".to_string(),
            created_at: 100,
            kind: APP_DATA_KIND,
            tags: vec![vec!["d".to_string(), ADMIN_WHITELIST_IDENTIFIER.to_string()]],
            content: content.to_string(),
            sig: String::new(),
        }
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("#Nostr"), Some("nostr".to_string()));
        assert_eq!(normalize_tag("  BitCoin "), Some("bitcoin".to_string()));
        assert_eq!(normalize_tag("##double"), Some("#double".to_string()));
        assert_eq!(normalize_tag("#"), None);
        assert_eq!(normalize_tag("   "), None);
    }

    #[test]
    fn test_non_empty_snapshot_is_case_insensitive_membership() {
        let snapshot = WhitelistSnapshot::new(["Nostr", "#bitcoin"], SnapshotOrigin::Static, None);

        assert_eq!(snapshot.to_vec(), vec!["bitcoin", "nostr"]);
        assert!(snapshot.is_permitted("NOSTR"));
        assert!(snapshot.is_permitted("#Bitcoin"));
        assert!(!snapshot.is_permitted("foo"));
        assert!(!snapshot.is_permitted(""));
    }

    #[test]
    fn test_filter_tags() {
        let snapshot = WhitelistSnapshot::new(["nostr"], SnapshotOrigin::Local, None);
        assert_eq!(snapshot.filter_tags(["foo", "Nostr", "bar"]), vec!["Nostr"]);

        let open = WhitelistSnapshot::allow_all(SnapshotOrigin::Local);
        assert_eq!(open.filter_tags(["foo", "bar"]), vec!["foo", "bar"]);
    }

    #[test]
    fn test_from_assertion() {
        let snapshot = WhitelistSnapshot::from_assertion(&assertion_with(
            r##"{"hashtagWhitelist":["Nostr","#bitcoin"]}"##,
        ))
        .unwrap()
        .unwrap();

        assert_eq!(snapshot.to_vec(), vec!["bitcoin", "nostr"]);
        assert_eq!(snapshot.origin(), SnapshotOrigin::Network);
        assert_eq!(snapshot.origin_timestamp(), Some(100));
    }

    #[test]
    fn test_from_assertion_without_tag_array() {
        for content in [r#"{}"#, r#"{"hashtagWhitelist":"nostr"}"#, r#"[]"#] {
            let parsed = WhitelistSnapshot::from_assertion(&assertion_with(content)).unwrap();
            assert!(parsed.is_none(), "{}", content);
        }
    }

    #[test]
    fn test_from_assertion_malformed() {
        for content in ["not json", r#"{"hashtagWhitelist":["ok", 3]}"#] {
            let parsed = WhitelistSnapshot::from_assertion(&assertion_with(content));
            assert!(
                matches!(parsed, Err(WhitelistError::ContentMalformed(_))),
                "{}",
                content
            );
        }
    }

    #[test]
    fn test_whitelist_content_parses_back() {
        let content = whitelist_content(["#Nostr", "bitcoin", ""]);
        assert_eq!(content, r#"{"hashtagWhitelist":["bitcoin","nostr"]}"#);

        let snapshot = WhitelistSnapshot::from_assertion(&assertion_with(&content))
            .unwrap()
            .unwrap();
        assert!(snapshot.is_permitted("nostr"));
    }

    proptest! {
        #[test]
        fn prop_empty_snapshot_permits_everything(tag in ".*") {
            let snapshot = WhitelistSnapshot::allow_all(SnapshotOrigin::Network);
            prop_assert!(snapshot.is_permitted(&tag));
        }

        #[test]
        fn prop_membership_ignores_case(tag in "[a-z][a-z0-9]{0,15}") {
            let snapshot = WhitelistSnapshot::new([tag.as_str()], SnapshotOrigin::Static, None);
            let upper = tag.to_uppercase();
            let hashed = format!("#{}", upper);
            prop_assert!(snapshot.is_permitted(&upper));
            prop_assert!(snapshot.is_permitted(&hashed));
        }
    }
}
