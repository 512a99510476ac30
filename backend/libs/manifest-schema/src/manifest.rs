use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use targeting_core::{Rule, RuleKind};

/// A domain's page manifest as published to the CDN.
///
/// Current documents are objects keyed by path hash with the reserved
/// `_legacy`, `_targeting` and `_nextPageTargeting` members. Domains
/// published before the indexed format exist as a flat array of path hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageManifest {
    Indexed(IndexedManifest),
    LegacyList(Vec<String>),
}

/// Indexed manifest body. Unreserved keys are path hashes mapping to the
/// content reference that page should load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexedManifest {
    #[serde(rename = "_legacy", default, skip_serializing_if = "Vec::is_empty")]
    pub legacy: Vec<String>,

    #[serde(rename = "_targeting", default, skip_serializing_if = "Vec::is_empty")]
    pub targeting: Vec<FeedRule>,

    #[serde(
        rename = "_nextPageTargeting",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub next_page_targeting: Vec<NextPageRule>,

    #[serde(flatten)]
    pub entries: BTreeMap<String, String>,
}

impl IndexedManifest {
    /// Content reference for an exact path-hash hit.
    pub fn content_ref(&self, path_hash: &str) -> Option<&str> {
        self.entries.get(path_hash).map(String::as_str)
    }

    pub fn legacy_contains(&self, path_hash: &str) -> bool {
        self.legacy.iter().any(|h| h == path_hash)
    }

    /// Stand-in reference used for legacy-list hits: the first mapped search
    /// feed in the manifest.
    pub fn first_search_ref(&self) -> Option<&str> {
        self.entries
            .values()
            .map(String::as_str)
            .find(|content_ref| content_ref.starts_with("searches/"))
    }
}

/// Feed targeting rule embedded in a manifest. Matching pages load the
/// search feed named by `search_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRule {
    pub kind: RuleKind,
    pub value: String,
    pub search_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<String>,
}

impl Rule for FeedRule {
    fn kind(&self) -> RuleKind {
        self.kind
    }

    fn value(&self) -> &str {
        &self.value
    }
}

/// Next-page targeting rule embedded in a manifest. Matching pages augment
/// the widget with the section manifest at `manifest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPageRule {
    pub kind: RuleKind,
    pub value: String,
    pub section: String,
    pub manifest: String,
    pub priority: i32,
}

impl Rule for NextPageRule {
    fn kind(&self) -> RuleKind {
        self.kind
    }

    fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_manifest_round_trip() {
        let json = r#"{
            "abc123": "searches/99/results.json",
            "def456": "searches/12/results.json",
            "_legacy": ["0ld"],
            "_targeting": [
                {"kind": "path_substring", "value": "/sports/", "searchId": "S1", "phrase": "best sneakers"}
            ],
            "_nextPageTargeting": [
                {"kind": "ld_json", "value": "Sports", "section": "nba", "manifest": "example.com/next-page/nba/manifest.json", "priority": 0}
            ]
        }"#;

        let manifest: PageManifest = serde_json::from_str(json).unwrap();
        let indexed = match manifest {
            PageManifest::Indexed(m) => m,
            PageManifest::LegacyList(_) => panic!("expected indexed manifest"),
        };

        assert_eq!(indexed.content_ref("abc123"), Some("searches/99/results.json"));
        assert_eq!(indexed.content_ref("missing"), None);
        assert!(indexed.legacy_contains("0ld"));
        assert_eq!(indexed.targeting.len(), 1);
        assert_eq!(indexed.targeting[0].search_id, "S1");
        assert_eq!(indexed.next_page_targeting[0].section, "nba");
    }

    #[test]
    fn test_flat_array_parses_as_legacy_list() {
        let manifest: PageManifest = serde_json::from_str(r#"["aaa", "bbb"]"#).unwrap();
        match manifest {
            PageManifest::LegacyList(hashes) => assert_eq!(hashes, vec!["aaa", "bbb"]),
            PageManifest::Indexed(_) => panic!("expected legacy list"),
        }
    }

    #[test]
    fn test_reserved_members_default_to_empty() {
        let manifest: PageManifest =
            serde_json::from_str(r#"{"abc": "searches/1/results.json"}"#).unwrap();
        let indexed = match manifest {
            PageManifest::Indexed(m) => m,
            PageManifest::LegacyList(_) => panic!("expected indexed manifest"),
        };
        assert!(indexed.legacy.is_empty());
        assert!(indexed.targeting.is_empty());
        assert!(indexed.next_page_targeting.is_empty());
    }

    #[test]
    fn test_first_search_ref_skips_non_search_entries() {
        let mut indexed = IndexedManifest::default();
        indexed
            .entries
            .insert("a".to_string(), "pages/a/index.json".to_string());
        indexed
            .entries
            .insert("b".to_string(), "searches/7/results.json".to_string());
        assert_eq!(indexed.first_search_ref(), Some("searches/7/results.json"));
    }

    #[test]
    fn test_first_search_ref_empty_manifest() {
        assert_eq!(IndexedManifest::default().first_search_ref(), None);
    }

    #[test]
    fn test_serialized_rules_use_camel_case() {
        let rule = FeedRule {
            kind: RuleKind::KeywordSubstring,
            value: "sneaker".to_string(),
            search_id: "S9".to_string(),
            phrase: None,
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["kind"], "keyword_substring");
        assert_eq!(json["searchId"], "S9");
        assert!(json.get("phrase").is_none());
    }
}
