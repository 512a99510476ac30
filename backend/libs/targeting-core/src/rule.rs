use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The predicate variants a targeting rule can carry.
///
/// Wire and database representations use the snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Pathname contains the rule value (query string ignored).
    PathSubstring,
    /// Rule value compiled as a regex and tested against the full URL.
    UrlPattern,
    /// Case-insensitive substring match against the page's structured-data
    /// section field.
    LdJson,
    /// Case-insensitive substring match against any page keyword.
    KeywordSubstring,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::PathSubstring => "path_substring",
            RuleKind::UrlPattern => "url_pattern",
            RuleKind::LdJson => "ld_json",
            RuleKind::KeywordSubstring => "keyword_substring",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRuleKind(pub String);

impl fmt::Display for UnknownRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rule kind: {}", self.0)
    }
}

impl std::error::Error for UnknownRuleKind {}

impl FromStr for RuleKind {
    type Err = UnknownRuleKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path_substring" => Ok(RuleKind::PathSubstring),
            "url_pattern" => Ok(RuleKind::UrlPattern),
            "ld_json" => Ok(RuleKind::LdJson),
            "keyword_substring" => Ok(RuleKind::KeywordSubstring),
            other => Err(UnknownRuleKind(other.to_string())),
        }
    }
}

/// Specificity assigned to a rule at creation time.
///
/// Stored alongside the rule for operator display. Match evaluation never
/// consults it: rules fire in creation order (see `engine::first_match`).
pub fn specificity(kind: RuleKind, value: &str) -> i32 {
    match kind {
        RuleKind::PathSubstring => value.split('/').filter(|seg| !seg.is_empty()).count() as i32,
        RuleKind::LdJson => 0,
        RuleKind::UrlPattern => {
            let slashes = value.matches('/').count() as i32;
            slashes.max(1)
        }
        RuleKind::KeywordSubstring => 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            RuleKind::PathSubstring,
            RuleKind::UrlPattern,
            RuleKind::LdJson,
            RuleKind::KeywordSubstring,
        ] {
            assert_eq!(kind.as_str().parse::<RuleKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!("geo_fence".parse::<RuleKind>().is_err());
    }

    #[test]
    fn test_path_substring_specificity_counts_segments() {
        assert_eq!(specificity(RuleKind::PathSubstring, "/sports/"), 1);
        assert_eq!(specificity(RuleKind::PathSubstring, "/sports/nba/finals"), 3);
        assert_eq!(specificity(RuleKind::PathSubstring, "recipes"), 1);
    }

    #[test]
    fn test_url_pattern_specificity_has_floor_of_one() {
        assert_eq!(specificity(RuleKind::UrlPattern, "news-[0-9]+"), 1);
        assert_eq!(specificity(RuleKind::UrlPattern, "/a/b/.*"), 3);
    }

    #[test]
    fn test_fixed_specificities() {
        assert_eq!(specificity(RuleKind::LdJson, "Sports"), 0);
        assert_eq!(specificity(RuleKind::KeywordSubstring, "basketball"), 10);
    }
}
