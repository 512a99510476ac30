use regex::Regex;
use tracing::warn;

use crate::context::PageContext;
use crate::rule::RuleKind;

/// Anything the engine can evaluate: a predicate kind plus its value.
///
/// Both rule tables (feed targeting and next-page targeting) implement this,
/// so one engine serves both and the predicate definitions cannot drift.
pub trait Rule {
    fn kind(&self) -> RuleKind;
    fn value(&self) -> &str;
}

/// Returns the first rule in stored order whose predicate matches the page.
///
/// Stored order is creation order. A rule's specificity is never consulted
/// here. No match returns `None`.
pub fn first_match<'a, R: Rule>(rules: &'a [R], ctx: &PageContext) -> Option<&'a R> {
    rules.iter().find(|rule| evaluate(rule.kind(), rule.value(), ctx))
}

/// Evaluates a single predicate against the page context.
///
/// An invalid `url_pattern` regex logs a warning and evaluates false, so a
/// bad rule can never take down resolution.
pub fn evaluate(kind: RuleKind, value: &str, ctx: &PageContext) -> bool {
    match kind {
        RuleKind::PathSubstring => ctx.pathname().contains(value),
        RuleKind::UrlPattern => match Regex::new(value) {
            Ok(pattern) => pattern.is_match(ctx.full_url()),
            Err(error) => {
                warn!(pattern = value, %error, "skipping rule with invalid url_pattern");
                false
            }
        },
        RuleKind::LdJson => match ctx.structured_data_section() {
            Some(section) => section.to_lowercase().contains(&value.to_lowercase()),
            None => false,
        },
        RuleKind::KeywordSubstring => {
            let needle = value.to_lowercase();
            ctx.keywords()
                .iter()
                .any(|keyword| keyword.to_lowercase().contains(&needle))
        }
    }
}
