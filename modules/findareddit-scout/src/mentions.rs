//! Subreddit mention extraction from free text.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// `r/name` or `/r/name`. The name class is greedy, so a match always ends at
/// a non-name character or the end of input.
static RE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/?r/([A-Za-z0-9_]+)").expect("valid mention regex"));

/// Distinct lowercase subreddit names mentioned in `text`.
pub fn extract_mentions(text: &str) -> BTreeSet<String> {
    RE_MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}
