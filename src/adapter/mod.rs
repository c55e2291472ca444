//! Site adapters. Each supported site is a [SiteAdapter] descriptor: selectors and rules as data,
//! plus optional strategy functions for the few things that need code.

pub mod ficwad;
pub mod ffnet;
pub mod query;
pub mod registry;
pub mod tth;

pub use query::{OptionalMatch, Query, QueryError, Step};
pub use registry::AdapterRegistry;

use regex::Regex;
use url::Url;

/// Derive an absolute chapter URL from a navigation entry's raw value and the current page URL.
pub type ChapterUrlRule = fn(raw: &str, page_url: &Url) -> Option<Url>;

/// Rewrite the extracted content fragment. Returning `None` keeps the fragment unchanged.
pub type CleanHook = fn(content: &str) -> Option<String>;

/// Navigation labels that never name a chapter (compared case-insensitively after trimming).
pub const NOT_CHAPTERS: &[&str] = &["story index", "table of contents"];

/// How to find story and chapter data in one site's markup.
#[derive(Debug, Clone)]
pub struct SiteAdapter {
    /// Human-readable site name; also recorded as the story's publisher.
    pub name: &'static str,
    /// Anchored pattern a URL must match for this adapter to handle it.
    pub url_pattern: Regex,
    pub story_title: Query,
    pub author_name: Query,
    /// Entries of the chapter navigation control. May match nothing (single-chapter stories).
    pub chapter_entries: Query,
    /// Label of the currently selected navigation entry.
    pub selected_chapter: Query,
    pub content: Query,
    /// Removed from the content region, along with their content.
    pub unwanted: &'static [&'static str],
    /// Chapter URL derivation. Default: resolve the raw value against the page URL.
    pub chapter_url: Option<ChapterUrlRule>,
    /// Category/fandom tags. Default: none.
    pub categories: Option<Query>,
    pub clean_content: Option<CleanHook>,
}

impl SiteAdapter {
    pub fn handles(&self, url: &str) -> bool {
        self.url_pattern.is_match(url)
    }

    /// Absolute chapter URL for a navigation entry's raw value.
    pub fn resolve_chapter_url(&self, raw: &str, page_url: &Url) -> Option<Url> {
        match self.chapter_url {
            Some(rule) => rule(raw, page_url),
            None => page_url.join(raw.trim()).ok(),
        }
    }
}

pub(crate) fn is_not_chapter(label: &str) -> bool {
    let label = label.trim();
    NOT_CHAPTERS.iter().any(|n| label.eq_ignore_ascii_case(n))
}

/// Anchored regex from a pattern body.
pub(crate) fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_chapter_labels_ignore_case_and_padding() {
        assert!(is_not_chapter("Story Index"));
        assert!(is_not_chapter("  TABLE OF CONTENTS "));
        assert!(!is_not_chapter("1. Intro"));
    }

    #[test]
    fn default_chapter_url_resolves_relative_value() -> Result<(), Box<dyn std::error::Error>> {
        let adapter = ficwad::adapter()?;
        let page = Url::parse("https://ficwad.com/story/100")?;
        let url = adapter.resolve_chapter_url("/story/101", &page);
        assert_eq!(url.map(String::from).as_deref(), Some("https://ficwad.com/story/101"));
        Ok(())
    }

    #[test]
    fn anchored_rejects_partial_matches() -> Result<(), regex::Error> {
        let re = anchored(r"https?://example\.com/\d+")?;
        assert!(re.is_match("https://example.com/12"));
        assert!(!re.is_match("xhttps://example.com/12"));
        assert!(!re.is_match("https://example.com/12/extra"));
        Ok(())
    }
}
