//! FicWad.

use super::query::{Query, Step::*};
use super::{anchored, SiteAdapter};

pub fn adapter() -> Result<SiteAdapter, regex::Error> {
    Ok(SiteAdapter {
        name: "FicWad",
        url_pattern: anchored(r"https?://(?:www\.)?ficwad\.com/story/\d+")?,
        // The heading holds a breadcrumb; the story title is its last element.
        story_title: Query(&[Css("h3"), First, Children, Last, Text]),
        author_name: Query(&[Css("a[href*='/author/']"), First, Text]),
        chapter_entries: Query(&[Css("select[name='goto']"), First, Css("option")]),
        selected_chapter: Query(&[
            Css("select[name='goto']"),
            First,
            Css("option[selected]"),
            First,
            Text,
        ]),
        content: Query(&[Css("#storytext"), First]),
        unwanted: &[],
        chapter_url: None,
        categories: None,
        clean_content: None,
    })
}
