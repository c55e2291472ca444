//! Twisting the Hellmouth.

use super::query::{Query, Step::*};
use super::{anchored, SiteAdapter};
use crate::markup::remove_matching;
use tracing::debug;

pub fn adapter() -> Result<SiteAdapter, regex::Error> {
    Ok(SiteAdapter {
        name: "Twisting the Hellmouth",
        url_pattern: anchored(
            r"https?://(?:www\.)?tthfanfic\.org/(?:Story-\d+(?:-\d+)?(?:/.*)?|story\.php\?no=\d+)",
        )?,
        story_title: Query(&[Css("h2"), First, Text]),
        author_name: Query(&[Css("a[href*='/AuthorStories']"), First, Text]),
        chapter_entries: Query(&[Css("select#chapnav"), First, Css("option")]),
        selected_chapter: Query(&[
            Css("select#chapnav"),
            First,
            Css("option[selected]"),
            First,
            Text,
        ]),
        // The prose has no wrapper of its own; it follows a named anchor.
        content: Query(&[Css("a[name='storybody']"), First, Parent]),
        unwanted: &["h3"],
        chapter_url: None,
        categories: None,
        clean_content: Some(drop_storybody_anchor),
    })
}

fn drop_storybody_anchor(content: &str) -> Option<String> {
    match remove_matching(content, &["a[name='storybody']"]) {
        Ok(cleaned) => Some(cleaned),
        Err(e) => {
            debug!("could not drop storybody anchor: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use std::error::Error;

    #[test]
    fn content_region_is_parent_of_marker() -> Result<(), Box<dyn Error>> {
        let doc = Html::parse_document(
            r#"<h2>Slayer's Choice</h2><a href="/AuthorStories-55/Giles.htm">Giles</a>
            <div class="storybody"><a name="storybody"></a><h3>Chapter One</h3><p>Sunnydale.</p></div>"#,
        );
        let a = adapter()?;
        assert_eq!(a.story_title.text(&doc)?, "Slayer's Choice");
        assert_eq!(a.author_name.text(&doc)?, "Giles");
        assert!(a.chapter_entries.nodes(&doc)?.is_empty());
        let content = a.content.node(&doc)?;
        assert_eq!(content.value().attr("class"), Some("storybody"));
        Ok(())
    }

    #[test]
    fn clean_hook_drops_marker_anchor() {
        let out = drop_storybody_anchor(r#"<div><a name="storybody"></a><p>Text</p></div>"#);
        assert_eq!(out.as_deref(), Some("<div><p>Text</p></div>"));
    }
}
