//! FanFiction.net, live and as pages mirrored to disk with wget (`story.0003.html`).

use super::query::{Query, Step::*};
use super::{anchored, SiteAdapter};
use url::Url;

pub fn adapter() -> Result<SiteAdapter, regex::Error> {
    Ok(SiteAdapter {
        name: "FanFiction.net",
        url_pattern: anchored(
            r"https?://(?:www\.|m\.)?fanfiction\.net/s/\d+/\d+(?:/.*)?",
        )?,
        story_title: Query(&[Css("#profile_top > b"), First, Text]),
        author_name: Query(&[Css("a[href*='/u/']"), First, Text]),
        chapter_entries: Query(&[Css("[name='chapter']"), First, Css("option")]),
        selected_chapter: Query(&[
            Css("[name='chapter']"),
            First,
            Css("option[selected]"),
            First,
            Text,
        ]),
        content: Query(&[Css(".storytext"), First]),
        unwanted: &[".a2a_kit"],
        chapter_url: Some(chapter_url),
        categories: Some(Query(&[Css("#pre_story_links a.xcontrast_txt"), Last, Text])),
        clean_content: None,
    })
}

/// Same markup as the live site; chapter URLs are sibling files with a different numeric suffix.
pub fn wget_adapter() -> Result<SiteAdapter, regex::Error> {
    Ok(SiteAdapter {
        name: "FanFiction.net (wget)",
        url_pattern: anchored(r".*\.\d+\.html")?,
        chapter_url: Some(wget_chapter_url),
        ..adapter()?
    })
}

/// `/s/<id>/<n>/` on the page's own host; the navigation value is the chapter number.
fn chapter_url(raw: &str, page_url: &Url) -> Option<Url> {
    let number: u32 = raw.trim().parse().ok()?;
    let mut segments = page_url.path_segments()?;
    if segments.next()? != "s" {
        return None;
    }
    let story_id = segments.next()?;
    let mut url = page_url.clone();
    url.set_path(&format!("/s/{}/{}/", story_id, number));
    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}

/// Replace the numeric suffix of `name.0003.html`, keeping its zero-padded width.
fn wget_chapter_url(raw: &str, page_url: &Url) -> Option<Url> {
    let number: u32 = raw.trim().parse().ok()?;
    let page = page_url.as_str();
    let (rest, ext) = page.rsplit_once('.')?;
    let (prefix, digits) = rest.rsplit_once('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let width = digits.len();
    Url::parse(&format!("{}.{:0width$}.{}", prefix, number, ext, width = width)).ok()
}
