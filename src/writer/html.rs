//! The HTML document format: a story (or one of its chapters) as a standalone page with
//! structural markers, and the parser that reads such a page back into a [Story].
//!
//! Markers: `h1#title`, `span#author`, and per chapter a `div.chapter` child of `body` holding
//! `a.chapter_num#chapter_<n>`, `h2.chapter_title` and `div.content` as direct children. Story
//! metadata goes in `meta` tags; chapter URLs in `link rel="chapter"`, in reading order.

use crate::adapter::query::{node_text, parse_selector, QueryError};
use crate::markup::escape;
use crate::model::{Chapter, ModelError, Story};
use scraper::{ElementRef, Html};
use std::fmt::{self, Write};
use thiserror::Error;
use url::Url;

const GENERATOR: &str = "fanfic2ebook";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("not a story document: missing {0}")]
    MissingMarker(&'static str),

    #[error("bad chapter marker {0:?}")]
    BadChapterMarker(String),

    #[error("{0}")]
    Selector(#[from] QueryError),

    #[error("{0}")]
    Model(#[from] ModelError),
}

/// Render `story` as one HTML page. With `only_chapter`, just that chapter is included (the
/// per-chapter files of the directory writer); otherwise every present chapter, with a table of
/// contents when there is more than one.
pub fn story_to_html(story: &Story, only_chapter: Option<u32>) -> Result<String, fmt::Error> {
    let chapters: Vec<&Chapter> = match only_chapter {
        Some(n) => story.chapter(n).into_iter().collect(),
        None => story.chapters().collect(),
    };
    let page_title = match (only_chapter, chapters.first()) {
        (Some(_), Some(ch)) if !ch.title().is_empty() => {
            format!("{} - {}", story.title, ch.title())
        }
        _ => story.title.clone(),
    };

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n");
    writeln!(
        out,
        r#"<html lang="{}">"#,
        escape(story.language.as_deref().unwrap_or("en"))
    )?;
    out.push_str("<head>\n  <meta charset=\"UTF-8\"/>\n");
    writeln!(out, "  <title>{}</title>", escape(&page_title))?;
    for (name, value) in metas(story) {
        writeln!(
            out,
            r#"  <meta name="{}" content="{}"/>"#,
            name,
            escape(&value)
        )?;
    }
    for url in story.chapter_urls() {
        writeln!(out, r#"  <link rel="chapter" href="{}"/>"#, escape(url.as_str()))?;
    }
    out.push_str("</head>\n<body>\n");
    writeln!(out, r#"  <h1 id="title">{}</h1>"#, escape(&story.title))?;
    writeln!(
        out,
        r#"  <p class="byline">by <span id="author">{}</span></p>"#,
        escape(&story.author)
    )?;

    if only_chapter.is_none() && chapters.len() > 1 {
        out.push_str("  <div id=\"toc\">\n    <h2>Contents</h2>\n    <ol>\n");
        for ch in &chapters {
            writeln!(
                out,
                r##"      <li><a href="#chapter_{}">{}</a></li>"##,
                ch.number(),
                escape(&display_title(ch))
            )?;
        }
        out.push_str("    </ol>\n  </div>\n");
    }

    for ch in chapters {
        let n = ch.number();
        out.push_str("  <div class=\"chapter\">\n");
        writeln!(
            out,
            r#"    <a class="chapter_num" id="chapter_{n}" name="chapter_{n}"></a>"#
        )?;
        writeln!(out, r#"    <h2 class="chapter_title">{}</h2>"#, escape(ch.title()))?;
        out.push_str("    <div class=\"content\">");
        out.push_str(ch.content());
        out.push_str("</div>\n  </div>\n");
    }
    out.push_str("</body>\n</html>\n");
    Ok(out)
}

fn display_title(ch: &Chapter) -> String {
    if ch.title().is_empty() {
        format!("Chapter {}", ch.number())
    } else {
        ch.title().to_string()
    }
}

fn metas(story: &Story) -> Vec<(&'static str, String)> {
    let mut metas = vec![
        ("DC.title", story.title.clone()),
        ("DC.creator", story.author.clone()),
        ("DC.publisher", story.publisher.clone()),
    ];
    let optional = [
        ("DC.language", story.language.clone()),
        ("DC.description", story.summary.clone()),
        ("DC.date.created", story.published.clone()),
        ("DC.date.modified", story.updated.clone()),
        ("Identifier-URL", story.story_url.as_ref().map(Url::to_string)),
        ("Rating", story.rating.clone()),
        ("Series", story.series.clone()),
        ("Series-Position", story.series_pos.map(|p| p.to_string())),
        ("Cover", story.cover.as_ref().map(Url::to_string)),
    ];
    metas.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
    metas.extend(story.categories.iter().map(|c| ("DC.subject", c.clone())));
    metas.push(("Category", "Fanfiction".to_string()));
    metas.push(("DC.type", "Text".to_string()));
    metas.push(("Generator", GENERATOR.to_string()));
    metas
}

/// Parse a page written by [story_to_html] back into a story with its chapters.
pub fn story_from_html(html: &str) -> Result<Story, DocumentError> {
    let doc = Html::parse_document(html);
    let title = first(&doc, "h1#title")?
        .map(node_text)
        .ok_or(DocumentError::MissingMarker("h1#title"))?;
    let author = first(&doc, "span#author")?.map(node_text).unwrap_or_default();
    let meta = |name: &str| -> Result<Vec<String>, DocumentError> {
        let sel = parse_selector("meta[name][content]")?;
        Ok(doc
            .select(&sel)
            .filter(|m| m.value().attr("name") == Some(name))
            .filter_map(|m| m.value().attr("content").map(str::to_string))
            .collect())
    };
    let single = |name: &str| -> Result<Option<String>, DocumentError> {
        Ok(meta(name)?.into_iter().next().filter(|v| !v.is_empty()))
    };

    let link_sel = parse_selector(r#"link[rel="chapter"][href]"#)?;
    let chapter_urls: Vec<Url> = doc
        .select(&link_sel)
        .filter_map(|l| l.value().attr("href"))
        .filter_map(|href| Url::parse(href).ok())
        .collect();

    let publisher = single("DC.publisher")?.unwrap_or_default();
    let mut story = Story::new(title, author, publisher, chapter_urls)?;
    story.categories = meta("DC.subject")?;
    story.language = single("DC.language")?;
    story.summary = single("DC.description")?;
    story.published = single("DC.date.created")?;
    story.updated = single("DC.date.modified")?;
    story.story_url = single("Identifier-URL")?.and_then(|u| Url::parse(&u).ok());
    story.rating = single("Rating")?;
    story.series = single("Series")?;
    story.series_pos = single("Series-Position")?.and_then(|p| p.parse().ok());
    story.cover = single("Cover")?.and_then(|u| Url::parse(&u).ok());

    // Only the writer's own markers count: chapter content may carry the same classes.
    let chapter_sel = parse_selector("body > div.chapter")?;
    for div in doc.select(&chapter_sel) {
        let marker = child(div, "a", "chapter_num")
            .and_then(|a| a.value().attr("id"))
            .ok_or(DocumentError::MissingMarker("a.chapter_num"))?;
        let number: u32 = marker
            .strip_prefix("chapter_")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| DocumentError::BadChapterMarker(marker.to_string()))?;
        let title = child(div, "h2", "chapter_title").map(node_text).unwrap_or_default();
        let content = child(div, "div", "content")
            .map(|c| c.inner_html())
            .ok_or(DocumentError::MissingMarker("div.content"))?;
        story.add_chapter(Chapter::new(number, title, content.trim())?);
    }
    Ok(story)
}

/// First direct child of `parent` that is a `tag` with class `class`.
fn child<'a>(parent: ElementRef<'a>, tag: &str, class: &str) -> Option<ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag && el.value().classes().any(|c| c == class))
}

fn first<'a>(doc: &'a Html, sel: &str) -> Result<Option<ElementRef<'a>>, DocumentError> {
    let selector = parse_selector(sel)?;
    Ok(doc.select(&selector).next())
}
