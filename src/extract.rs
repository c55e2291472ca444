//! Chapter extraction: one page plus an adapter gives one cleaned chapter, and on the first page
//! of a story, the story itself with its full chapter URL list.

use crate::adapter::query::node_text;
use crate::adapter::{is_not_chapter, OptionalMatch, QueryError, SiteAdapter};
use crate::assemble::ChapterSource;
use crate::error::FicError;
use crate::markup::{absolutize_links, remove_matching};
use crate::model::{Chapter, Story};
use crate::retrieval::{Page, Retriever};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

/// A freshly extracted chapter, plus the story it seeded when no story was known yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedChapter {
    pub chapter: Chapter,
    pub story: Option<Story>,
}

/// Extract one chapter from `page` using `adapter`'s selectors.
///
/// With `story == None` the page's story metadata and chapter URL list are resolved too and
/// returned in [ExtractedChapter::story]. A required selector that matches nothing is a
/// [FicError::MalformedSiteResponse]; no empty content is substituted.
pub fn extract(
    page: &Page,
    adapter: &SiteAdapter,
    story: Option<&Story>,
) -> Result<ExtractedChapter, FicError> {
    let site = adapter.name;
    let page_url = page.url.as_str();
    let malformed = |what: &str, e: QueryError| {
        FicError::malformed(site, page_url, format!("{}: {}", what, e))
    };

    let html = absolutize_links(&page.html, &page.url)
        .map_err(|e| FicError::rewrite(site, page_url, e))?;
    let doc = Html::parse_document(&html);

    let content = adapter
        .content
        .node(&doc)
        .map_err(|e| malformed("content region", e))?;
    let entries = adapter
        .chapter_entries
        .nodes(&doc)
        .optional()
        .map_err(|e| malformed("chapter navigation", e))?
        .unwrap_or_default();

    let new_story = match story {
        Some(_) => None,
        None => Some(seed_story(page, adapter, &doc, &entries)?),
    };

    let mut fragment = remove_matching(&content.html(), adapter.unwanted)
        .map_err(|e| FicError::rewrite(site, page_url, e))?;
    if let Some(hook) = adapter.clean_content {
        if let Some(cleaned) = hook(&fragment) {
            fragment = cleaned;
        }
    }

    let (number, title) = if entries.is_empty() {
        (1, String::new())
    } else {
        let label = adapter
            .selected_chapter
            .text(&doc)
            .map_err(|e| malformed("selected chapter", e))?;
        let (number, name) = parse_label(&label).ok_or_else(|| {
            FicError::malformed(site, page_url, format!("unrecognised chapter label {:?}", label))
        })?;
        (number, normalize_title(number, name))
    };

    let chapter = Chapter::new(number, title, &fragment)
        .map_err(|e| FicError::model(site, page_url, e))?;
    debug!("{}: extracted chapter {} from {}", site, chapter.number(), page_url);
    Ok(ExtractedChapter {
        chapter,
        story: new_story,
    })
}

fn seed_story(
    page: &Page,
    adapter: &SiteAdapter,
    doc: &Html,
    entries: &[ElementRef<'_>],
) -> Result<Story, FicError> {
    let site = adapter.name;
    let page_url = page.url.as_str();
    let malformed = |what: &str, e: QueryError| {
        FicError::malformed(site, page_url, format!("{}: {}", what, e))
    };

    let title = adapter
        .story_title
        .text(doc)
        .map_err(|e| malformed("story title", e))?;
    let author = adapter
        .author_name
        .text(doc)
        .optional()
        .map_err(|e| malformed("author", e))?
        .unwrap_or_default();
    let categories = match adapter.categories {
        Some(query) => query
            .texts(doc)
            .optional()
            .map_err(|e| malformed("categories", e))?
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect(),
        None => Vec::new(),
    };

    let mut chapter_urls = Vec::with_capacity(entries.len());
    for entry in entries {
        let label = node_text(*entry);
        if is_not_chapter(&label) {
            debug!("{}: skipping navigation entry {:?}", site, label);
            continue;
        }
        let raw = entry
            .value()
            .attr("value")
            .map(str::to_string)
            .unwrap_or_else(|| label.clone());
        let url = adapter.resolve_chapter_url(&raw, &page.url).ok_or_else(|| {
            FicError::malformed(site, page_url, format!("cannot derive chapter URL from {:?}", raw))
        })?;
        chapter_urls.push(url);
    }
    if chapter_urls.is_empty() {
        chapter_urls.push(page.url.clone());
    }

    let mut story = Story::new(title, author, site, chapter_urls)
        .map_err(|e| FicError::model(site, page_url, e))?;
    story.categories = categories;
    story.story_url = Some(page.url.clone());
    Ok(story)
}

/// Split a navigation label of the form `"<number>. <name>"`.
pub fn parse_label(label: &str) -> Option<(u32, &str)> {
    let (number, name) = label.trim().split_once(". ")?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((number.parse().ok()?, name))
}

/// Prefix `"Chapter N: "` unless `name` already says which chapter it is.
pub fn normalize_title(number: u32, name: &str) -> String {
    if names_chapter(name, number) {
        name.to_string()
    } else {
        format!("Chapter {}: {}", number, name)
    }
}

/// Whether `name` contains the word "chapter" followed by `number`, in digits or in words.
fn names_chapter(name: &str, number: u32) -> bool {
    let lower = name.to_lowercase();
    lower.match_indices("chapter").any(|(i, word)| {
        let starts_word = lower[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        starts_word && number_at(lower[i + word.len()..].trim_start()) == Some(number)
    })
}

const UNITS: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Number written at the start of `s`: digits, or an English number word up to ninety-nine.
fn number_at(s: &str) -> Option<u32> {
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits > 0 {
        return s[..digits].parse().ok();
    }
    let (word, rest) = leading_word(s);
    if let Some(v) = UNITS.iter().position(|u| *u == word) {
        return u32::try_from(v).ok();
    }
    let tens = TENS.iter().position(|t| !t.is_empty() && *t == word)?;
    let ones = rest
        .strip_prefix('-')
        .or_else(|| rest.strip_prefix(' '))
        .and_then(|r| {
            let (w, _) = leading_word(r);
            UNITS[1..10].iter().position(|u| *u == w)
        })
        .map_or(0, |i| i + 1);
    u32::try_from(tens * 10 + ones).ok()
}

fn leading_word(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_alphabetic()).unwrap_or(s.len());
    s.split_at(end)
}

/// Fetches chapter pages for one adapter through a [Retriever] and extracts them.
pub struct ChapterExtractor<'a> {
    adapter: &'a SiteAdapter,
    retriever: &'a mut dyn Retriever,
}

impl<'a> ChapterExtractor<'a> {
    pub fn new(adapter: &'a SiteAdapter, retriever: &'a mut dyn Retriever) -> Self {
        Self { adapter, retriever }
    }
}

impl ChapterSource for ChapterExtractor<'_> {
    fn site(&self) -> &str {
        self.adapter.name
    }

    fn acquire(
        &mut self,
        url: &Url,
        story: Option<&Story>,
    ) -> Result<Option<ExtractedChapter>, FicError> {
        if !self.adapter.handles(url.as_str()) {
            warn!("Not a {} story URL: {}", self.adapter.name, url);
            return Ok(None);
        }
        let page = self.retriever.get_page(url)?;
        extract(&page, self.adapter, story).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ficwad, ffnet, tth};
    use crate::retrieval::RetrievalError;
    use std::collections::HashMap;
    use std::error::Error;

    fn page(url: &str, html: &str) -> Result<Page, url::ParseError> {
        Ok(Page::new(Url::parse(url)?, html))
    }

    const FFNET_CH2: &str = r#"<html><head><title>Night Watch Redux Chapter 2</title></head><body>
        <div id="pre_story_links"><a class="xcontrast_txt" href="/book/">Books</a> <a class="xcontrast_txt" href="/book/Discworld/">Discworld</a></div>
        <div id="profile_top"><b class="xcontrast_txt">Night Watch Redux</b> By: <a class="xcontrast_txt" href="/u/1/Vimes">Vimes</a></div>
        <select name="chapter"><option value="1">1. Ankh</option><option value="2" selected>2. Chapter Two: Morpork</option><option value="3">3. The Long Walk</option></select>
        <div class="storytext" id="storytext"><div class="a2a_kit"><a>Share</a></div><p>Text <a href="../3/">next</a></p><script>x()</script></div>
        <select name="chapter"><option value="1">1. Ankh</option></select>
    </body></html>"#;

    #[test]
    fn seeds_story_from_first_page() -> Result<(), Box<dyn Error>> {
        let adapter = ffnet::adapter()?;
        let p = page("https://www.fanfiction.net/s/99/2/Night-Watch", FFNET_CH2)?;
        let out = extract(&p, &adapter, None)?;
        let story = out.story.ok_or("story not seeded")?;
        assert_eq!(story.title, "Night Watch Redux");
        assert_eq!(story.author, "Vimes");
        assert_eq!(story.publisher, "FanFiction.net");
        assert_eq!(story.categories, vec!["Discworld"]);
        let urls: Vec<&str> = story.chapter_urls().iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.fanfiction.net/s/99/1/",
                "https://www.fanfiction.net/s/99/2/",
                "https://www.fanfiction.net/s/99/3/",
            ]
        );
        assert_eq!(out.chapter.number(), 2);
        assert_eq!(out.chapter.title(), "Chapter Two: Morpork");
        assert!(!out.chapter.content().contains("Share"));
        assert!(!out.chapter.content().contains("script"));
        assert!(out
            .chapter
            .content()
            .contains(r#"href="https://www.fanfiction.net/s/99/3/""#));
        Ok(())
    }

    #[test]
    fn known_story_is_not_rederived() -> Result<(), Box<dyn Error>> {
        let adapter = ffnet::adapter()?;
        let p = page("https://www.fanfiction.net/s/99/2/", FFNET_CH2)?;
        let story = Story::new("Known", "", "FanFiction.net", Vec::new())?;
        let out = extract(&p, &adapter, Some(&story))?;
        assert!(out.story.is_none());
        assert_eq!(out.chapter.number(), 2);
        Ok(())
    }

    #[test]
    fn extraction_is_deterministic() -> Result<(), Box<dyn Error>> {
        let adapter = ffnet::adapter()?;
        let p = page("https://www.fanfiction.net/s/99/2/", FFNET_CH2)?;
        assert_eq!(extract(&p, &adapter, None)?, extract(&p, &adapter, None)?);
        Ok(())
    }

    #[test]
    fn single_chapter_story_without_navigation() -> Result<(), Box<dyn Error>> {
        let adapter = tth::adapter()?;
        let p = page(
            "http://www.tthfanfic.org/Story-5",
            r#"<h2>One Shot</h2><a href="/AuthorStories-1/Willow.htm">Willow</a>
            <div><a name="storybody"></a><h3>One Shot</h3><p>Only chapter.</p></div>"#,
        )?;
        let out = extract(&p, &adapter, None)?;
        let story = out.story.ok_or("story not seeded")?;
        assert_eq!(story.chapter_urls(), &[p.url.clone()]);
        assert_eq!(out.chapter.number(), 1);
        assert_eq!(out.chapter.title(), "");
        assert_eq!(out.chapter.content(), "<div><p>Only chapter.</p></div>");
        Ok(())
    }

    #[test]
    fn not_chapter_entries_are_filtered() -> Result<(), Box<dyn Error>> {
        let adapter = ficwad::adapter()?;
        let p = page(
            "https://ficwad.com/story/10",
            r#"<h3><a href="/c/1">Buffy</a><a href="/story/9">Bad Moon</a></h3>
            <a href="/author/4">Oz</a>
            <select name="goto"><option value="/story/9">STORY INDEX</option><option value="/story/10" selected>1. Intro</option><option value="/story/11">2. Middle</option></select>
            <div id="storytext"><p>Full moon.</p></div>"#,
        )?;
        let story = extract(&p, &adapter, None)?.story.ok_or("story not seeded")?;
        let urls: Vec<&str> = story.chapter_urls().iter().map(Url::as_str).collect();
        assert_eq!(urls, vec!["https://ficwad.com/story/10", "https://ficwad.com/story/11"]);
        Ok(())
    }

    #[test]
    fn missing_content_region_is_malformed() -> Result<(), Box<dyn Error>> {
        let adapter = ficwad::adapter()?;
        let p = page("https://ficwad.com/story/10", "<h3><b>T</b></h3><p>No story here</p>")?;
        let err = extract(&p, &adapter, None).err().ok_or("expected an error")?;
        match err {
            FicError::MalformedSiteResponse { site, url, reason } => {
                assert_eq!(site, "FicWad");
                assert_eq!(url, "https://ficwad.com/story/10");
                assert!(reason.contains("content region"));
            }
            other => return Err(format!("unexpected error {:?}", other).into()),
        }
        Ok(())
    }

    #[test]
    fn label_parsing_and_title_normalization() {
        assert_eq!(parse_label("3. The Long Walk"), Some((3, "The Long Walk")));
        assert_eq!(parse_label("Prologue"), None);
        assert_eq!(parse_label("x. Nope"), None);
        assert_eq!(normalize_title(3, "The Long Walk"), "Chapter 3: The Long Walk");
        assert_eq!(
            normalize_title(3, "Chapter Three: The Long Walk"),
            "Chapter Three: The Long Walk"
        );
        assert_eq!(normalize_title(3, "chapter 3 - Walk"), "chapter 3 - Walk");
        assert_eq!(normalize_title(21, "Chapter Twenty-One"), "Chapter Twenty-One");
        assert_eq!(
            normalize_title(20, "Chapter Twenty-One"),
            "Chapter 20: Chapter Twenty-One"
        );
        assert_eq!(normalize_title(3, "Chapter 31"), "Chapter 3: Chapter 31");
        assert_eq!(normalize_title(3, "Subchapter 3"), "Chapter 3: Subchapter 3");
    }

    struct MapRetriever(HashMap<String, String>);

    impl Retriever for MapRetriever {
        fn get_page(&mut self, url: &Url) -> Result<Page, RetrievalError> {
            self.0
                .get(url.as_str())
                .map(|html| Page::new(url.clone(), html.clone()))
                .ok_or(RetrievalError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    #[test]
    fn extractor_rejects_foreign_urls_without_fetching() -> Result<(), Box<dyn Error>> {
        let adapter = ficwad::adapter()?;
        let mut retriever = MapRetriever(HashMap::new());
        let mut extractor = ChapterExtractor::new(&adapter, &mut retriever);
        let url = Url::parse("https://www.fanfiction.net/s/1/1/")?;
        assert!(extractor.acquire(&url, None)?.is_none());
        let url = Url::parse("https://ficwad.com/story/1")?;
        assert!(matches!(
            extractor.acquire(&url, None),
            Err(FicError::Retrieval(RetrievalError::HttpStatus { status: 404, .. }))
        ));
        Ok(())
    }
}
