//! End-to-end: adapter lookup, extraction, assembly, writing, and reading the written story back.

use fanfic2ebook::writer::{story_dir, story_from_html, verify_target_dir, write_story};
use fanfic2ebook::{
    download, AdapterRegistry, AssembleOptions, CachingRetriever, ChapterExtractor, HtmlDirStore,
    Page, PageCache, PoliteClient, RetrievalError, Retriever, WriterKind,
};
use std::collections::HashMap;
use std::error::Error;
use url::Url;

const TITLES: [&str; 3] = ["Ankh", "Chapter Two: Morpork", "The Long Walk"];

fn ffnet_page(n: usize) -> String {
    let options: String = TITLES
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let selected = if i + 1 == n { " selected" } else { "" };
            format!(r#"<option value="{}"{}>{}. {}</option>"#, i + 1, selected, i + 1, t)
        })
        .collect();
    format!(
        r#"<html><body>
        <div id="pre_story_links"><a class="xcontrast_txt" href="/book/">Books</a> <a class="xcontrast_txt" href="/book/Discworld/">Discworld</a></div>
        <div id="profile_top"><b class="xcontrast_txt">Night Watch Redux</b> By: <a class="xcontrast_txt" href="/u/1/Vimes">Vimes</a></div>
        <select name="chapter">{options}</select>
        <div class="storytext" id="storytext"><div class="a2a_kit">Share</div><p style="color:red">Part {n} of the <b>watch</b>.</p><script>track()</script></div>
        </body></html>"#
    )
}

/// Serves fixed pages and counts fetches.
struct FixtureRetriever {
    pages: HashMap<String, String>,
    fetches: u32,
}

impl FixtureRetriever {
    fn ffnet() -> Self {
        let pages = (1..=TITLES.len())
            .map(|n| (format!("https://www.fanfiction.net/s/42/{}/", n), ffnet_page(n)))
            .collect();
        Self {
            pages,
            fetches: 0,
        }
    }
}

impl Retriever for FixtureRetriever {
    fn get_page(&mut self, url: &Url) -> Result<Page, RetrievalError> {
        self.fetches += 1;
        let html = self
            .pages
            .get(url.as_str())
            .ok_or_else(|| RetrievalError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })?;
        Ok(Page::new(url.clone(), html.clone()))
    }
}

#[test]
fn downloads_writes_and_reads_back_a_story() -> Result<(), Box<dyn Error>> {
    let registry = AdapterRegistry::with_builtin()?;
    let entry = "https://www.fanfiction.net/s/42/2/";
    let adapter = registry.resolve(entry).ok_or("no adapter")?;
    let mut retriever = FixtureRetriever::ffnet();
    let mut extractor = ChapterExtractor::new(adapter, &mut retriever);
    let story = download(&mut extractor, &Url::parse(entry)?, &AssembleOptions::default())?;

    assert!(story.is_complete());
    assert_eq!(story.title, "Night Watch Redux");
    assert_eq!(story.categories, vec!["Discworld"]);
    let titles: Vec<&str> = story.chapters().map(|c| c.title()).collect();
    assert_eq!(
        titles,
        vec!["Chapter 1: Ankh", "Chapter Two: Morpork", "Chapter 3: The Long Walk"]
    );
    for ch in story.chapters() {
        assert!(!ch.content().contains("Share"));
        assert!(!ch.content().contains("script"));
        assert!(!ch.content().contains("style"));
    }
    assert_eq!(retriever.fetches, 3);

    let tmp = tempfile::tempdir()?;
    let dir = story_dir(tmp.path(), &story);
    verify_target_dir(&dir, true)?;
    let bundle = write_story(WriterKind::HtmlFile, &story, &dir, false)?;
    let back = story_from_html(&std::fs::read_to_string(bundle)?)?;
    assert_eq!(back, story);
    Ok(())
}

#[test]
fn rerun_resumes_from_chapter_files() -> Result<(), Box<dyn Error>> {
    let registry = AdapterRegistry::with_builtin()?;
    let entry = Url::parse("https://www.fanfiction.net/s/42/1/")?;
    let adapter = registry.resolve(entry.as_str()).ok_or("no adapter")?;
    let tmp = tempfile::tempdir()?;

    let mut first = FixtureRetriever::ffnet();
    let story = download(
        &mut ChapterExtractor::new(adapter, &mut first),
        &entry,
        &AssembleOptions::default(),
    )?;
    let dir = story_dir(tmp.path(), &story);
    verify_target_dir(&dir, true)?;
    write_story(WriterKind::HtmlDir, &story, &dir, false)?;

    let mut second = FixtureRetriever::ffnet();
    let store = HtmlDirStore::new(tmp.path());
    let options = AssembleOptions {
        store: Some(&store),
        ..Default::default()
    };
    let resumed = download(&mut ChapterExtractor::new(adapter, &mut second), &entry, &options)?;
    assert_eq!(second.fetches, 1);
    assert_eq!(resumed, story);
    Ok(())
}

#[test]
fn wget_mirror_is_read_from_disk_then_from_cache() -> Result<(), Box<dyn Error>> {
    let tmp = tempfile::tempdir()?;
    let mirror = tmp.path().join("mirror");
    std::fs::create_dir(&mirror)?;
    for n in 1..=TITLES.len() {
        std::fs::write(mirror.join(format!("nwr.{:02}.html", n)), ffnet_page(n))?;
    }
    let entry = Url::from_file_path(mirror.join("nwr.01.html")).map_err(|()| "bad path")?;
    let registry = AdapterRegistry::with_builtin()?;
    let adapter = registry.resolve(entry.as_str()).ok_or("no adapter")?;
    assert_eq!(adapter.name, "FanFiction.net (wget)");

    let cache_path = tmp.path().join("cache.sqlite3");
    let client = || PoliteClient::builder().delay_secs(0).build();
    let mut retriever = CachingRetriever::new(client()?, Some(PageCache::open(&cache_path)?));
    let story = download(
        &mut ChapterExtractor::new(adapter, &mut retriever),
        &entry,
        &AssembleOptions::default(),
    )?;
    assert!(story.is_complete());
    assert!(story.chapter_urls()[2].as_str().ends_with("nwr.03.html"));

    std::fs::remove_dir_all(&mirror)?;
    let mut cached = CachingRetriever::new(client()?, Some(PageCache::open(&cache_path)?));
    let again = download(
        &mut ChapterExtractor::new(adapter, &mut cached),
        &entry,
        &AssembleOptions::default(),
    )?;
    assert_eq!(again, story);
    Ok(())
}

#[test]
fn unsupported_site_has_no_adapter() -> Result<(), Box<dyn Error>> {
    let registry = AdapterRegistry::with_builtin()?;
    assert!(registry.resolve("https://archiveofourown.org/works/1").is_none());
    Ok(())
}
