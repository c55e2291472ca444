//! Document model: one Story holding its chapters keyed by 1-based reading position.
//!
//! The assembler owns the Story while it is being filled in; writers only read it.

use crate::sanitize::sanitize;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("story title is empty")]
    EmptyTitle,

    #[error("chapter number must be a positive integer, got {0}")]
    InvalidChapterNumber(u32),
}

/// One work: metadata, the ordered chapter URL list, and whatever chapters are present so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    pub title: String,
    /// May be empty when a site does not expose an author.
    pub author: String,
    pub categories: Vec<String>,
    /// Name of the site the story came from.
    pub publisher: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_pos: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_url: Option<Url>,
    chapter_urls: Vec<Url>,
    #[serde(serialize_with = "chapters_in_order")]
    chapters: BTreeMap<u32, Chapter>,
}

fn chapters_in_order<S: Serializer>(
    chapters: &BTreeMap<u32, Chapter>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(chapters.values())
}

impl Story {
    /// Create a story with no chapters yet. `chapter_urls` is fixed for the story's lifetime.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        publisher: impl Into<String>,
        chapter_urls: Vec<Url>,
    ) -> Result<Self, ModelError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ModelError::EmptyTitle);
        }
        Ok(Self {
            title,
            author: author.into().trim().to_string(),
            categories: Vec::new(),
            publisher: publisher.into(),
            cover: None,
            summary: None,
            language: None,
            rating: None,
            series: None,
            series_pos: None,
            published: None,
            updated: None,
            story_url: None,
            chapter_urls,
            chapters: BTreeMap::new(),
        })
    }

    pub fn chapter_urls(&self) -> &[Url] {
        &self.chapter_urls
    }

    /// URL of the chapter at 1-based `position`.
    pub fn chapter_url(&self, position: u32) -> Option<&Url> {
        let index = usize::try_from(position).ok()?.checked_sub(1)?;
        self.chapter_urls.get(index)
    }

    /// Number of chapters the story is expected to have.
    pub fn expected_chapters(&self) -> u32 {
        u32::try_from(self.chapter_urls.len()).unwrap_or(u32::MAX)
    }

    /// Insert `chapter` at its own number. An existing chapter at that position is replaced
    /// with a warning.
    pub fn add_chapter(&mut self, chapter: Chapter) {
        let number = chapter.number();
        if let Some(previous) = self.chapters.insert(number, chapter) {
            warn!(
                "\"{}\": chapter {} was already present ({:?}); overwriting",
                self.title,
                number,
                previous.title()
            );
        }
    }

    pub fn add_chapters(&mut self, chapters: impl IntoIterator<Item = Chapter>) {
        for chapter in chapters {
            self.add_chapter(chapter);
        }
    }

    pub fn has_chapter(&self, position: u32) -> bool {
        self.chapters.contains_key(&position)
    }

    pub fn chapter(&self, position: u32) -> Option<&Chapter> {
        self.chapters.get(&position)
    }

    /// Present chapters in reading order.
    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.values()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Positions in `1..=expected_chapters()` with no chapter yet.
    pub fn missing_positions(&self) -> Vec<u32> {
        (1..=self.expected_chapters())
            .filter(|p| !self.chapters.contains_key(p))
            .collect()
    }

    /// True when every position `1..=chapter_urls.len()` holds a chapter.
    pub fn is_complete(&self) -> bool {
        (1..=self.expected_chapters()).all(|p| self.chapters.contains_key(&p))
    }
}

/// One installment. Content is sanitized at construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    number: u32,
    title: String,
    content: String,
}

impl Chapter {
    pub fn new(
        number: u32,
        title: impl Into<String>,
        raw_content: &str,
    ) -> Result<Self, ModelError> {
        if number == 0 {
            return Err(ModelError::InvalidChapterNumber(number));
        }
        Ok(Self {
            number,
            title: title.into(),
            content: sanitize(raw_content),
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sanitized markup fragment.
    pub fn content(&self) -> &str {
        &self.content
    }
}
