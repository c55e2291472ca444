//! Story assembly: seed a story from its entry URL, then fetch every chapter position that is
//! still missing. Positions already present are never fetched again.

use crate::error::FicError;
use crate::extract::ExtractedChapter;
use crate::model::{Chapter, Story};
use tracing::{debug, info, warn};
use url::Url;

/// Produces extracted chapters for URLs. `Ok(None)` means the URL is not one this source handles.
pub trait ChapterSource {
    /// Site name used in error reports.
    fn site(&self) -> &str;

    fn acquire(
        &mut self,
        url: &Url,
        story: Option<&Story>,
    ) -> Result<Option<ExtractedChapter>, FicError>;
}

/// Previously saved chapters, consulted before a missing position is downloaded.
pub trait ChapterStore {
    fn load(&self, story: &Story, position: u32) -> Option<Chapter>;
}

/// Options for an assembly run: progress callback, resume store, and per-chapter checkpoint.
#[derive(Default)]
pub struct AssembleOptions<'a> {
    /// Called with (positions done, total) as assembly advances.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
    pub store: Option<&'a dyn ChapterStore>,
    /// Called after each newly downloaded chapter is inserted, with its position.
    pub on_checkpoint: Option<&'a dyn Fn(&Story, u32)>,
}

/// Download a whole story starting from any of its chapter URLs.
///
/// Any chapter that cannot be acquired aborts the story; nothing is retried here.
pub fn download(
    source: &mut dyn ChapterSource,
    entry_url: &Url,
    options: &AssembleOptions<'_>,
) -> Result<Story, FicError> {
    let ExtractedChapter { chapter, story } = source
        .acquire(entry_url, None)?
        .ok_or_else(|| FicError::NotHandled {
            site: source.site().to_string(),
            url: entry_url.to_string(),
        })?;
    let mut story = story.ok_or_else(|| {
        FicError::malformed(
            source.site(),
            entry_url.as_str(),
            "no story metadata on entry page",
        )
    })?;

    let position = chapter.number();
    if position > story.expected_chapters() {
        return Err(FicError::malformed(
            source.site(),
            entry_url.as_str(),
            format!(
                "entry page is chapter {} but the story lists {} chapter(s)",
                position,
                story.expected_chapters()
            ),
        ));
    }
    info!(
        "\"{}\" by {}: {} chapter(s)",
        story.title,
        story.author,
        story.expected_chapters()
    );
    story.add_chapter(chapter);
    if let Some(checkpoint) = options.on_checkpoint {
        checkpoint(&story, position);
    }

    fill_missing(source, &mut story, options)?;
    Ok(story)
}

/// Acquire every position of `story.chapter_urls()` with no chapter yet, trying the store first.
pub fn fill_missing(
    source: &mut dyn ChapterSource,
    story: &mut Story,
    options: &AssembleOptions<'_>,
) -> Result<(), FicError> {
    let total = story.expected_chapters();
    for position in story.missing_positions() {
        if let Some(progress) = options.progress {
            progress(position - 1, total);
        }
        if let Some(stored) = options.store.and_then(|s| s.load(story, position)) {
            if stored.number() == position {
                debug!("\"{}\": chapter {} loaded from disk", story.title, position);
                story.add_chapter(stored);
                continue;
            }
            warn!(
                "\"{}\": saved chapter at position {} says it is chapter {}; downloading again",
                story.title,
                position,
                stored.number()
            );
        }

        let url = story.chapter_url(position).cloned().ok_or_else(|| {
            FicError::malformed(
                source.site(),
                story.story_url.as_ref().map_or("", Url::as_str),
                format!("no URL for chapter {}", position),
            )
        })?;
        let extracted = source
            .acquire(&url, Some(&*story))?
            .ok_or_else(|| FicError::NotHandled {
                site: source.site().to_string(),
                url: url.to_string(),
            })?;
        let chapter = extracted.chapter;
        if chapter.number() != position {
            return Err(FicError::malformed(
                source.site(),
                url.as_str(),
                format!(
                    "page reports chapter {} where chapter {} was expected",
                    chapter.number(),
                    position
                ),
            ));
        }
        story.add_chapter(chapter);
        if let Some(checkpoint) = options.on_checkpoint {
            checkpoint(&*story, position);
        }
    }
    if let Some(progress) = options.progress {
        progress(total, total);
    }
    Ok(())
}
