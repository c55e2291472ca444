//! Single-file formats besides the HTML bundle: Markdown and JSON.

use super::WriteError;
use crate::model::Story;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn create(path: &Path) -> Result<BufWriter<File>, WriteError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| WriteError::io(path, e))
}

/// Title, byline, summary and tags, then each chapter as `## title` with its body converted
/// from HTML to Markdown.
pub fn write_markdown(story: &Story, path: &Path) -> Result<(), WriteError> {
    let mut f = create(path)?;
    let io = |e| WriteError::io(path, e);

    writeln!(f, "# {}", story.title).map_err(io)?;
    writeln!(f).map_err(io)?;
    if !story.author.is_empty() {
        writeln!(f, "By {}", story.author).map_err(io)?;
        writeln!(f).map_err(io)?;
    }
    if let Some(ref summary) = story.summary {
        writeln!(f, "{}", summary).map_err(io)?;
        writeln!(f).map_err(io)?;
    }
    if !story.categories.is_empty() {
        writeln!(f, "*{}*", story.categories.join(", ")).map_err(io)?;
        writeln!(f).map_err(io)?;
    }
    writeln!(f, "---").map_err(io)?;
    writeln!(f).map_err(io)?;

    for ch in story.chapters() {
        if ch.title().is_empty() {
            writeln!(f, "## Chapter {}", ch.number()).map_err(io)?;
        } else {
            writeln!(f, "## {}", ch.title()).map_err(io)?;
        }
        writeln!(f).map_err(io)?;
        writeln!(f, "{}", html2md::parse_html(ch.content()).trim()).map_err(io)?;
        writeln!(f).map_err(io)?;
    }
    f.flush().map_err(io)
}

/// The whole story model, chapters in reading order.
pub fn write_json(story: &Story, path: &Path) -> Result<(), WriteError> {
    let mut f = create(path)?;
    serde_json::to_writer_pretty(&mut f, story)?;
    f.flush().map_err(|e| WriteError::io(path, e))
}
