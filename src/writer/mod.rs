//! Output writers, target directory handling, and the on-disk chapter store used for resuming.

mod formats;
pub mod html;

pub use formats::{write_json, write_markdown};
pub use html::{story_from_html, story_to_html, DocumentError};

use crate::assemble::ChapterStore;
use crate::model::{Chapter, Story};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterKind {
    /// One HTML file per chapter in the story directory.
    HtmlDir,
    /// All chapters in a single HTML file.
    HtmlFile,
    Markdown,
    Json,
}

impl WriterKind {
    pub const ALL: [WriterKind; 4] = [
        WriterKind::HtmlDir,
        WriterKind::HtmlFile,
        WriterKind::Markdown,
        WriterKind::Json,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WriterKind::HtmlDir => "htmldir",
            WriterKind::HtmlFile => "htmlfile",
            WriterKind::Markdown => "markdown",
            WriterKind::Json => "json",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "htmldir" | "html" => Some(WriterKind::HtmlDir),
            "htmlfile" | "bundle" => Some(WriterKind::HtmlFile),
            "markdown" | "md" => Some(WriterKind::Markdown),
            "json" => Some(WriterKind::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Target not writable: {path}: {reason}")]
    TargetUnwritable { path: PathBuf, reason: String },

    #[error("Failed to write output: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render HTML: {0}")]
    Render(#[from] std::fmt::Error),
}

impl WriteError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn unwritable(path: &Path, reason: impl Into<String>) -> Self {
        WriteError::TargetUnwritable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Replace characters that FAT32 long filenames cannot hold with `_`.
pub fn prepare_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\u{0}'..='\u{1f}' | '\u{7f}' => '_',
            '"' | '*' | '/' | ':' | '<' | '>' | '?' | '\\' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Check that `target` can hold stories. A missing directory is created when `create` is set.
///
/// Returns `Ok(false)` only when the directory is missing, could be created, and `create` is unset.
pub fn verify_target_dir(target: &Path, create: bool) -> Result<bool, WriteError> {
    match std::fs::metadata(target) {
        Ok(meta) => {
            if !meta.is_dir() {
                return Err(WriteError::unwritable(target, "not a directory"));
            }
            can_create_files(target)?;
            Ok(true)
        }
        Err(_) => {
            let parent = target
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let parent_ok = std::fs::metadata(parent).is_ok_and(|m| m.is_dir())
                && can_create_files(parent).is_ok();
            if !parent_ok {
                return Err(WriteError::unwritable(
                    target,
                    "directory does not exist and cannot be created",
                ));
            }
            if !create {
                return Ok(false);
            }
            info!("Creating target directory {}", target.display());
            std::fs::create_dir_all(target)
                .map_err(|e| WriteError::unwritable(target, e.to_string()))?;
            Ok(true)
        }
    }
}

/// Create and discard an anonymous file in `dir`.
fn can_create_files(dir: &Path) -> Result<(), WriteError> {
    tempfile::tempfile_in(dir)
        .map(drop)
        .map_err(|e| WriteError::unwritable(dir, format!("cannot create files: {}", e)))
}

/// Directory a story is written into: `<target>/<title>`, or `target` itself when it is already
/// named after the story.
pub fn story_dir(target: &Path, story: &Story) -> PathBuf {
    let title = story.title.trim();
    let already_named = target
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim().to_lowercase() == title.to_lowercase())
        .unwrap_or(false);
    if already_named {
        target.to_path_buf()
    } else {
        target.join(prepare_filename(title))
    }
}

/// `<dir>/<title> - <n>.html`
pub fn chapter_path(dir: &Path, story: &Story, position: u32) -> PathBuf {
    dir.join(format!("{} - {}.html", prepare_filename(&story.title), position))
}

/// `<dir>/<title>.<ext>`
pub fn bundle_path(dir: &Path, story: &Story, ext: &str) -> PathBuf {
    dir.join(format!(
        "{}.{}",
        prepare_filename(&story.title),
        ext.trim_start_matches('.')
    ))
}

/// Write one chapter file for the directory writer. An existing file is kept unless
/// `overwrite`; returns the path when something was written.
pub fn write_chapter_file(
    story: &Story,
    position: u32,
    dir: &Path,
    overwrite: bool,
) -> Result<Option<PathBuf>, WriteError> {
    if !story.has_chapter(position) {
        return Ok(None);
    }
    let path = chapter_path(dir, story, position);
    if path.exists() && !overwrite {
        debug!("Chapter already exists. Skipping: {}", path.display());
        return Ok(None);
    }
    std::fs::write(&path, story_to_html(story, Some(position))?)
        .map_err(|e| WriteError::io(&path, e))?;
    debug!("Wrote {}", path.display());
    Ok(Some(path))
}

/// Write `story` into `dir` (which must exist) in the chosen format. Returns the artifact path:
/// the directory for [WriterKind::HtmlDir], the file otherwise.
pub fn write_story(
    kind: WriterKind,
    story: &Story,
    dir: &Path,
    overwrite: bool,
) -> Result<PathBuf, WriteError> {
    match kind {
        WriterKind::HtmlDir => {
            for position in 1..=story.expected_chapters() {
                write_chapter_file(story, position, dir, overwrite)?;
            }
            Ok(dir.to_path_buf())
        }
        WriterKind::HtmlFile => {
            let path = bundle_path(dir, story, "html");
            std::fs::write(&path, story_to_html(story, None)?)
                .map_err(|e| WriteError::io(&path, e))?;
            Ok(path)
        }
        WriterKind::Markdown => {
            let path = bundle_path(dir, story, "md");
            write_markdown(story, &path)?;
            Ok(path)
        }
        WriterKind::Json => {
            let path = bundle_path(dir, story, "json");
            write_json(story, &path)?;
            Ok(path)
        }
    }
}

/// Chapters saved earlier by the directory writer, looked up in each story's directory under
/// `target`.
#[derive(Debug, Clone)]
pub struct HtmlDirStore {
    target: PathBuf,
}

impl HtmlDirStore {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl ChapterStore for HtmlDirStore {
    fn load(&self, story: &Story, position: u32) -> Option<Chapter> {
        let path = chapter_path(&story_dir(&self.target, story), story, position);
        let html = std::fs::read_to_string(&path).ok()?;
        match story_from_html(&html) {
            Ok(saved) => saved.chapter(position).cloned(),
            Err(e) => {
                warn!("Ignoring unreadable chapter file {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use url::Url;

    fn story(chapters: u32) -> Result<Story, Box<dyn Error>> {
        let urls = (1..=chapters)
            .map(|i| Url::parse(&format!("https://ficwad.com/story/{}", i)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut story = Story::new("What If?: A/B", "Author", "FicWad", urls)?;
        for i in 1..=chapters {
            story.add_chapter(Chapter::new(i, format!("Chapter {}", i), "<p>text</p>")?);
        }
        Ok(story)
    }

    #[test]
    fn prepare_filename_replaces_fat32_unsafe_chars() {
        assert_eq!(prepare_filename("What If?: A/B"), "What If__ A_B");
        assert_eq!(prepare_filename("a\"b*c<d>e|f\\g\u{1}h"), "a_b_c_d_e_f_g_h");
        assert_eq!(prepare_filename("Plain title"), "Plain title");
    }

    #[test]
    fn writer_names_round_trip() {
        for kind in WriterKind::ALL {
            assert_eq!(WriterKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(WriterKind::from_name("MD"), Some(WriterKind::Markdown));
        assert_eq!(WriterKind::from_name("pdf"), None);
    }

    #[test]
    fn story_dir_avoids_identical_nesting() -> Result<(), Box<dyn Error>> {
        let s = story(1)?;
        assert_eq!(
            story_dir(Path::new("/books"), &s),
            PathBuf::from("/books/What If__ A_B")
        );
        let mut plain = s.clone();
        plain.title = "Night Watch".to_string();
        assert_eq!(
            story_dir(Path::new("/books/night watch"), &plain),
            PathBuf::from("/books/night watch")
        );
        Ok(())
    }

    #[test]
    fn verify_target_dir_creates_missing_dir() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let target = tmp.path().join("new");
        assert!(!verify_target_dir(&target, false)?);
        assert!(!target.exists());
        assert!(verify_target_dir(&target, true)?);
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn verify_target_dir_rejects_files_and_missing_parents() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let file = tmp.path().join("file.txt");
        std::fs::write(&file, "x")?;
        assert!(matches!(
            verify_target_dir(&file, true),
            Err(WriteError::TargetUnwritable { .. })
        ));
        let orphan = tmp.path().join("no").join("such").join("dir");
        assert!(matches!(
            verify_target_dir(&orphan, true),
            Err(WriteError::TargetUnwritable { .. })
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn verify_target_dir_rejects_dirs_it_cannot_write() -> Result<(), Box<dyn Error>> {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir()?;
        let locked = tmp.path().join("locked");
        std::fs::create_dir(&locked)?;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555))?;
        // Root ignores permission bits; nothing to check then.
        let privileged = std::fs::write(locked.join("canary"), "x").is_ok();
        let existing = verify_target_dir(&locked, true);
        let child = verify_target_dir(&locked.join("story"), true);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))?;
        if privileged {
            return Ok(());
        }
        assert!(matches!(existing, Err(WriteError::TargetUnwritable { .. })));
        assert!(matches!(child, Err(WriteError::TargetUnwritable { .. })));
        Ok(())
    }

    #[test]
    fn htmldir_skips_existing_files_unless_overwrite() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let s = story(2)?;
        let first = chapter_path(tmp.path(), &s, 1);
        std::fs::write(&first, "keep me")?;
        write_story(WriterKind::HtmlDir, &s, tmp.path(), false)?;
        assert_eq!(std::fs::read_to_string(&first)?, "keep me");
        assert!(chapter_path(tmp.path(), &s, 2).exists());
        write_story(WriterKind::HtmlDir, &s, tmp.path(), true)?;
        assert!(std::fs::read_to_string(&first)?.contains(r#"id="title""#));
        Ok(())
    }

    #[test]
    fn html_dir_store_loads_written_chapters() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let s = story(2)?;
        let dir = story_dir(tmp.path(), &s);
        verify_target_dir(&dir, true)?;
        write_chapter_file(&s, 2, &dir, false)?;
        let store = HtmlDirStore::new(tmp.path());
        assert_eq!(store.load(&s, 2).as_ref(), s.chapter(2));
        assert!(store.load(&s, 1).is_none());
        Ok(())
    }

    #[test]
    fn bundle_formats_land_next_to_each_other() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let s = story(2)?;
        let html = write_story(WriterKind::HtmlFile, &s, tmp.path(), false)?;
        let md = write_story(WriterKind::Markdown, &s, tmp.path(), false)?;
        let json = write_story(WriterKind::Json, &s, tmp.path(), false)?;
        assert_eq!(html, tmp.path().join("What If__ A_B.html"));
        assert_eq!(md, tmp.path().join("What If__ A_B.md"));
        assert_eq!(json, tmp.path().join("What If__ A_B.json"));
        let back = story_from_html(&std::fs::read_to_string(&html)?)?;
        assert_eq!(back, s);
        Ok(())
    }
}
