//! Personalities and the eBook conversion step that follows a single-file bundle.

use crate::model::Story;
use std::path::Path;
use std::process::Command;
use tracing::{error, info};

const CONVERTER: &str = "ebook-convert";

/// What the program turns a story into. Everything except [Personality::Html] converts the HTML
/// bundle into an eBook file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Personality {
    #[default]
    Html,
    Epub,
    Lrf,
    Mobi,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Html,
        Personality::Epub,
        Personality::Lrf,
        Personality::Mobi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Personality::Html => "fanfic2html",
            Personality::Epub => "fanfic2epub",
            Personality::Lrf => "fanfic2lrf",
            Personality::Mobi => "fanfic2mobi",
        }
    }

    /// Extension of the converted file; `None` when no conversion happens.
    pub fn final_ext(self) -> Option<&'static str> {
        match self {
            Personality::Html => None,
            Personality::Epub => Some("epub"),
            Personality::Lrf => Some("lrf"),
            Personality::Mobi => Some("mobi"),
        }
    }

    /// Accepts `fanfic2epub` as well as the bare `epub`.
    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let short = s.strip_prefix("fanfic2").unwrap_or(&s);
        Personality::ALL
            .into_iter()
            .find(|p| p.name().strip_prefix("fanfic2") == Some(short))
    }

    /// Personality named by the executable, e.g. a `fanfic2mobi` symlink. Any other name,
    /// including `fanfic2ebook` itself, gives `None`.
    pub fn from_program_name(argv0: &str) -> Option<Self> {
        let stem = Path::new(argv0).file_stem()?.to_str()?;
        Personality::ALL.into_iter().find(|p| p.name() == stem)
    }
}

/// The `ebook-convert` invocation for converting `input` into `output`.
pub fn build_command(story: &Story, input: &Path, output: &Path) -> Command {
    let mut cmd = Command::new(CONVERTER);
    cmd.arg(input)
        .arg(output)
        .arg("--title")
        .arg(&story.title)
        .arg("--authors")
        .arg(&story.author)
        .arg("--publisher")
        .arg(&story.publisher);
    if !story.categories.is_empty() {
        cmd.arg("--tags").arg(story.categories.join(", "));
    }
    if let Some(ref cover) = story.cover {
        cmd.arg("--cover").arg(cover.as_str());
    }
    if let Some(ref summary) = story.summary {
        cmd.arg("--comments").arg(summary);
    }
    cmd
}

/// Convert `input` into `output`. Returns whether the conversion succeeded; failures are logged.
pub fn postprocess(story: &Story, input: &Path, output: &Path) -> bool {
    info!("Converting {} to {}", input.display(), output.display());
    match build_command(story, input, output).output() {
        Ok(out) if out.status.success() => true,
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            error!(
                "{} exited with {} for {}: {}",
                CONVERTER,
                out.status,
                input.display(),
                stderr.trim()
            );
            false
        }
        Err(e) => {
            error!(
                "Could not run {}: {}. Is it installed and on PATH?",
                CONVERTER, e
            );
            false
        }
    }
}
