//! CLI parsing and orchestration. Parses args, downloads each story, writes it, and optionally
//! converts the bundle to an eBook. Maps errors to exit codes.

use crate::adapter::{AdapterRegistry, SiteAdapter};
use crate::assemble::{download, AssembleOptions, ChapterStore};
use crate::config::{self, Config};
use crate::error::FicError;
use crate::extract::ChapterExtractor;
use crate::model::Story;
use crate::postprocess::{postprocess, Personality};
use crate::retrieval::{CachingRetriever, PageCache, PoliteClient, Retriever};
use crate::writer::{
    bundle_path, story_dir, verify_target_dir, write_chapter_file, write_story, HtmlDirStore,
    WriteError, WriterKind,
};
use clap::{ArgAction, Parser};
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Fic(#[from] FicError),

    #[error("{failed} of {total} stories failed")]
    StoriesFailed { failed: usize, total: usize },

    #[error("{0}")]
    Write(#[from] WriteError),

    /// HTTP client or page cache could not be set up.
    #[error("{0}")]
    Setup(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Fic(_) | CliRunError::StoriesFailed { .. } => 2,
            CliRunError::Write(_) | CliRunError::Setup(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fanfic2ebook", version)]
#[command(about = "Download fan fiction stories and bundle them for eBook conversion")]
#[command(
    after_help = "Config file keys (target_dir, user_agent, request_delay_secs, timeout_secs, \
retry_count, retry_backoff_secs, cache_path, use_cache, format, personality, overwrite) are read \
from ./fanfic2ebook.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Story URLs: any chapter of each story.
    #[arg(required_unless_present = "list_supported")]
    pub urls: Vec<String>,

    /// Directory stories are written under. Default: current directory.
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Writer: htmldir (default), htmlfile, markdown, or json.
    #[arg(long, value_parser = parse_writer)]
    pub format: Option<WriterKind>,

    /// Write a single HTML file; same as --format htmlfile.
    #[arg(short, long, conflicts_with = "format")]
    pub bundle: bool,

    /// fanfic2html (no conversion), fanfic2epub, fanfic2lrf, or fanfic2mobi.
    #[arg(short = 'P', long, value_parser = parse_personality)]
    pub personality: Option<Personality>,

    /// Print supported sites, writers and personalities, then exit.
    #[arg(long)]
    pub list_supported: bool,

    /// Replace chapter files that already exist.
    #[arg(long)]
    pub overwrite: bool,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Delay between requests in seconds (overrides config; default 2).
    #[arg(long)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Page cache database path (overrides config).
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Download every page even if it is cached.
    #[arg(long, conflicts_with = "expire")]
    pub no_cache: bool,

    /// Remove the given URLs from the page cache instead of downloading them.
    #[arg(long)]
    pub expire: bool,

    /// More log output; repeat for more.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output and no progress bar; repeat to silence errors too.
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}

impl Args {
    /// Net verbosity: `-v` counts up, `-q` counts down.
    pub fn verbosity(&self) -> i8 {
        let up = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let down = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        up.saturating_sub(down)
    }
}

fn parse_writer(s: &str) -> Result<WriterKind, String> {
    WriterKind::from_name(s).ok_or_else(|| {
        format!(
            "Invalid --format value: '{}'. Use htmldir, htmlfile, markdown, or json.",
            s
        )
    })
}

fn parse_personality(s: &str) -> Result<Personality, String> {
    Personality::from_name(s).ok_or_else(|| {
        format!(
            "Invalid --personality value: '{}'. Use fanfic2html, fanfic2epub, fanfic2lrf, or fanfic2mobi.",
            s
        )
    })
}

/// --bundle or --format, then config, then htmldir.
fn resolve_writer(args: &Args, config: Option<&Config>) -> Result<WriterKind, CliRunError> {
    if args.bundle {
        return Ok(WriterKind::HtmlFile);
    }
    if let Some(kind) = args.format {
        return Ok(kind);
    }
    match config.and_then(|c| c.format.as_deref()) {
        Some(name) => parse_writer(name)
            .map_err(|e| CliRunError::InvalidInput(format!("In config: {}", e))),
        None => Ok(WriterKind::HtmlDir),
    }
}

/// -P, then the program's own name, then config, then fanfic2html.
fn resolve_personality(
    flag: Option<Personality>,
    program_name: Option<&str>,
    config: Option<&Config>,
) -> Result<Personality, CliRunError> {
    if let Some(p) = flag.or_else(|| program_name.and_then(Personality::from_program_name)) {
        return Ok(p);
    }
    match config.and_then(|c| c.personality.as_deref()) {
        Some(name) => parse_personality(name)
            .map_err(|e| CliRunError::InvalidInput(format!("In config: {}", e))),
        None => Ok(Personality::default()),
    }
}

fn supported_listing(registry: &AdapterRegistry) -> String {
    let mut out = String::from("Sites:\n");
    for adapter in registry.adapters() {
        out.push_str(&format!("  {:<28} {}\n", adapter.name, adapter.url_pattern.as_str()));
    }
    out.push_str("Writers:\n");
    for kind in WriterKind::ALL {
        out.push_str(&format!("  {}\n", kind.name()));
    }
    out.push_str("Personalities:\n");
    for p in Personality::ALL {
        match p.final_ext() {
            Some(ext) => out.push_str(&format!("  {:<28} .{}\n", p.name(), ext)),
            None => out.push_str(&format!("  {}\n", p.name())),
        }
    }
    out
}

fn build_retriever(args: &Args, config: Option<&Config>) -> Result<CachingRetriever, CliRunError> {
    let mut builder = PoliteClient::builder();
    if let Some(secs) = args.delay.or_else(|| config.and_then(|c| c.request_delay_secs)) {
        builder = builder.delay_secs(secs);
    }
    if let Some(secs) = args.timeout.or_else(|| config.and_then(|c| c.timeout_secs)) {
        builder = builder.timeout_secs(secs);
    }
    if let Some(n) = config.and_then(|c| c.retry_count) {
        builder = builder.retry_count(n);
    }
    if let Some(secs) = config.and_then(|c| c.retry_backoff_secs.clone()) {
        builder = builder.retry_backoff_secs(secs);
    }
    if let Some(ua) = args
        .user_agent
        .clone()
        .or_else(|| config.and_then(|c| c.user_agent.clone()))
    {
        builder = builder.user_agent(ua);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::Setup(format!("Failed to create HTTP client: {}", e)))?;

    let use_cache = !args.no_cache && config.and_then(|c| c.use_cache).unwrap_or(true);
    let cache = if use_cache {
        let path = args
            .cache
            .clone()
            .or_else(|| config.and_then(|c| c.cache_path.clone()))
            .or_else(PageCache::default_path)
            .ok_or_else(|| {
                CliRunError::Setup("No cache directory; pass --cache or --no-cache".to_string())
            })?;
        let cache = PageCache::open(&path).map_err(|e| {
            CliRunError::Setup(format!("Cannot open page cache {}: {}", path.display(), e))
        })?;
        info!("Using page cache {}", path.display());
        Some(cache)
    } else {
        None
    };
    Ok(CachingRetriever::new(client, cache))
}

/// Settings shared by every story in one run.
struct Session {
    target: PathBuf,
    writer: WriterKind,
    personality: Personality,
    overwrite: bool,
    show_progress: bool,
}

impl Session {
    fn fetch(
        &self,
        adapter: &SiteAdapter,
        retriever: &mut dyn Retriever,
        url: &Url,
    ) -> Result<Story, FicError> {
        let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
        let progress_cb = |n: u32, total: u32| {
            if total == 0 {
                return;
            }
            let mut state = progress_state.borrow_mut();
            let pb = state.get_or_insert_with(|| {
                let bar = indicatif::ProgressBar::new(u64::from(total));
                let style = indicatif::ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏ ");
                bar.set_style(style);
                bar.enable_steady_tick(Duration::from_millis(80));
                bar
            });
            pb.set_position(u64::from(n));
            pb.set_message(format!("Fetching chapter {}/{}", n, total));
        };

        let checkpoint_cb = |story: &Story, position: u32| {
            let dir = story_dir(&self.target, story);
            let saved = verify_target_dir(&dir, true)
                .and_then(|_| write_chapter_file(story, position, &dir, self.overwrite));
            if let Err(e) = saved {
                warn!(
                    "Could not save chapter {} of \"{}\": {}",
                    position, story.title, e
                );
            }
        };
        let dir_store = HtmlDirStore::new(&self.target);

        let progress: Option<&dyn Fn(u32, u32)> = if self.show_progress {
            Some(&progress_cb)
        } else {
            None
        };
        // Only the directory writer leaves per-chapter files to resume from.
        let resumable = self.writer == WriterKind::HtmlDir;
        let store: Option<&dyn ChapterStore> = if resumable { Some(&dir_store) } else { None };
        let on_checkpoint: Option<&dyn Fn(&Story, u32)> = if resumable {
            Some(&checkpoint_cb)
        } else {
            None
        };
        let options = AssembleOptions {
            progress,
            store,
            on_checkpoint,
        };
        let mut extractor = ChapterExtractor::new(adapter, retriever);
        let result = download(&mut extractor, url, &options);

        if let Some(pb) = progress_state.borrow_mut().take() {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }
        result
    }

    /// Write the story and run the conversion. Returns the final artifact.
    fn save(&self, story: &Story) -> Result<PathBuf, CliRunError> {
        let dir = story_dir(&self.target, story);
        verify_target_dir(&dir, true)?;
        let written = write_story(self.writer, story, &dir, self.overwrite)?;

        let Some(ext) = self.personality.final_ext() else {
            return Ok(written);
        };
        let bundle = if self.writer == WriterKind::HtmlFile {
            written
        } else {
            write_story(WriterKind::HtmlFile, story, &dir, true)?
        };
        let output = bundle_path(&dir, story, ext);
        if postprocess(story, &bundle, &output) {
            Ok(output)
        } else {
            Err(CliRunError::Setup(format!(
                "Conversion of \"{}\" to {} failed",
                story.title,
                self.personality.name()
            )))
        }
    }
}

/// Parse a story argument. A bare path (e.g. a wget-mirrored chapter file) becomes a `file://`
/// URL of the canonical path.
fn story_url(raw: &str) -> Result<Url, CliRunError> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = std::fs::canonicalize(raw)
                .map_err(|e| CliRunError::InvalidInput(format!("Invalid path {}: {}", raw, e)))?;
            Url::from_file_path(&path).map_err(|()| {
                CliRunError::InvalidInput(format!("Invalid path {}", path.display()))
            })
        }
        Err(e) => Err(CliRunError::InvalidInput(format!("Invalid URL {}: {}", raw, e))),
    }
}

fn expire_urls(urls: &[String], retriever: &mut CachingRetriever) -> Result<(), CliRunError> {
    for raw in urls {
        let url = story_url(raw)?;
        let removed = retriever
            .expire(&url)
            .map_err(|e| CliRunError::Setup(e.to_string()))?;
        if removed {
            info!("Expired {}", url);
        } else {
            info!("Not cached: {}", url);
        }
    }
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) when every story was written.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let registry = AdapterRegistry::with_builtin()
        .map_err(|e| CliRunError::Setup(format!("Bad built-in adapter pattern: {}", e)))?;
    if args.list_supported {
        print!("{}", supported_listing(&registry));
        return Ok(());
    }

    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let config = config.as_ref();
    let mut retriever = build_retriever(args, config)?;

    if args.expire {
        return expire_urls(&args.urls, &mut retriever);
    }

    let program_name = std::env::args().next();
    let session = Session {
        target: args
            .target
            .clone()
            .or_else(|| config.and_then(|c| c.target_dir.clone()))
            .unwrap_or_else(|| PathBuf::from(".")),
        writer: resolve_writer(args, config)?,
        personality: resolve_personality(args.personality, program_name.as_deref(), config)?,
        overwrite: args.overwrite || config.and_then(|c| c.overwrite).unwrap_or(false),
        show_progress: args.quiet == 0,
    };
    verify_target_dir(&session.target, true)?;

    let mut failed = 0;
    for raw in &args.urls {
        match download_one(&session, &registry, &mut retriever, raw) {
            Ok(path) => {
                if args.quiet == 0 {
                    eprintln!("Wrote {}", path.display());
                }
            }
            Err(e) => {
                error!("{}: {}", raw, e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(CliRunError::StoriesFailed {
            failed,
            total: args.urls.len(),
        });
    }
    Ok(())
}

fn download_one(
    session: &Session,
    registry: &AdapterRegistry,
    retriever: &mut CachingRetriever,
    raw: &str,
) -> Result<PathBuf, CliRunError> {
    let adapter = registry.resolve(raw).ok_or_else(|| FicError::UnsupportedSite {
        url: raw.to_string(),
    })?;
    let url = story_url(raw)?;
    info!("{}: {}", adapter.name, url);
    let story = session.fetch(adapter, retriever, &url)?;
    session.save(&story)
}
