//! Optional config file loading. Search order: ./fanfic2ebook.toml, then
//! $XDG_CONFIG_HOME/fanfic2ebook/config.toml (or ~/.config/fanfic2ebook/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

const LOCAL_FILE: &str = "fanfic2ebook.toml";

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Directory stories are written under when -t is not set. Relative to CWD.
    pub target_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Delay in seconds between requests.
    pub request_delay_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    /// HTTP attempts per request for transient failures (default 3).
    pub retry_count: Option<u32>,
    /// Seconds to wait before each retry, e.g. [1, 2].
    pub retry_backoff_secs: Option<Vec<u64>>,
    /// Page cache database. Default: <user cache dir>/fanfic2ebook/http_permanent.sqlite3.
    pub cache_path: Option<PathBuf>,
    /// Set to false to always download.
    pub use_cache: Option<bool>,
    /// Writer: htmldir, htmlfile, markdown or json.
    pub format: Option<String>,
    /// fanfic2html, fanfic2epub, fanfic2lrf or fanfic2mobi.
    pub personality: Option<String>,
    /// Replace chapter files that already exist.
    pub overwrite: Option<bool>,
}

/// Search order: (1) ./fanfic2ebook.toml, (2) $XDG_CONFIG_HOME/fanfic2ebook/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join(LOCAL_FILE)];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("fanfic2ebook").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return load_file(path).map(Some);
        }
    }
    Ok(None)
}

fn load_file(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
