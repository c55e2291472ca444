//! Permanent page cache in SQLite, keyed by normalized URL.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS url_cache (
    id INTEGER PRIMARY KEY NOT NULL,
    url TEXT NOT NULL UNIQUE,
    timestamp INTEGER NOT NULL,
    contents TEXT
);
CREATE INDEX IF NOT EXISTS idx_url_cache_timestamp ON url_cache (timestamp);
";

const CACHE_FILE: &str = "http_permanent.sqlite3";

#[derive(Debug, Error)]
pub enum CacheOpenError {
    #[error("Cannot create cache directory {path}: {source}")]
    Dir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Db(#[from] rusqlite::Error),
}

#[derive(Debug)]
pub struct PageCache {
    conn: Connection,
}

impl PageCache {
    /// Open (creating if needed) the cache database at `path`. The parent directory is created too.
    pub fn open(path: &Path) -> Result<Self, CacheOpenError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| CacheOpenError::Dir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(Self::init(Connection::open(path)?)?)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// `<user cache dir>/fanfic2ebook/http_permanent.sqlite3`, if the platform has a cache dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("fanfic2ebook").join(CACHE_FILE))
    }

    pub fn get(&self, url: &str) -> rusqlite::Result<Option<String>> {
        let contents: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT contents FROM url_cache WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        if contents.is_some() {
            debug!("cache hit: {}", url);
        }
        Ok(contents.flatten())
    }

    /// Store `contents` for `url`, replacing any earlier copy.
    pub fn put(&self, url: &str, contents: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO url_cache (url, timestamp, contents)
             VALUES (?1, strftime('%s', 'now'), ?2)",
            params![url, contents],
        )?;
        Ok(())
    }

    /// Drop `url` from the cache. Returns whether anything was removed.
    pub fn expire(&self, url: &str) -> rusqlite::Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM url_cache WHERE url = ?1", params![url])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_replace_expire() -> rusqlite::Result<()> {
        let cache = PageCache::open_in_memory()?;
        let url = "https://www.fanfiction.net/s/1/1/";
        assert_eq!(cache.get(url)?, None);
        cache.put(url, "<p>one</p>")?;
        assert_eq!(cache.get(url)?.as_deref(), Some("<p>one</p>"));
        cache.put(url, "<p>two</p>")?;
        assert_eq!(cache.get(url)?.as_deref(), Some("<p>two</p>"));
        assert!(cache.expire(url)?);
        assert!(!cache.expire(url)?);
        assert_eq!(cache.get(url)?, None);
        Ok(())
    }

    #[test]
    fn on_disk_cache_persists_between_opens() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join(CACHE_FILE);
        PageCache::open(&path)?.put("https://ficwad.com/story/1", "cached")?;
        let reopened = PageCache::open(&path)?;
        assert_eq!(
            reopened.get("https://ficwad.com/story/1")?.as_deref(),
            Some("cached")
        );
        Ok(())
    }

    #[test]
    fn uncreatable_parent_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory")?;
        let result = PageCache::open(&blocker.join("sub").join(CACHE_FILE));
        match result {
            Err(CacheOpenError::Dir { path, .. }) => assert_eq!(path, blocker.join("sub")),
            other => panic!("expected a directory error, got {:?}", other.map(|_| ())),
        }
        Ok(())
    }
}
