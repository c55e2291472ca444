//! fanfic2ebook: downloads serialized fan fiction, strips the site templating from each chapter,
//! and writes the story in a form eBook converters accept.

pub mod adapter;
pub mod assemble;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod markup;
pub mod model;
pub mod postprocess;
pub mod retrieval;
pub mod sanitize;
pub mod writer;

// Re-exports for CLI and consumers.
pub use adapter::{AdapterRegistry, SiteAdapter};
pub use assemble::{download, fill_missing, AssembleOptions, ChapterSource, ChapterStore};
pub use error::FicError;
pub use extract::{extract, ChapterExtractor, ExtractedChapter};
pub use model::{Chapter, ModelError, Story};
pub use postprocess::Personality;
pub use retrieval::{
    CacheOpenError, CachingRetriever, Page, PageCache, PoliteClient, PoliteClientBuilder,
    RetrievalError, Retriever,
};
pub use writer::{HtmlDirStore, WriteError, WriterKind};
