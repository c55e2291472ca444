//! Ordered adapter registry. Built once at startup and passed to whoever needs lookup.

use super::{ficwad, ffnet, tth, SiteAdapter};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<SiteAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every shipped adapter, in lookup order.
    pub fn with_builtin() -> Result<Self, regex::Error> {
        let mut registry = Self::new();
        registry.register(ffnet::adapter()?);
        registry.register(ffnet::wget_adapter()?);
        registry.register(tth::adapter()?);
        registry.register(ficwad::adapter()?);
        Ok(registry)
    }

    /// Add `adapter` at the end of the lookup order. An adapter already registered under the
    /// identical pattern is replaced in place, with a warning.
    pub fn register(&mut self, adapter: SiteAdapter) {
        let pattern = adapter.url_pattern.as_str();
        if let Some(existing) = self
            .adapters
            .iter_mut()
            .find(|a| a.url_pattern.as_str() == pattern)
        {
            warn!(
                "adapter pattern {} already registered by {}; replacing with {}",
                pattern, existing.name, adapter.name
            );
            *existing = adapter;
            return;
        }
        debug!("registered adapter {} for {}", adapter.name, pattern);
        self.adapters.push(adapter);
    }

    /// First registered adapter whose pattern matches `url`, or `None` for an unsupported site.
    pub fn resolve(&self, url: &str) -> Option<&SiteAdapter> {
        self.adapters.iter().find(|a| a.handles(url))
    }

    pub fn adapters(&self) -> &[SiteAdapter] {
        &self.adapters
    }
}
