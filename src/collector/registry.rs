//! Scraper registry: the compiled-in scrapers and their default enablement.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::collector::Scraper;
use crate::collector::ping::PingScraper;

/// Errors raised while building or resolving the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Scraper names must be non-empty.
    #[error("scraper name must not be empty")]
    EmptyName,

    /// Two scrapers share a name.
    #[error("scraper '{0}' is already registered")]
    Duplicate(String),

    /// An override names a scraper that does not exist.
    #[error("unknown scraper '{0}'")]
    UnknownScraper(String),
}

struct RegistryEntry {
    scraper: Arc<dyn Scraper>,
    enabled_by_default: bool,
}

/// All known scrapers with their default enabled flag.
///
/// Built once at startup and resolved into an [`EnabledScrapers`] set; no
/// registration happens after that.
#[derive(Default)]
pub struct ScraperRegistry {
    entries: Vec<RegistryEntry>,
}

impl std::fmt::Debug for ScraperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|e| (e.scraper.name(), e.enabled_by_default)),
            )
            .finish()
    }
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in scraper.
    pub fn builtin(namespace: &str) -> Self {
        let mut registry = Self::new();
        registry.entries.push(RegistryEntry {
            scraper: Arc::new(PingScraper::new(namespace)),
            enabled_by_default: true,
        });
        registry
    }

    /// Add a scraper.
    ///
    /// # Errors
    /// Returns `RegistryError` if the name is empty or already taken.
    pub fn register(
        &mut self,
        scraper: impl Scraper,
        enabled_by_default: bool,
    ) -> Result<(), RegistryError> {
        let name = scraper.name();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.iter().any(|e| e.scraper.name() == name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        self.entries.push(RegistryEntry {
            scraper: Arc::new(scraper),
            enabled_by_default,
        });
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, scraper: impl Scraper, enabled_by_default: bool) -> Result<Self, RegistryError> {
        self.register(scraper, enabled_by_default)?;
        Ok(self)
    }

    /// `(name, help, enabled_by_default)` for every registered scraper.
    pub fn list(&self) -> Vec<(&str, &str, bool)> {
        self.entries
            .iter()
            .map(|e| (e.scraper.name(), e.scraper.help(), e.enabled_by_default))
            .collect()
    }

    /// Apply per-scraper overrides and freeze the enabled set.
    ///
    /// # Errors
    /// Returns `RegistryError::UnknownScraper` if an override names a scraper
    /// that is not registered.
    pub fn resolve(&self, overrides: &BTreeMap<String, bool>) -> Result<EnabledScrapers, RegistryError> {
        if let Some(unknown) = overrides
            .keys()
            .find(|name| !self.entries.iter().any(|e| e.scraper.name() == name.as_str()))
        {
            return Err(RegistryError::UnknownScraper(unknown.clone()));
        }

        let scrapers = self
            .entries
            .iter()
            .filter(|e| {
                overrides
                    .get(e.scraper.name())
                    .copied()
                    .unwrap_or(e.enabled_by_default)
            })
            .map(|e| Arc::clone(&e.scraper))
            .collect();

        Ok(EnabledScrapers { scrapers })
    }
}

/// Immutable set of scrapers enabled for the life of the process.
#[derive(Clone, Default)]
pub struct EnabledScrapers {
    scrapers: Arc<[Arc<dyn Scraper>]>,
}

impl std::fmt::Debug for EnabledScrapers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl EnabledScrapers {
    pub fn names(&self) -> Vec<&str> {
        self.scrapers.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    /// Scrapers to run for a request asking for `requested`.
    ///
    /// Runs exactly the enabled scrapers named in `requested`. When nothing
    /// was requested, or no requested name matches an enabled scraper, the
    /// whole enabled set runs instead.
    pub fn filter<S: AsRef<str>>(&self, requested: &[S]) -> Vec<Arc<dyn Scraper>> {
        let wanted: HashSet<&str> = requested.iter().map(AsRef::as_ref).collect();
        let filtered: Vec<_> = self
            .scrapers
            .iter()
            .filter(|s| wanted.contains(s.name()))
            .cloned()
            .collect();

        if filtered.is_empty() {
            self.scrapers.to_vec()
        } else {
            filtered
        }
    }
}
