//! Catalog data provider: ordered `{code, image}` records per catalog key,
//! fetched from a published spreadsheet with a local cache fallback.

pub mod cache;
pub mod sheet;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::Profile;
use cache::CatalogCache;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub code: String,
    pub image: String,
}

impl CatalogItem {
    pub fn new(code: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            image: image.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no sheet url configured for catalog '{0}'")]
    Unconfigured(String),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: ureq::Error,
    },
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed sheet: {0}")]
    Malformed(String),
    #[error("sheet has no usable rows")]
    Empty,
}

/// Anything that can hand out a catalog. Never fails: a source that cannot
/// produce data returns an empty sequence.
pub trait CatalogSource {
    fn fetch_catalog(&self, key: &str) -> Vec<CatalogItem>;
}

/// Fixed in-memory catalogs.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    catalogs: BTreeMap<String, Vec<CatalogItem>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, items: Vec<CatalogItem>) -> Self {
        self.catalogs.insert(key.to_string(), items);
        self
    }
}

impl CatalogSource for StaticCatalog {
    fn fetch_catalog(&self, key: &str) -> Vec<CatalogItem> {
        self.catalogs.get(key).cloned().unwrap_or_default()
    }
}

/// Published-CSV source with cache fallback.
pub struct SheetCatalog {
    urls: BTreeMap<String, String>,
    api_key: String,
    cache: CatalogCache,
    agent: ureq::Agent,
}

impl SheetCatalog {
    pub fn new(urls: BTreeMap<String, String>, api_key: String, cache: CatalogCache) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(20)))
            .build()
            .into();
        Self {
            urls,
            api_key,
            cache,
            agent,
        }
    }

    pub fn from_profile(profile: &Profile, cache_dir: PathBuf) -> Self {
        Self::new(
            profile.catalogs.clone(),
            profile.drive_api_key(),
            CatalogCache::new(cache_dir),
        )
    }

    fn download(&self, key: &str) -> Result<String, CatalogError> {
        let url = self
            .urls
            .get(key)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| CatalogError::Unconfigured(key.to_string()))?;
        let http = |source| CatalogError::Http {
            url: url.clone(),
            source,
        };
        let mut resp = self.agent.get(url.as_str()).call().map_err(http)?;
        resp.body_mut().read_to_string().map_err(http)
    }

    fn fetch_fresh(&self, key: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        let text = self.download(key)?;
        let items = sheet::parse_items(&text, &self.api_key)?;
        if items.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(items)
    }
}

impl CatalogSource for SheetCatalog {
    fn fetch_catalog(&self, key: &str) -> Vec<CatalogItem> {
        match self.fetch_fresh(key) {
            Ok(items) => {
                if let Err(e) = self.cache.store(key, &items) {
                    warn!("catalog {key}: failed to update cache: {e}");
                }
                info!("catalog {key}: updated from sheet, {} item(s)", items.len());
                items
            }
            Err(e) => {
                warn!("catalog {key}: {e}; using cache");
                let cached = self.cache.load(key);
                info!("catalog {key}: {} item(s) from cache", cached.len());
                cached
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_key_falls_back_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path().to_path_buf());
        let items = vec![CatalogItem::new("A1", "https://img.invalid/a1.jpg")];
        cache.store("catalog1", &items).unwrap();

        let src = SheetCatalog::new(BTreeMap::new(), String::new(), cache);
        assert_eq!(src.fetch_catalog("catalog1"), items);
        assert!(src.fetch_catalog("catalog2").is_empty());
    }

    #[test]
    fn static_source_serves_known_keys() {
        let src = StaticCatalog::new().with("k", vec![CatalogItem::new("X", "x.png")]);
        assert_eq!(src.fetch_catalog("k").len(), 1);
        assert!(src.fetch_catalog("other").is_empty());
    }
}
