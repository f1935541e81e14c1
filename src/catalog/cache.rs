use log::debug;
use std::fs;
use std::path::PathBuf;

use super::{CatalogError, CatalogItem};

const CACHE_KEY_PREFIX: &str = "catalog_cache_";

/// One JSON file per catalog key.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    dir: PathBuf,
}

impl CatalogCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{CACHE_KEY_PREFIX}{key}.json"))
    }

    pub fn store(&self, key: &str, items: &[CatalogItem]) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.dir).map_err(|source| CatalogError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path(key);
        let json = serde_json::to_vec(items)?;
        fs::write(&path, json).map_err(|source| CatalogError::Io { path, source })
    }

    pub fn try_load(&self, key: &str) -> Result<Option<Vec<CatalogItem>>, CatalogError> {
        let path = self.path(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CatalogError::Io { path, source }),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Cached records, or empty on a miss or an unreadable entry.
    pub fn load(&self, key: &str) -> Vec<CatalogItem> {
        match self.try_load(key) {
            Ok(Some(items)) => items,
            Ok(None) => {
                debug!("cache: no entry for {key}");
                Vec::new()
            }
            Err(e) => {
                debug!("cache: unreadable entry for {key}: {e}");
                Vec::new()
            }
        }
    }
}
