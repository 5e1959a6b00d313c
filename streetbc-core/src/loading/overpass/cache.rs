use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::{CacheSettings, Error};

/// Overpass responses stored as `<blake3 of endpoint and query>.json`
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Returns `None` when caching is disabled
    pub fn from_settings(settings: &CacheSettings) -> Option<Self> {
        settings.enabled.then(|| Self {
            dir: settings.dir.clone(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key(endpoint: &str, query: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(endpoint.as_bytes());
        hasher.update(b"\n");
        hasher.update(query.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Cached response body, if any. Unreadable entries are treated as misses.
    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(body) => {
                debug!("Cache hit: {}", path.display());
                Some(body)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {e}", path.display());
                None
            }
        }
    }

    /// Stores a response body
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the cache directory or file can't be written
    pub fn put(&self, key: &str, body: &str) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let mut file = fs::File::create(&path)?;
        file.write_all(body.as_bytes())?;
        file.sync_all()?;
        debug!("Saved response to cache: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::from_settings(&CacheSettings {
            enabled: true,
            dir: dir.path().join("nested"),
        })
        .unwrap();

        let key = ResponseCache::key("https://example.invalid", "[out:json];");
        assert_eq!(key.len(), 64);
        assert!(cache.get(&key).is_none());

        cache.put(&key, "{\"elements\":[]}").unwrap();
        assert_eq!(cache.get(&key).as_deref(), Some("{\"elements\":[]}"));
    }

    #[test]
    fn key_depends_on_endpoint_and_query() {
        let a = ResponseCache::key("https://a", "q");
        assert_ne!(a, ResponseCache::key("https://b", "q"));
        assert_ne!(a, ResponseCache::key("https://a", "r"));
        assert_eq!(a, ResponseCache::key("https://a", "q"));
    }

    #[test]
    fn disabled_cache_is_none() {
        let settings = CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        };
        assert!(ResponseCache::from_settings(&settings).is_none());
    }
}
