use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::metrics;

/// Keyed JSON persistence for collection results.
///
/// An entry is valid as soon as its file exists; there is no TTL and no
/// staleness detection. Concurrent runs writing the same key race.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    enabled: bool,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            enabled: true,
        }
    }

    /// A store that never hits and never writes.
    pub fn disabled() -> Self {
        Self {
            root: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Keys are relative file names and may contain `/` sub-directories.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty() && *part != "..")
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.enabled && fs::metadata(self.entry_path(key)).await.is_ok()
    }

    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(key);
        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!(target: "cache", path = %path.display(), "cache hit");
                    metrics::record_cache_event("hit");
                    Some(value)
                }
                Err(err) => {
                    warn!(target: "cache", %err, path = %path.display(), "failed to parse cache entry");
                    metrics::record_cache_event("error");
                    None
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                metrics::record_cache_event("miss");
                None
            }
            Err(err) => {
                warn!(target: "cache", %err, path = %path.display(), "failed to read cache entry");
                metrics::record_cache_event("error");
                None
            }
        }
    }

    /// Writes never fail the caller; errors are logged.
    pub async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if !self.enabled {
            return;
        }
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent).await {
                warn!(target: "cache", %err, path = %parent.display(), "failed to create cache directory");
                return;
            }
        }
        match serde_json::to_vec_pretty(value) {
            Ok(payload) => {
                if let Err(err) = write_atomic(&path, &payload).await {
                    warn!(target: "cache", %err, path = %path.display(), "failed to write cache entry");
                    metrics::record_cache_event("error");
                } else {
                    debug!(target: "cache", path = %path.display(), "cache store");
                    metrics::record_cache_event("store");
                }
            }
            Err(err) => warn!(target: "cache", %err, path = %path.display(), "failed to serialize cache entry"),
        }
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.flush().await?;
    fs::rename(tmp, path).await
}

/// File-name-safe form of a display label.
pub fn sanitize_file_stem(label: &str) -> String {
    label
        .chars()
        .map(|ch| match ch {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn store_then_load_under_subdirectory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheStore::new(dir.path());
        assert!(!cache.contains("taxonomy/a.json").await);
        cache.store("taxonomy/a.json", &json!({"k": [1, 2]})).await;
        assert!(cache.contains("taxonomy/a.json").await);
        let loaded: serde_json::Value = cache.load("taxonomy/a.json").await.expect("hit");
        assert_eq!(loaded, json!({"k": [1, 2]}));
        assert!(!dir.path().join("taxonomy/a.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("bad.json"), b"{not json").expect("write");
        let cache = CacheStore::new(dir.path());
        assert!(cache.contains("bad.json").await);
        assert!(cache.load::<serde_json::Value>("bad.json").await.is_none());
    }

    #[tokio::test]
    async fn disabled_store_never_hits() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("x.json"), b"[]").expect("write");
        let cache = CacheStore::new(dir.path()).with_enabled(false);
        assert!(!cache.contains("x.json").await);
        assert!(cache.load::<Vec<u8>>("x.json").await.is_none());
    }

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_file_stem(r#"农/林:牧*渔?"#), "农_林_牧_渔_");
        assert_eq!(sanitize_file_stem("制造业"), "制造业");
    }

    #[test]
    fn entry_path_ignores_parent_segments() {
        let cache = CacheStore::new("/tmp/c");
        assert_eq!(
            cache.entry_path("../taxonomy//x.json"),
            PathBuf::from("/tmp/c/taxonomy/x.json")
        );
    }
}
