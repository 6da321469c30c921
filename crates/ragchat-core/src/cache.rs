//! File-backed response cache keyed by a BLAKE3 digest of the query.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::Settings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: String,
}

impl CacheEntry {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    scope: Option<String>,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), scope: None }
    }

    /// Fold `scope` into every key, so entries written under another scope are never hit.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let cache = Self::new(&settings.data.cache_dir);
        if settings.cache.scope_to_config {
            cache.with_scope(settings.fingerprint())
        } else {
            cache
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex digest of the exact query bytes. No trimming or case folding.
    pub fn key_for(&self, query: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        if let Some(scope) = &self.scope {
            hasher.update(scope.as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(query.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::cache(format!("read {}: {e}", path.display()))),
        };
        let entry = serde_json::from_slice(&raw)
            .map_err(|e| Error::cache(format!("decode {}: {e}", path.display())))?;
        debug!(key, "cache hit");
        Ok(Some(entry))
    }

    /// Write atomically; an existing entry under `key` is replaced.
    pub fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| Error::cache(format!("create {}: {e}", self.dir.display())))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(Error::cache)?;
        serde_json::to_writer(&mut tmp, entry).map_err(Error::cache)?;
        tmp.flush().map_err(Error::cache)?;
        tmp.persist(&path).map_err(|e| Error::cache(e.error))?;
        debug!(key, "cache write");
        Ok(())
    }

    /// Remove every cache entry file and nothing else. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_files()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::cache(format!("remove {}: {e}", path.display()))),
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entry_files()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if !is_cache_key(key) {
            return Err(Error::cache(format!("invalid cache key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(Error::cache(format!("list {}: {e}", self.dir.display()))),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(Error::cache)?.path();
            let is_entry = path.is_file()
                && path.extension().and_then(|s| s.to_str()) == Some("json")
                && path.file_stem().and_then(|s| s.to_str()).is_some_and(is_cache_key);
            if is_entry {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn is_cache_key(key: &str) -> bool {
    key.len() == 64 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
