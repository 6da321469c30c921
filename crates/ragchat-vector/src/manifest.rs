//! `manifest.json`: what a persisted index was built with.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use ragchat_core::error::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub backend: String,
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_count: usize,
    pub created_at_ms: i64,
    /// Directory under the index path that holds the table, for backends that keep one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_dir: Option<String>,
}

impl Manifest {
    pub fn new(backend: &str, embedder_id: &str, dim: usize, chunk_count: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            backend: backend.to_string(),
            embedder_id: embedder_id.to_string(),
            dim,
            chunk_count,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
            table_dir: None,
        }
    }

    pub fn with_table_dir(mut self, name: impl Into<String>) -> Self {
        self.table_dir = Some(name.into());
        self
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub fn read(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        let raw = fs::read(&path).map_err(|e| Error::storage(format!("read {}: {e}", path.display())))?;
        let manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|e| Error::storage(format!("decode {}: {e}", path.display())))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::storage(format!(
                "{} has format version {} (supported: {})",
                path.display(),
                manifest.format_version,
                FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }

    /// Write to a temp file in `dir`, then rename over `manifest.json`.
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self).map_err(Error::storage)?;
        tmp.flush()?;
        tmp.persist(Self::path_in(dir)).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.created_at_ms)
    }
}
