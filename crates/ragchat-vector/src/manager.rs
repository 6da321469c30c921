//! Index lifecycle: create from chunks, persist, reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use ragchat_core::config::IndexSettings;
use ragchat_core::error::{Error, Result};
use ragchat_core::traits::Embedder;
use ragchat_core::types::{Chunk, SearchHit};

use crate::backend::IndexBackend;
use crate::flat::FlatIndex;
use crate::lance::LanceIndex;
use crate::manifest::{Manifest, MANIFEST_FILE};

const EMBED_BATCH: usize = 64;
const LANCE_PREFIX: &str = "lance-";

/// A built index of one of the supported backends.
#[derive(Debug, Clone)]
pub enum VectorIndex {
    Flat(FlatIndex),
    Lance(LanceIndex),
}

impl VectorIndex {
    pub fn backend(&self) -> IndexBackend {
        match self {
            VectorIndex::Flat(_) => IndexBackend::Flat,
            VectorIndex::Lance(_) => IndexBackend::Lance,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VectorIndex::Flat(f) => f.len(),
            VectorIndex::Lance(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        match self {
            VectorIndex::Flat(f) => f.dim(),
            VectorIndex::Lance(l) => l.dim(),
        }
    }

    pub fn embedder_id(&self) -> &str {
        match self {
            VectorIndex::Flat(f) => f.embedder_id(),
            VectorIndex::Lance(l) => l.embedder_id(),
        }
    }

    /// Top `k` hits for an already-embedded query, best first.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim() {
            return Err(Error::embedding(format!("query dim {} != index dim {}", query.len(), self.dim())));
        }
        match self {
            VectorIndex::Flat(f) => Ok(f.search(query, k)),
            VectorIndex::Lance(l) => l.search(query, k).await,
        }
    }
}

pub struct IndexManager {
    backend: IndexBackend,
    path: PathBuf,
    trust_persisted: bool,
    embedder: Arc<dyn Embedder>,
}

impl IndexManager {
    /// Fails with `UnsupportedBackend` for any backend name other than `flat` or `lance`.
    pub fn new(settings: &IndexSettings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let backend: IndexBackend = settings.backend.parse()?;
        Ok(Self { backend, path: settings.path.clone(), trust_persisted: settings.trust_persisted, embedder })
    }

    pub fn backend(&self) -> IndexBackend {
        self.backend
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let v = self.embedder.embed_one(query).map_err(Error::embedding)?;
        check_dim(&v, self.embedder.dim())?;
        Ok(v)
    }

    /// Embed every chunk and build a fresh index of the configured backend.
    pub async fn create(&self, chunks: &[Chunk]) -> Result<VectorIndex> {
        let vectors = self.embed_chunks(chunks)?;
        let dim = self.embedder.dim();
        let embedder_id = self.embedder.model_id();
        match self.backend {
            IndexBackend::Flat => Ok(VectorIndex::Flat(FlatIndex::new(chunks.to_vec(), vectors, dim, embedder_id)?)),
            IndexBackend::Lance => {
                // The persisted table stays untouched until `save` switches the manifest over.
                let dir = self.next_lance_dir();
                match LanceIndex::create(&dir, chunks, &vectors, dim, embedder_id).await {
                    Ok(lance) => Ok(VectorIndex::Lance(lance)),
                    Err(e) => {
                        if dir.exists() {
                            let _ = fs::remove_dir_all(&dir);
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    /// Read the persisted manifest, if any, without trusting or opening the index.
    pub fn manifest(&self) -> Result<Option<Manifest>> {
        if !Manifest::path_in(&self.path).is_file() {
            return Ok(None);
        }
        Manifest::read(&self.path).map(Some)
    }

    /// `Ok(None)` when nothing is persisted at the configured path.
    pub async fn load(&self) -> Result<Option<VectorIndex>> {
        if !self.path.exists() || !Manifest::path_in(&self.path).is_file() {
            info!("No persisted index at {}", self.path.display());
            return Ok(None);
        }
        if !self.trust_persisted {
            warn!("Not loading persisted index at {}: index.trust_persisted is false", self.path.display());
            return Err(Error::UntrustedIndex(self.path.clone()));
        }
        info!("Loading persisted index at {} (index.trust_persisted = true)", self.path.display());

        let manifest = Manifest::read(&self.path)?;
        let mismatch = || Error::BackendMismatch {
            path: self.path.clone(),
            expected: self.backend.to_string(),
            found: manifest.backend.clone(),
        };
        let found: IndexBackend = manifest.backend.parse().map_err(|_| mismatch())?;
        if found != self.backend {
            return Err(mismatch());
        }
        if manifest.embedder_id != self.embedder.model_id() || manifest.dim != self.embedder.dim() {
            return Err(Error::EmbedderMismatch {
                path: self.path.clone(),
                expected: self.embedder.model_id().to_string(),
                found: manifest.embedder_id.clone(),
            });
        }

        let index = match self.backend {
            IndexBackend::Flat => VectorIndex::Flat(FlatIndex::read_from(
                &self.path,
                manifest.dim,
                manifest.chunk_count,
                &manifest.embedder_id,
            )?),
            IndexBackend::Lance => {
                let table_dir = manifest
                    .table_dir
                    .as_deref()
                    .ok_or_else(|| Error::storage(format!("manifest at {} names no table directory", self.path.display())))?;
                let lance = LanceIndex::open(&self.path.join(table_dir), manifest.dim, &manifest.embedder_id).await?;
                if lance.len() != manifest.chunk_count {
                    return Err(Error::storage(format!(
                        "manifest at {} lists {} chunks but the table holds {}",
                        self.path.display(),
                        manifest.chunk_count,
                        lance.len()
                    )));
                }
                VectorIndex::Lance(lance)
            }
        };
        info!("Loaded {} index with {} chunks", self.backend, index.len());
        Ok(Some(index))
    }

    pub async fn save(&self, index: &VectorIndex) -> Result<()> {
        if index.backend() != self.backend {
            return Err(Error::BackendMismatch {
                path: self.path.clone(),
                expected: self.backend.to_string(),
                found: index.backend().to_string(),
            });
        }
        let manifest = Manifest::new(self.backend.as_str(), index.embedder_id(), index.dim(), index.len());
        match index {
            VectorIndex::Flat(flat) => self.save_flat(flat, &manifest)?,
            VectorIndex::Lance(lance) => self.save_lance(lance, manifest)?,
        }
        info!("Saved {} index with {} chunks to {}", self.backend, index.len(), self.path.display());
        Ok(())
    }

    /// Point the manifest at the new table, then drop everything else under the index path.
    ///
    /// Callers serving queries from a previously loaded index must stop doing so first:
    /// its table directory is removed here.
    fn save_lance(&self, lance: &LanceIndex, manifest: Manifest) -> Result<()> {
        let name = match lance.dir().file_name() {
            Some(name) if lance.dir().parent() == Some(self.path.as_path()) => name.to_string_lossy().into_owned(),
            _ => {
                return Err(Error::storage(format!(
                    "LanceDB index lives at {}, cannot persist it at {}",
                    lance.dir().display(),
                    self.path.display()
                )))
            }
        };
        manifest.with_table_dir(name.clone()).write(&self.path)?;

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if file_name == name.as_str() || file_name == MANIFEST_FILE {
                continue;
            }
            let stale = entry.path();
            debug!("Removing stale index data {}", stale.display());
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&stale)?;
            } else {
                fs::remove_file(&stale)?;
            }
        }
        Ok(())
    }

    /// A table directory name under the index path that is not in use yet.
    fn next_lance_dir(&self) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        let mut n = 0u32;
        loop {
            let dir = self.path.join(format!("{LANCE_PREFIX}{stamp}-{n}"));
            if !dir.exists() {
                return dir;
            }
            n += 1;
        }
    }

    /// Write into a sibling staging directory, then swap it into place.
    fn save_flat(&self, flat: &FlatIndex, manifest: &Manifest) -> Result<()> {
        let staging = sibling(&self.path, "staging");
        let previous = sibling(&self.path, "previous");
        for dir in [&staging, &previous] {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }

        flat.write_to(&staging)?;
        manifest.write(&staging)?;

        if self.path.exists() {
            fs::rename(&self.path, &previous)?;
        }
        if let Err(e) = fs::rename(&staging, &self.path) {
            if previous.exists() {
                let _ = fs::rename(&previous, &self.path);
            }
            return Err(e.into());
        }
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        Ok(())
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        info!("Embedding {} chunks with {}", chunks.len(), self.embedder.model_id());
        let pb = ProgressBar::new(chunks.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let dim = self.embedder.dim();
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = self.embedder.embed_batch(&texts).map_err(Error::embedding)?;
            if embedded.len() != texts.len() {
                return Err(Error::embedding(format!("embedder returned {} vectors for {} texts", embedded.len(), texts.len())));
            }
            for v in &embedded {
                check_dim(v, dim)?;
            }
            vectors.extend(embedded);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");
        Ok(vectors)
    }
}

fn check_dim(v: &[f32], dim: usize) -> Result<()> {
    if v.len() != dim {
        return Err(Error::embedding(format!("embedding dim {} != expected {}", v.len(), dim)));
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "index".to_string());
    path.with_file_name(format!(".{name}.{suffix}"))
}
