//! JSON source loading and record normalization.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::splitter::TextSplitter;
use crate::types::{Chunk, Document, Meta, RawRecord};

/// Keys searched, in order, for a record's text. Matched case-insensitively.
const TEXT_FIELDS: &[&str] = &["text", "content"];

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub path: PathBuf,
    pub records: Vec<RawRecord>,
}

/// Everything produced by one ingestion pass.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub sources: usize,
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
}

pub struct DocumentLoader {
    splitter: TextSplitter,
}

impl DocumentLoader {
    pub fn new(chunking: ChunkingSettings) -> Result<Self> {
        Ok(Self { splitter: TextSplitter::new(chunking)? })
    }

    /// Parse one JSON file. An object becomes a one-element list, an array is kept as-is.
    pub fn load(&self, source: &Path) -> Result<Vec<RawRecord>> {
        let malformed = |reason: String| Error::MalformedInput { path: source.to_path_buf(), reason };
        let raw = fs::read_to_string(source).map_err(|e| malformed(e.to_string()))?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
        match value {
            Value::Array(items) => Ok(items),
            obj @ Value::Object(_) => Ok(vec![obj]),
            other => Err(malformed(format!(
                "top-level value must be an object or an array, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Load a file, or every `*.json` file beneath a directory in sorted order.
    pub fn load_path(&self, path: &Path) -> Result<Vec<Source>> {
        if path.is_dir() {
            let files = list_json_files(path);
            if files.is_empty() {
                return Err(Error::MalformedInput {
                    path: path.to_path_buf(),
                    reason: "no .json files found".to_string(),
                });
            }
            files
                .into_iter()
                .map(|file| {
                    let name = source_name(file.strip_prefix(path).unwrap_or(&file));
                    let records = self.load(&file)?;
                    Ok(Source { name, path: file, records })
                })
                .collect()
        } else {
            let records = self.load(path)?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "source".to_string());
            Ok(vec![Source { name, path: path.to_path_buf(), records }])
        }
    }

    /// Turn raw records into documents. Non-object records are skipped.
    pub fn normalize(&self, records: &[RawRecord], source_name: &str) -> Vec<Document> {
        records
            .iter()
            .enumerate()
            .filter_map(|(ordinal, record)| {
                let Value::Object(map) = record else {
                    warn!(source = source_name, ordinal, kind = json_kind(record), "skipping non-object record");
                    return None;
                };

                let content = TEXT_FIELDS
                    .iter()
                    .find_map(|field| {
                        map.iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(field))
                            .and_then(|(_, v)| text_of(v))
                    })
                    .unwrap_or_else(|| record.to_string());

                let metadata: Meta = map
                    .iter()
                    .filter(|(k, _)| !TEXT_FIELDS.iter().any(|f| k.eq_ignore_ascii_case(f)))
                    .map(|(k, v)| {
                        let v = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), v)
                    })
                    .collect();

                Some(Document { doc_id: format!("{source_name}#{ordinal}"), content, metadata })
            })
            .collect()
    }

    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        self.splitter.split_documents(documents)
    }

    /// load -> normalize -> split for a file or directory.
    pub fn process_path(&self, path: &Path) -> Result<Corpus> {
        let sources = self.load_path(path)?;
        let mut corpus = Corpus { sources: sources.len(), ..Corpus::default() };
        for (i, source) in sources.iter().enumerate() {
            info!("Processing source {}/{}: {}", i + 1, sources.len(), source.path.display());
            corpus.documents.extend(self.normalize(&source.records, &source.name));
        }
        corpus.chunks = self.split(&corpus.documents);
        info!(
            "Processed {} sources into {} documents and {} chunks",
            corpus.sources,
            corpus.documents.len(),
            corpus.chunks.len()
        );
        Ok(corpus)
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Path without extension, `/`-separated, used as the document id prefix.
fn source_name(path: &Path) -> String {
    let stem = path.with_extension("");
    stem.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn list_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}
