//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_INDEX__BACKEND=lance`). The merged tree is extracted into [`Settings`],
//! an immutable value handed to every component constructor.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        Self::load_for_env(path, None)
    }

    /// Load `path` plus the overlay for `env_name` (or `RUST_ENV`, default `dev`).
    /// Missing files contribute nothing; defaults always apply.
    pub fn load_for_env(path: &Path, env_name: Option<&str>) -> anyhow::Result<Self> {
        let env_name = match env_name {
            Some(name) => name.to_string(),
            None => env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()),
        };
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir })
    }

    pub fn from_figment(figment: Figment, base_dir: impl Into<PathBuf>) -> Self {
        Self { figment, base_dir: base_dir.into() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract, validate and path-resolve the typed settings.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to parse configuration: {}", e))?;
        settings.validate()?;
        Ok(settings.resolve_paths(&self.base_dir))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub index: IndexSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("data"), cache_dir: PathBuf::from("cache") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `bge-m3` loads the local XLM-RoBERTa weights; `hash` is the model-free hashing embedder.
    pub model: String,
    pub model_dir: Option<PathBuf>,
    pub max_len: usize,
    pub hash_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "bge-m3".to_string(),
            model_dir: Some(PathBuf::from("models/bge-m3")),
            max_len: 256,
            hash_dim: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Environment variable consulted for the credential when `api_key` is unset.
    pub api_key_env: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
        }
    }
}

impl LlmSettings {
    /// Resolve the provider credential. Read on first use, never at startup.
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        match env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(Error::Configuration(format!(
                "{} not found in environment variables",
                self.api_key_env
            ))),
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Backend name; validated when the index manager is constructed.
    pub backend: String,
    pub path: PathBuf,
    /// Loading a persisted index is an explicit opt-in.
    pub trust_persisted: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "flat".to_string(),
            path: PathBuf::from("cache/vector_store"),
            trust_persisted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheSettings {
    /// Fold the answer-affecting settings into every cache key.
    pub scope_to_config: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::Configuration("retrieval.top_k must be positive".to_string()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::Configuration("llm.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Expand `~`/`${VAR}` in every path and anchor relative ones at `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        self.data.data_dir = resolve_with_base(base, self.data.data_dir.to_string_lossy());
        self.data.cache_dir = resolve_with_base(base, self.data.cache_dir.to_string_lossy());
        self.index.path = resolve_with_base(base, self.index.path.to_string_lossy());
        self.embedding.model_dir = self
            .embedding
            .model_dir
            .map(|dir| resolve_with_base(base, dir.to_string_lossy()));
        self
    }

    /// Identifies the settings that change what an answer would be.
    pub fn fingerprint(&self) -> String {
        format!(
            "llm={};embedding={};backend={};top_k={};chunking={}/{}",
            self.llm.model,
            self.embedding.model,
            self.index.backend.to_ascii_lowercase(),
            self.retrieval.top_k,
            self.chunking.chunk_size,
            self.chunking.chunk_overlap
        )
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_reference_values() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.index.backend, "flat");
        assert_eq!(settings.llm.model, "gpt-3.5-turbo");
        assert!(!settings.index.trust_persisted);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults_and_paths_resolve() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [index]
            backend = "lance"
            path = "store"
            [retrieval]
            top_k = 7
            "#,
        )
        .unwrap();

        let settings = Config::load_for_env(&path, Some("none")).unwrap().settings().unwrap();
        assert_eq!(settings.index.backend, "lance");
        assert_eq!(settings.retrieval.top_k, 7);
        assert_eq!(settings.index.path, tmp.path().join("store"));
        assert_eq!(settings.data.cache_dir, tmp.path().join("cache"));
        assert_eq!(settings.chunking.chunk_size, 1000, "untouched sections keep defaults");
    }

    #[test]
    fn env_overlay_file_is_merged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[chunking]\nchunk_size = 500\n").unwrap();
        fs::write(tmp.path().join("config.prod.toml"), "[chunking]\nchunk_overlap = 50\n").unwrap();

        let settings = Config::load_for_env(&path, Some("prod")).unwrap().settings().unwrap();
        assert_eq!(settings.chunking, ChunkingSettings { chunk_size: 500, chunk_overlap: 50 });
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

        let err = Config::load_for_env(&path, Some("none")).unwrap().settings().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"), "got: {err}");
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let llm = LlmSettings {
            api_key_env: "RAGCHAT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmSettings::default()
        };
        assert!(matches!(llm.api_key(), Err(Error::Configuration(_))));

        let llm = LlmSettings { api_key: Some("sk-test".to_string()), ..llm };
        assert_eq!(llm.api_key().unwrap(), "sk-test");
    }

    #[test]
    fn fingerprint_tracks_answer_affecting_settings() {
        let base = Settings::default();
        let mut other = base.clone();
        other.retrieval.top_k = 5;
        assert_ne!(base.fingerprint(), other.fingerprint());
        assert_eq!(base.fingerprint(), Settings::default().fingerprint());
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/srv/app");
        assert_eq!(resolve_with_base(base, "/var/data"), PathBuf::from("/var/data"));
        assert_eq!(resolve_with_base(base, "data"), PathBuf::from("/srv/app/data"));
    }
}
