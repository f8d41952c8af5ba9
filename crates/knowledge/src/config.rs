//! Knowledge base configuration management.

use crate::embeddings::EmbeddingConfig;
use ragchat_core::config::STATE_DIR;
use ragchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default knowledge base name used by the CLI.
pub const DEFAULT_BASE: &str = "default";

/// How documents are split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed character window with overlap
    #[default]
    Window,
    /// Paragraph, sentence, then word boundaries via `text-splitter`
    Recursive,
}

/// How index entry ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Fresh UUID per entry; re-ingestion appends
    #[default]
    Random,
    /// Derived from filename, chunk index and text; re-ingestion overwrites
    Content,
}

/// Vector index backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Pinecone,
    Weaviate,
    Lancedb,
    Memory,
}

impl VectorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackend::Pinecone => "pinecone",
            VectorBackend::Weaviate => "weaviate",
            VectorBackend::Lancedb => "lancedb",
            VectorBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selection and backend-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackend,

    /// Pinecone data-plane host; resolved through the control plane when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_host: Option<String>,

    /// Pinecone control-plane URL
    #[serde(default = "default_pinecone_api_url")]
    pub pinecone_api_url: String,

    /// Weaviate base URL; falls back to `WEAVIATE_URL`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weaviate_url: Option<String>,

    /// Weaviate class holding the chunks
    #[serde(default = "default_weaviate_class")]
    pub weaviate_class: String,

    /// Weaviate property holding the chunk text
    #[serde(default = "default_weaviate_text_key")]
    pub weaviate_text_key: String,

    /// LanceDB directory; `.ragchat/index` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lancedb_path: Option<PathBuf>,
}

fn default_pinecone_api_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_weaviate_class() -> String {
    "Document".to_string()
}

fn default_weaviate_text_key() -> String {
    "chunkText".to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            pinecone_host: None,
            pinecone_api_url: default_pinecone_api_url(),
            weaviate_url: None,
            weaviate_class: default_weaviate_class(),
            weaviate_text_key: default_weaviate_text_key(),
            lancedb_path: None,
        }
    }
}

/// Configuration for a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    #[serde(default)]
    pub name: String,

    /// Target vector index
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Partition of the index holding this dataset
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Document ingested when no path is given
    #[serde(default = "default_document_path")]
    pub document_path: PathBuf,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default)]
    pub chunk_strategy: ChunkStrategy,

    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Character budget for the rendered prompt
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: u32,

    /// Rewrite follow-up questions into standalone ones before retrieval
    #[serde(default)]
    pub condense_question: bool,

    #[serde(default)]
    pub id_strategy: IdStrategy,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,
}

fn default_index_name() -> String {
    "concur-index".to_string()
}

fn default_namespace() -> String {
    "demo-html".to_string()
}

fn default_document_path() -> PathBuf {
    PathBuf::from("docs/Exp_SG_Account_Codes-jp.txt")
}

fn default_chunk_size() -> u32 {
    500
}

fn default_chunk_overlap() -> u32 {
    50
}

fn default_top_k() -> u32 {
    3
}

fn default_max_prompt_chars() -> u32 {
    12_000
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BASE.to_string(),
            index_name: default_index_name(),
            namespace: default_namespace(),
            document_path: default_document_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            chunk_strategy: ChunkStrategy::default(),
            top_k: default_top_k(),
            max_prompt_chars: default_max_prompt_chars(),
            condense_question: false,
            id_strategy: IdStrategy::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
        }
    }
}

impl KnowledgeBaseConfig {
    /// Check the configuration and the credentials it needs.
    ///
    /// Called once at startup; every error here is fatal.
    pub fn validate(&self, credentials: &Credentials) -> AppResult<()> {
        if self.index_name.trim().is_empty() {
            return Err(AppError::Config("index_name cannot be empty".to_string()));
        }

        if self.namespace.trim().is_empty() {
            return Err(AppError::Config("namespace cannot be empty".to_string()));
        }

        if self.chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be greater than 0".to_string()));
        }

        if self.max_prompt_chars == 0 {
            return Err(AppError::Config(
                "max_prompt_chars must be greater than 0".to_string(),
            ));
        }

        self.embedding.validate()?;

        if self.embedding.provider == "openai" && credentials.openai_api_key.is_none() {
            return Err(AppError::Config(
                "OPENAI_API_KEY is required for the openai embedding provider".to_string(),
            ));
        }

        match self.vector_store.backend {
            VectorBackend::Pinecone => {
                if credentials.pinecone_api_key.is_none() {
                    return Err(AppError::Config(
                        "PINECONE_API_KEY is required for the pinecone backend".to_string(),
                    ));
                }
            }
            VectorBackend::Weaviate => {
                if self.weaviate_url(credentials).is_none() {
                    return Err(AppError::Config(
                        "WEAVIATE_URL (or vector_store.weaviate_url) is required for the weaviate backend"
                            .to_string(),
                    ));
                }
            }
            VectorBackend::Lancedb | VectorBackend::Memory => {}
        }

        Ok(())
    }

    /// Document path resolved against the workspace.
    pub fn resolve_document_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.document_path)
    }

    /// LanceDB directory resolved against the workspace.
    pub fn lancedb_path(&self, workspace: &Path) -> PathBuf {
        match &self.vector_store.lancedb_path {
            Some(path) => resolve(workspace, path),
            None => workspace.join(STATE_DIR).join("index"),
        }
    }

    /// Pinecone data-plane host from config, then `PINECONE_HOST`.
    pub fn pinecone_host(&self, credentials: &Credentials) -> Option<String> {
        self.vector_store
            .pinecone_host
            .clone()
            .or_else(|| credentials.pinecone_host.clone())
    }

    /// Weaviate URL from config, then `WEAVIATE_URL`.
    pub fn weaviate_url(&self, credentials: &Credentials) -> Option<String> {
        self.vector_store
            .weaviate_url
            .clone()
            .or_else(|| credentials.weaviate_url.clone())
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Service credentials, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub pinecone_host: Option<String>,
    pub weaviate_url: Option<String>,
    pub weaviate_api_key: Option<String>,
    pub ollama_url: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// Empty variables count as unset.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_var("OPENAI_API_KEY"),
            pinecone_api_key: env_var("PINECONE_API_KEY"),
            pinecone_host: env_var("PINECONE_HOST"),
            weaviate_url: env_var("WEAVIATE_URL"),
            weaviate_api_key: env_var("WEAVIATE_API_KEY"),
            ollama_url: env_var("OLLAMA_URL"),
        }
    }

    /// Presence of each credential, for diagnostics. Values are never shown.
    pub fn redacted(&self) -> serde_json::Value {
        fn mask(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }

        serde_json::json!({
            "OPENAI_API_KEY": mask(&self.openai_api_key),
            "PINECONE_API_KEY": mask(&self.pinecone_api_key),
            "PINECONE_HOST": self.pinecone_host,
            "WEAVIATE_URL": self.weaviate_url,
            "WEAVIATE_API_KEY": mask(&self.weaviate_api_key),
            "OLLAMA_URL": self.ollama_url,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("pinecone_api_key", &self.pinecone_api_key.as_ref().map(|_| "***"))
            .field("pinecone_host", &self.pinecone_host)
            .field("weaviate_url", &self.weaviate_url)
            .field("weaviate_api_key", &self.weaviate_api_key.as_ref().map(|_| "***"))
            .field("ollama_url", &self.ollama_url)
            .finish()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Load knowledge base configuration.
///
/// Loads from `.ragchat/knowledge/<base>/config.yaml` if it exists,
/// otherwise returns the default config with the provided base name.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    let config_path = get_config_path(workspace, base_name);

    if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        config.name = base_name.to_string();

        tracing::debug!("Loaded knowledge base config for '{}'", base_name);
        Ok(config)
    } else {
        let config = KnowledgeBaseConfig {
            name: base_name.to_string(),
            ..Default::default()
        };

        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        Ok(config)
    }
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml)?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(STATE_DIR).join("knowledge").join(base_name)
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn credentials() -> Credentials {
        Credentials {
            openai_api_key: Some("sk-test".to_string()),
            pinecone_api_key: Some("pc-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "test-base").unwrap();

        assert_eq!(config.name, "test-base");
        assert_eq!(config.index_name, "concur-index");
        assert_eq!(config.namespace, "demo-html");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.vector_store.backend, VectorBackend::Pinecone);
        assert_eq!(config.id_strategy, IdStrategy::Random);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let config = KnowledgeBaseConfig {
            name: "my-base".to_string(),
            chunk_size: 1024,
            chunk_strategy: ChunkStrategy::Recursive,
            ..Default::default()
        };

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path(), "my-base").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "travel");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "namespace: travel\nvector_store:\n  backend: weaviate\n  weaviate_url: http://localhost:8080\nembedding:\n  provider: mock\n  dimensions: 64\n",
        )
        .unwrap();

        let config = load_config(temp.path(), "travel").unwrap();
        assert_eq!(config.namespace, "travel");
        assert_eq!(config.index_name, "concur-index");
        assert_eq!(config.vector_store.backend, VectorBackend::Weaviate);
        assert_eq!(config.vector_store.weaviate_class, "Document");
        assert_eq!(config.embedding.dimensions, 64);
        assert!(config.validate(&Credentials::default()).is_ok());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "bad");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "vector_store:\n  backend: chroma\n").unwrap();

        assert!(matches!(
            load_config(temp.path(), "bad"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_validate_chunking() {
        let creds = credentials();
        assert!(KnowledgeBaseConfig::default().validate(&creds).is_ok());

        let overlap_too_large = KnowledgeBaseConfig {
            chunk_size: 50,
            chunk_overlap: 50,
            ..Default::default()
        };
        assert!(overlap_too_large.validate(&creds).is_err());

        let zero_overlap = KnowledgeBaseConfig {
            chunk_overlap: 0,
            ..Default::default()
        };
        assert!(zero_overlap.validate(&creds).is_ok());

        let zero_k = KnowledgeBaseConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(zero_k.validate(&creds).is_err());
    }

    #[test]
    fn test_validate_missing_credentials() {
        let config = KnowledgeBaseConfig::default();
        let err = config.validate(&Credentials::default()).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let only_openai = Credentials {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let err = config.validate(&only_openai).unwrap_err();
        assert!(err.to_string().contains("PINECONE_API_KEY"));

        let weaviate = KnowledgeBaseConfig {
            vector_store: VectorStoreConfig {
                backend: VectorBackend::Weaviate,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = weaviate.validate(&only_openai).unwrap_err();
        assert!(err.to_string().contains("WEAVIATE_URL"));
    }

    #[test]
    fn test_paths_resolve_against_workspace() {
        let config = KnowledgeBaseConfig::default();
        let workspace = Path::new("/work");

        assert_eq!(
            config.resolve_document_path(workspace),
            PathBuf::from("/work/docs/Exp_SG_Account_Codes-jp.txt")
        );
        assert_eq!(
            config.lancedb_path(workspace),
            PathBuf::from("/work/.ragchat/index")
        );
        assert_eq!(
            get_config_path(workspace, "default"),
            PathBuf::from("/work/.ragchat/knowledge/default/config.yaml")
        );
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = credentials();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("sk-test"));
        assert!(!debug.contains("pc-test"));

        let redacted = creds.redacted();
        assert_eq!(redacted["OPENAI_API_KEY"], "<set>");
        assert_eq!(redacted["WEAVIATE_API_KEY"], "<unset>");
    }
}
