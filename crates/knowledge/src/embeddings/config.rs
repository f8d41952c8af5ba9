//! Embedding configuration types.

use ragchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Provider names accepted by [`crate::embeddings::create_provider`].
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "ollama", "mock"];

/// Embedding configuration for a knowledge base.
///
/// The same configuration must be used for ingestion and querying; vectors
/// from different models live in different spaces and retrieval degrades
/// silently when they are mixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "ollama", "mock"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Maximum number of texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Service base URL override (e.g., a proxy or a remote Ollama host)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_batch_size() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Offline configuration backed by the deterministic mock provider.
    pub fn mock(dimensions: usize) -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions,
            batch_size: default_batch_size(),
            endpoint: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !SUPPORTED_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: {}",
                self.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config(
                "Embedding model cannot be empty".to_string(),
            ));
        }

        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: EmbeddingConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, EmbeddingConfig::default());
        assert_eq!(config.dimensions, 1536);
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "provider: ollama\nmodel: nomic-embed-text\ndimensions: 768\n";
        let config: EmbeddingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.dimensions, 768);
        assert_eq!(config.batch_size, 100);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(EmbeddingConfig::default().validate().is_ok());
        assert!(EmbeddingConfig::mock(64).validate().is_ok());

        let unknown = EmbeddingConfig {
            provider: "gguf".to_string(),
            ..Default::default()
        };
        assert!(matches!(unknown.validate(), Err(AppError::Config(_))));

        let zero_dims = EmbeddingConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(zero_dims.validate().is_err());

        let zero_batch = EmbeddingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(zero_batch.validate().is_err());
    }
}
