//! Embedding provider trait and factory.

use crate::config::Credentials;
use crate::embeddings::config::{EmbeddingConfig, SUPPORTED_PROVIDERS};
use crate::embeddings::providers::{MockProvider, OllamaProvider, OpenAiProvider};
use ragchat_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate one embedding per text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(
    config: &EmbeddingConfig,
    credentials: &Credentials,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    tracing::debug!(
        "Creating embedding provider: provider={}, model={}, dimensions={}",
        config.provider,
        config.model,
        config.dimensions
    );

    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(config.dimensions))),

        "openai" => {
            let api_key = credentials.openai_api_key.as_deref().ok_or_else(|| {
                AppError::Config(
                    "OPENAI_API_KEY is required for the openai embedding provider".to_string(),
                )
            })?;
            Ok(Arc::new(OpenAiProvider::new(config, api_key)?))
        }

        "ollama" => {
            let endpoint = config
                .endpoint
                .as_deref()
                .or(credentials.ollama_url.as_deref());
            Ok(Arc::new(OllamaProvider::new(config, endpoint)?))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: {}",
            config.provider,
            SUPPORTED_PROVIDERS.join(", ")
        ))),
    }
}

/// Reject a response whose vectors do not match the configured dimension
/// or whose length does not match the request.
pub(crate) fn check_embeddings(
    provider: &str,
    expected_dimensions: usize,
    expected_count: usize,
    embeddings: &[Vec<f32>],
) -> AppResult<()> {
    if embeddings.len() != expected_count {
        return Err(AppError::Embedding(format!(
            "{} returned {} embeddings for {} texts",
            provider,
            embeddings.len(),
            expected_count
        )));
    }

    if let Some(bad) = embeddings.iter().find(|e| e.len() != expected_dimensions) {
        return Err(AppError::Embedding(format!(
            "{} returned {} dimensions, expected {}",
            provider,
            bad.len(),
            expected_dimensions
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_provider() {
        let config = EmbeddingConfig::mock(384);

        let provider = create_provider(&config, &Credentials::default()).unwrap();
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_openai_provider_requires_key() {
        let config = EmbeddingConfig::default();

        let result = create_provider(&config, &Credentials::default());
        assert!(matches!(result, Err(AppError::Config(_))));

        let credentials = Credentials {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let provider = create_provider(&config, &credentials).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.dimensions(), 1536);
    }

    #[test]
    fn test_create_ollama_provider() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            ..Default::default()
        };

        let provider = create_provider(&config, &Credentials::default()).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_provider(&config, &Credentials::default());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_check_embeddings() {
        let good = vec![vec![0.0; 4], vec![1.0; 4]];
        assert!(check_embeddings("test", 4, 2, &good).is_ok());
        assert!(check_embeddings("test", 4, 3, &good).is_err());

        let err = check_embeddings("test", 8, 2, &good).unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
        assert!(err.to_string().contains("expected 8"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&EmbeddingConfig::mock(384), &Credentials::default()).unwrap();

        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
