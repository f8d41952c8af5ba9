//! Embedding providers for knowledge bases.
//!
//! The same provider and model must be used for ingestion and querying.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
