//! Cross-module tests for ingestion and answering.

mod pipeline;
