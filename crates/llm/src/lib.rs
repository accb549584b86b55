//! Completion-service integration for Recall.
//!
//! This crate provides a provider-agnostic abstraction for one-shot completion
//! calls. The retrieval pipeline uses it for query rewriting and reranking.
//!
//! # Providers
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint (default)
//! - **Ollama**: local LLM runtime
//!
//! # Example
//! ```no_run
//! use recall_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage, ResponseFormat};
pub use factory::{create_client, ProviderType};
pub use providers::{OllamaClient, OpenAiClient};
