//! Completion provider implementations.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use recall_core::AppError;

/// Convert a non-success response into an [`AppError::Http`], keeping the status.
pub async fn status_error(provider: &str, response: reqwest::Response) -> AppError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    // Both APIs wrap errors as {"error": "..."} or {"error": {"message": "..."}}
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            error
                .as_str()
                .or_else(|| error.get("message").and_then(|m| m.as_str()))
                .map(str::to_string)
        })
        .unwrap_or(body);

    tracing::warn!("{} API error ({}): {}", provider, status, message);
    AppError::Http { status, message }
}
