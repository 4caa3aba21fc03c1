use std::future::Future;
use std::time::Duration;

use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message, Role};

const PROVIDER: &str = "ollama";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
    timeout: Duration,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
            timeout: Duration::from_secs(120),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            LlmError::Other(format!("failed to connect to Ollama, is it running? {e}"))
        })?;
        Ok(())
    }

    fn request(&self, messages: &[Message], temperature: f32) -> ChatMessageRequest {
        let ollama_messages = messages.iter().map(convert_message).collect();
        ChatMessageRequest::new(self.model.clone(), ollama_messages)
            .options(ModelOptions::default().temperature(temperature))
    }

    async fn bounded<T, E: std::fmt::Display>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, LlmError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(LlmError::Other(format!("Ollama {what} failed: {e}"))),
            Err(_) => Err(LlmError::Timeout { provider: PROVIDER }),
        }
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message], temperature: f32) -> Result<String, LlmError> {
        let request = self.request(messages, temperature);
        let response = self
            .bounded("chat request", self.client.send_chat_messages(request))
            .await?;
        Ok(response.message.content)
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<ChatStream, LlmError> {
        let request = self.request(messages, temperature);
        let stream = self
            .bounded(
                "streaming request",
                self.client.send_chat_messages_stream(request),
            )
            .await?;

        let mapped = stream.map(|item| match item {
            Ok(response) => Ok(response.message.content),
            Err(()) => Err(LlmError::Other("Ollama stream chunk failed".into())),
        });
        Ok(Box::pin(mapped))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.embed_batch(&[text.to_owned()]).await?;
        vectors
            .pop()
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let response = self
            .bounded("embedding request", self.client.generate_embeddings(request))
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(LlmError::EmbeddingCount {
                provider: PROVIDER,
                expected: texts.len(),
                got: response.embeddings.len(),
            });
        }
        Ok(response.embeddings)
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    match msg.role {
        Role::System => ChatMessage::system(msg.content.clone()),
        Role::User => ChatMessage::user(msg.content.clone()),
        Role::Assistant => ChatMessage::assistant(msg.content.clone()),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://localhost:11434");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_without_port_uses_default() {
        let (host, port) = parse_host_port("http://ollama.internal");
        assert_eq!(host, "http://ollama.internal");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_trailing_slash() {
        let (host, port) = parse_host_port("http://127.0.0.1:9999/");
        assert_eq!(host, "http://127.0.0.1");
        assert_eq!(port, 9999);
    }

    #[test]
    fn convert_message_keeps_content() {
        let converted = convert_message(&Message::system("be strict"));
        assert_eq!(converted.content, "be strict");
    }

    #[test]
    fn name_is_ollama() {
        let p = OllamaProvider::new("http://localhost:11434", "m".into(), "e".into());
        assert_eq!(p.name(), "ollama");
        assert!(p.supports_embeddings());
    }

    #[tokio::test]
    async fn unreachable_server_errors() {
        let p = OllamaProvider::new("http://127.0.0.1:1", "m".into(), "e".into())
            .with_timeout(Duration::from_secs(5));
        assert!(p.chat(&[Message::user("hi")], 0.1).await.is_err());
        assert!(p.health_check().await.is_err());
    }
}
