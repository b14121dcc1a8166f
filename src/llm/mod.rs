//! Model clients and streaming answer delivery
//!
//! One [`ModelClient`] wraps one configured deployment. A call to
//! [`ModelClient::stream`] spawns an independent request task and returns a
//! channel of [`AnswerEvent`]s carrying the cumulative answer text, with
//! explicit `Done`/`Failed` terminals.

pub mod backends;
pub mod http_utils;
pub mod interpreter;

use crate::config::{ModelConfig, ModelKind, Settings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Buffered events per in-flight stream
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Errors raised while talking to a model backend
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider answered with a non-success status or unusable payload
    #[error("API error: {0}")]
    ApiError(String),

    /// The provider could not be reached
    #[error("network error: {0}")]
    NetworkError(String),

    /// A provider payload failed to parse
    #[error("JSON error: {0}")]
    JsonError(String),

    /// The image at the supplied path could not be read
    #[error("failed to read image: {0}")]
    ImageFile(std::io::Error),

    /// Anything that does not fit the other variants
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One part of a multi-part user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text { text: String },
    /// Inline image as a base64 data URL
    ImageUrl { image_url: String },
}

/// Message payload, plain or multi-part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Flatten to plain text, dropping non-text parts
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

/// Role-tagged conversation context sent to a provider.
///
/// The first entry is always the system message currently in effect;
/// [`Transcript::set_system`] replaces only that entry and never the
/// history behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Start a transcript holding only the system message
    #[must_use]
    pub fn new(system_message: impl Into<String>) -> Self {
        Self {
            messages: vec![Message {
                role: Role::System,
                content: Content::Text(system_message.into()),
            }],
        }
    }

    /// Replace the system message, leaving the rest of the history intact
    pub fn set_system(&mut self, system_message: &str) {
        if let Some(first) = self.messages.first_mut() {
            *first = Message {
                role: Role::System,
                content: Content::Text(system_message.to_string()),
            };
        }
    }

    /// Append a plain-text user turn
    pub fn push_user_text(&mut self, text: &str) {
        self.messages.push(Message {
            role: Role::User,
            content: Content::Text(text.to_string()),
        });
    }

    /// Append a multi-part user turn
    pub fn push_user_parts(&mut self, parts: Vec<ContentPart>) {
        self.messages.push(Message {
            role: Role::User,
            content: Content::Parts(parts),
        });
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, text: &str) {
        self.messages.push(Message {
            role: Role::Assistant,
            content: Content::Text(text.to_string()),
        });
    }

    /// All entries, system message first
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// One event of a streaming answer
#[derive(Debug)]
pub enum AnswerEvent {
    /// Cumulative answer text so far
    Delta(String),
    /// The stream finished; carries the final answer
    Done(String),
    /// The stream failed; no further events follow
    Failed(LlmError),
}

/// A single model request path.
///
/// Implementations emit cumulative [`AnswerEvent::Delta`]s through the
/// channel while running and return the final answer; [`ModelClient`]
/// turns the return value into the terminal `Done`/`Failed` event.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn run(
        &self,
        transcript: &Mutex<Transcript>,
        question: &str,
        max_tokens: u32,
        image: Option<&Path>,
        updates: &mpsc::Sender<AnswerEvent>,
    ) -> Result<String, LlmError>;
}

/// Client for one configured deployment, bundled with its transcript
pub struct ModelClient {
    backend: Arc<dyn ChatBackend>,
    transcript: Arc<Mutex<Transcript>>,
}

impl ModelClient {
    /// Build the client for a configured model, selecting the backend by kind
    #[must_use]
    pub fn new(model: &ModelConfig, settings: &Settings) -> Self {
        let backend: Arc<dyn ChatBackend> = match model.kind() {
            ModelKind::Standard => Arc::new(backends::StandardBackend::new(model)),
            ModelKind::Vision => Arc::new(backends::VisionBackend::new(model)),
            ModelKind::CodeInterpreter => Arc::new(backends::InterpreterBackend::new(model)),
        };
        Self::with_backend(backend, settings.default_system())
    }

    /// Build a client around an arbitrary backend
    #[must_use]
    pub fn with_backend(backend: Arc<dyn ChatBackend>, system_message: &str) -> Self {
        Self {
            backend,
            transcript: Arc::new(Mutex::new(Transcript::new(system_message))),
        }
    }

    /// Issue one streaming request.
    ///
    /// A non-empty `system_override` replaces the transcript's system
    /// message before dispatch. Each call is independent and not
    /// resumable; the returned channel ends with `Done` or `Failed`.
    #[must_use]
    pub fn stream(
        &self,
        question: String,
        max_tokens: u32,
        image: Option<PathBuf>,
        system_override: String,
    ) -> mpsc::Receiver<AnswerEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let backend = Arc::clone(&self.backend);
        let transcript = Arc::clone(&self.transcript);

        tokio::spawn(async move {
            if !system_override.is_empty() {
                transcript.lock().await.set_system(&system_override);
            }

            let outcome = backend
                .run(&transcript, &question, max_tokens, image.as_deref(), &tx)
                .await;

            let terminal = match outcome {
                Ok(answer) => AnswerEvent::Done(answer),
                Err(error) => AnswerEvent::Failed(error),
            };
            let _ = tx.send(terminal).await;
        });

        rx
    }

    /// Handle to the transcript owned by this client
    #[must_use]
    pub fn transcript(&self) -> Arc<Mutex<Transcript>> {
        Arc::clone(&self.transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_starts_with_system_entry() {
        let transcript = Transcript::new("be helpful");
        assert_eq!(transcript.len(), 1);
        let first = transcript.messages().first().expect("system entry");
        assert_eq!(first.role, Role::System);
        assert_eq!(first.content, Content::Text("be helpful".to_string()));
    }

    #[test]
    fn test_set_system_replaces_only_first_entry() {
        let mut transcript = Transcript::new("original");
        transcript.push_user_text("hello");
        transcript.push_assistant("hi there");

        transcript.set_system("override");

        assert_eq!(transcript.len(), 3);
        let messages = transcript.messages();
        assert_eq!(
            messages.first().expect("system").content,
            Content::Text("override".to_string())
        );
        assert_eq!(
            messages.get(1).expect("user").content,
            Content::Text("hello".to_string())
        );
        assert_eq!(
            messages.get(2).expect("assistant").content,
            Content::Text("hi there".to_string())
        );
    }

    #[test]
    fn test_content_serializes_like_the_provider_expects() {
        let text = Content::Text("plain".to_string());
        assert_eq!(
            serde_json::to_value(&text).expect("serialize text"),
            serde_json::json!("plain")
        );

        let parts = Content::Parts(vec![
            ContentPart::ImageUrl {
                image_url: "data:image/jpeg;base64,AAAA".to_string(),
            },
            ContentPart::Text {
                text: "what is this?".to_string(),
            },
        ]);
        assert_eq!(
            serde_json::to_value(&parts).expect("serialize parts"),
            serde_json::json!([
                {"type": "image_url", "image_url": "data:image/jpeg;base64,AAAA"},
                {"type": "text", "text": "what is this?"}
            ])
        );
    }

    #[test]
    fn test_content_as_text_flattens_parts() {
        let parts = Content::Parts(vec![
            ContentPart::ImageUrl {
                image_url: "data:image/jpeg;base64,AAAA".to_string(),
            },
            ContentPart::Text {
                text: "caption".to_string(),
            },
        ]);
        assert_eq!(parts.as_text(), "caption");
    }
}
