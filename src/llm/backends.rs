//! Request paths for the three model kinds
//!
//! `StandardBackend` streams chat completions through the async-openai
//! Azure client; `VisionBackend` issues one raw multimodal completion;
//! `InterpreterBackend` relays the code-execution agent's event stream.

use super::http_utils::{self, extract_text_content, send_json_request};
use super::interpreter::{AgentEvent, BlockRenderer};
use super::{AnswerEvent, ChatBackend, ContentPart, LlmError, Message, Role, Transcript};
use crate::config::{ModelConfig, INTERPRETER_INSTRUCTIONS};
use async_openai::config::AzureConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, FinishReason,
};
use async_openai::Client;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client as HttpClient;
use serde_json::json;
use std::path::Path;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Chat-completions URL for one deployment
#[must_use]
pub fn deployment_url(model: &ModelConfig) -> String {
    format!(
        "{}openai/deployments/{}/chat/completions?api-version={}",
        model.endpoint, model.deployment, model.api_version
    )
}

fn build_azure_messages(
    context: &[Message],
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let mut messages = Vec::with_capacity(context.len());

    for msg in context {
        let text = msg.content.as_text();
        let built = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(text)
                .build()
                .map_err(|e| LlmError::Unknown(e.to_string()))?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()
                .map_err(|e| LlmError::Unknown(e.to_string()))?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(text)
                .build()
                .map_err(|e| LlmError::Unknown(e.to_string()))?
                .into(),
        };
        messages.push(built);
    }

    Ok(messages)
}

/// Streaming chat completions against one deployment
pub struct StandardBackend {
    client: Client<AzureConfig>,
    deployment: String,
}

impl StandardBackend {
    #[must_use]
    pub fn new(model: &ModelConfig) -> Self {
        let config = AzureConfig::new()
            .with_api_base(model.endpoint.trim_end_matches('/'))
            .with_api_version(model.api_version.clone())
            .with_deployment_id(model.deployment.clone())
            .with_api_key(model.key.clone());
        Self {
            client: Client::with_config(config),
            deployment: model.deployment.clone(),
        }
    }
}

#[async_trait]
impl ChatBackend for StandardBackend {
    async fn run(
        &self,
        transcript: &Mutex<Transcript>,
        question: &str,
        max_tokens: u32,
        _image: Option<&Path>,
        updates: &mpsc::Sender<AnswerEvent>,
    ) -> Result<String, LlmError> {
        let context = {
            let mut guard = transcript.lock().await;
            guard.push_user_text(question);
            guard.messages().to_vec()
        };

        debug!(
            deployment = %self.deployment,
            max_tokens,
            context_len = context.len(),
            "starting streaming completion"
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.deployment.clone())
            .messages(build_azure_messages(&context)?)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let mut answer = String::new();
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| LlmError::ApiError(e.to_string()))?;
            let Some(choice) = chunk.choices.first() else {
                continue;
            };

            if let Some(fragment) = &choice.delta.content {
                answer.push_str(fragment);
                let _ = updates.send(AnswerEvent::Delta(answer.clone())).await;
            }
            if choice.finish_reason == Some(FinishReason::Stop) {
                let _ = updates.send(AnswerEvent::Delta(answer.clone())).await;
            }
        }

        transcript.lock().await.push_assistant(&answer);
        Ok(answer)
    }
}

fn vision_user_parts(question: &str, image: Option<&[u8]>) -> Vec<ContentPart> {
    let mut parts = Vec::new();
    if let Some(bytes) = image {
        parts.push(ContentPart::ImageUrl {
            image_url: format!("data:image/jpeg;base64,{}", BASE64.encode(bytes)),
        });
    }
    parts.push(ContentPart::Text {
        text: question.to_string(),
    });
    parts
}

/// Single-shot multimodal completion against one deployment
pub struct VisionBackend {
    http: HttpClient,
    url: String,
    key: String,
}

impl VisionBackend {
    #[must_use]
    pub fn new(model: &ModelConfig) -> Self {
        Self {
            http: http_utils::create_http_client(),
            url: deployment_url(model),
            key: model.key.clone(),
        }
    }
}

#[async_trait]
impl ChatBackend for VisionBackend {
    async fn run(
        &self,
        transcript: &Mutex<Transcript>,
        question: &str,
        max_tokens: u32,
        image: Option<&Path>,
        updates: &mpsc::Sender<AnswerEvent>,
    ) -> Result<String, LlmError> {
        let image_bytes = match image {
            Some(path) => Some(tokio::fs::read(path).await.map_err(LlmError::ImageFile)?),
            None => None,
        };
        let parts = vision_user_parts(question, image_bytes.as_deref());

        let body = {
            let mut guard = transcript.lock().await;
            guard.push_user_parts(parts);
            json!({ "messages": guard.messages(), "max_tokens": max_tokens })
        };

        debug!(url = %self.url, max_tokens, "sending vision completion");

        let response =
            send_json_request(&self.http, &self.url, &body, Some(("api-key", &self.key)), &[])
                .await?;
        let answer = extract_text_content(&response, &["choices", "0", "message", "content"])?;

        transcript.lock().await.push_assistant(&answer);
        let _ = updates.send(AnswerEvent::Delta(answer.clone())).await;
        Ok(answer)
    }
}

/// Relay to the external code-execution agent.
///
/// The agent keeps its own conversation state, so the local transcript is
/// left untouched.
pub struct InterpreterBackend {
    http: HttpClient,
    url: String,
    key: String,
    deployment: String,
}

impl InterpreterBackend {
    #[must_use]
    pub fn new(model: &ModelConfig) -> Self {
        Self {
            http: http_utils::create_streaming_http_client(),
            url: model.endpoint.clone(),
            key: model.key.clone(),
            deployment: model.deployment.clone(),
        }
    }
}

#[async_trait]
impl ChatBackend for InterpreterBackend {
    async fn run(
        &self,
        _transcript: &Mutex<Transcript>,
        question: &str,
        _max_tokens: u32,
        _image: Option<&Path>,
        updates: &mpsc::Sender<AnswerEvent>,
    ) -> Result<String, LlmError> {
        let body = json!({
            "message": question,
            "model": self.deployment,
            "auto_run": true,
            "instructions": INTERPRETER_INSTRUCTIONS,
            "stream": true,
        });

        debug!(url = %self.url, deployment = %self.deployment, "starting agent run");

        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "agent error: {status} - {error_text}"
            )));
        }

        let mut stream = response.bytes_stream().eventsource();
        let mut renderer = BlockRenderer::new();

        while let Some(event) = stream.next().await {
            let event =
                event.map_err(|e| LlmError::NetworkError(format!("SSE stream error: {e}")))?;
            if event.data.trim() == "[DONE]" {
                break;
            }

            let parsed: AgentEvent = serde_json::from_str(&event.data)
                .map_err(|e| LlmError::JsonError(format!("failed to parse agent event: {e}")))?;
            for snapshot in renderer.feed(&parsed) {
                let _ = updates.send(AnswerEvent::Delta(snapshot)).await;
            }
        }

        Ok(renderer.into_answer())
    }
}
