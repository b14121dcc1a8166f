//! Session routing across configured models
//!
//! The [`SessionRouter`] owns one client and one presentation-facing
//! history list per configured model name, built once at startup. It
//! dispatches a message to the selected model, re-yields the client's
//! events unchanged, and folds the finished exchange into that model's
//! history.

use crate::config::{ModelConfig, Settings, RESET_INPUT_DELAY};
use crate::llm::{AnswerEvent, ModelClient, Transcript, EVENT_CHANNEL_CAPACITY};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Errors raised while dispatching a message
#[derive(Debug, Error)]
pub enum RouterError {
    /// The requested model name is not configured
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The attached file could not be read as UTF-8 text
    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One finished exchange, as shown in the UI history
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRecord {
    pub message: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

struct ModelEntry {
    client: ModelClient,
    history: Arc<Mutex<Vec<ExchangeRecord>>>,
}

/// Registry of per-model clients and histories
pub struct SessionRouter {
    names: Vec<String>,
    entries: HashMap<String, ModelEntry>,
}

impl SessionRouter {
    /// Build the registry from the configured model list
    #[must_use]
    pub fn new(models: &[ModelConfig], settings: &Settings) -> Self {
        let clients = models
            .iter()
            .map(|model| (model.model_name.clone(), ModelClient::new(model, settings)))
            .collect();
        Self::from_clients(clients)
    }

    /// Build the registry from prebuilt clients, keeping their order
    #[must_use]
    pub fn from_clients(clients: Vec<(String, ModelClient)>) -> Self {
        let mut names = Vec::with_capacity(clients.len());
        let mut entries = HashMap::with_capacity(clients.len());

        for (name, client) in clients {
            names.push(name.clone());
            entries.insert(
                name,
                ModelEntry {
                    client,
                    history: Arc::new(Mutex::new(Vec::new())),
                },
            );
        }

        Self { names, entries }
    }

    /// Configured model names in configuration order.
    ///
    /// The first entry is the UI default.
    #[must_use]
    pub fn model_names(&self) -> &[String] {
        &self.names
    }

    /// Dispatch a message to the named model.
    ///
    /// Any file content is appended to the message as plain text before
    /// dispatch. Events are re-yielded unchanged; once the stream
    /// finishes, the `(message, answer)` pair is appended to the model's
    /// history.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::UnknownModel` for unconfigured names (all
    /// transcripts left untouched) and `RouterError::Attachment` if the
    /// file cannot be read.
    pub async fn route(
        &self,
        model_name: &str,
        message: &str,
        max_tokens: u32,
        system_override: &str,
        image: Option<PathBuf>,
        file: Option<PathBuf>,
    ) -> Result<mpsc::Receiver<AnswerEvent>, RouterError> {
        let entry = self
            .entries
            .get(model_name)
            .ok_or_else(|| RouterError::UnknownModel(model_name.to_string()))?;

        let mut question = message.to_string();
        if let Some(path) = file {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| RouterError::Attachment { path, source })?;
            question.push_str(&text);
        }

        debug!(model = model_name, max_tokens, "routing message");

        let mut inner = entry
            .client
            .stream(question, max_tokens, image, system_override.to_string());

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let history = Arc::clone(&entry.history);
        let message = message.to_string();

        tokio::spawn(async move {
            while let Some(event) = inner.recv().await {
                if let AnswerEvent::Done(answer) = &event {
                    history.lock().await.push(ExchangeRecord {
                        message: message.clone(),
                        answer: answer.clone(),
                        at: Utc::now(),
                    });
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Finished exchanges for the named model, oldest first
    ///
    /// # Errors
    ///
    /// Returns `RouterError::UnknownModel` for unconfigured names.
    pub async fn history(&self, model_name: &str) -> Result<Vec<ExchangeRecord>, RouterError> {
        let entry = self
            .entries
            .get(model_name)
            .ok_or_else(|| RouterError::UnknownModel(model_name.to_string()))?;
        Ok(entry.history.lock().await.clone())
    }

    /// Transcript handle for the named model, if configured
    #[must_use]
    pub fn transcript(&self, model_name: &str) -> Option<Arc<Mutex<Transcript>>> {
        self.entries
            .get(model_name)
            .map(|entry| entry.client.transcript())
    }

    /// Report input fields as cleared after a fixed delay.
    ///
    /// Holds no state; the delay exists so the UI clears its upload
    /// fields after the submit animation settles.
    pub async fn reset_inputs(&self) {
        tokio::time::sleep(RESET_INPUT_DELAY).await;
    }
}
