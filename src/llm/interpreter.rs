//! Code-execution agent event decoding and answer rendering
//!
//! The agent reports progress as JSON objects with optional keys; the
//! [`BlockRenderer`] folds them into one cumulative markdown string with
//! language-labelled code fences and a text fence for execution output.

use serde::Deserialize;

/// Output chunk the agent emits when a run is cancelled; never rendered.
pub const CANCEL_SENTINEL: &str = "KeyboardInterrupt";

/// One progress event from the code-execution agent
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AgentEvent {
    /// Prose answer fragment
    pub message: Option<String>,
    /// Language of the upcoming code block
    pub language: Option<String>,
    /// Code fragment
    pub code: Option<String>,
    /// The agent started executing the current code block
    pub executing: Option<serde_json::Value>,
    /// Execution output fragment
    pub output: Option<String>,
    /// The current execution finished
    pub end_of_execution: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Message,
    Code,
}

/// Folds agent events into a cumulative markdown answer.
///
/// Every visible change produces a snapshot of the whole answer so far,
/// matching the cumulative delivery style of the other backends.
#[derive(Debug)]
pub struct BlockRenderer {
    answer: String,
    language: String,
    block: Block,
}

impl Default for BlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            answer: String::new(),
            language: String::new(),
            block: Block::None,
        }
    }

    /// Apply one event; returns a snapshot per visible change.
    ///
    /// A single event may carry several keys and therefore produce
    /// several snapshots.
    pub fn feed(&mut self, event: &AgentEvent) -> Vec<String> {
        let mut snapshots = Vec::new();

        if let Some(text) = &event.message {
            self.block = Block::Message;
            self.answer.push_str(text);
            snapshots.push(self.answer.clone());
        }

        if let Some(language) = &event.language {
            self.language.clone_from(language);
        }

        if let Some(code) = &event.code {
            if self.block != Block::Code {
                self.block = Block::Code;
                self.answer.push_str("\n```");
                self.answer.push_str(&self.language);
                self.answer.push('\n');
            }
            self.answer.push_str(code);
            snapshots.push(self.answer.clone());
        }

        if event.executing.is_some() {
            self.answer.push_str("\n```\n\n```text\n");
            snapshots.push(self.answer.clone());
        }

        if let Some(output) = &event.output {
            if output != CANCEL_SENTINEL {
                self.answer.push_str(output);
                self.answer.push('\n');
                snapshots.push(self.answer.clone());
            }
        }

        if event.end_of_execution.is_some() {
            let kept = self.answer.trim_end().len();
            self.answer.truncate(kept);
            self.answer.push_str("\n```\n");
            snapshots.push(self.answer.clone());
        }

        snapshots
    }

    /// Answer accumulated so far
    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Consume the renderer, returning the final answer
    #[must_use]
    pub fn into_answer(self) -> String {
        self.answer
    }
}
