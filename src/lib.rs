//! Web GPT relay
//!
//! A thin orchestration layer that forwards browser chat messages to one
//! of several configured model deployments, streams the cumulative answer
//! back, and keeps a per-model conversation history in memory.

/// Configuration management
pub mod config;
/// Model clients and streaming answers
pub mod llm;
/// Per-model session routing
pub mod router;
/// Web server and embedded chat UI
pub mod web;
