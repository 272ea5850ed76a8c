//! LLM access for company summaries and cover email drafts.
//!
//! Supports a local Ollama server and OpenAI-compatible hosted APIs.

mod client;
mod config;
mod prompts;

pub use client::{truncate_content, LlmClient, LlmError, TextModel};
pub use config::{LlmConfig, LlmProvider};
pub use prompts::{DEFAULT_DRAFT_PROMPT, DEFAULT_SUMMARY_PROMPT};
