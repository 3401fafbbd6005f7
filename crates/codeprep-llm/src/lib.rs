// Claude integration: streaming client, prompt templates and answer parsing.

pub mod client;
pub mod parse;
pub mod prompt;

pub use client::{ClaudeClient, LlmClient};
