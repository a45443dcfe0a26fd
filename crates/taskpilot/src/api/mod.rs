//! Completion-provider client.

pub mod client;

pub use client::{CompletionClient, CompletionFuture, OpenAiCompatClient};
