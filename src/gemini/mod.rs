//! Gemini File Search REST integration.

mod answer;
pub mod client;
/// Streaming helpers for `pageToken` pagination.
mod pager;
pub mod types;
mod upload;

pub use client::GeminiService;
pub use types::GeminiError;
