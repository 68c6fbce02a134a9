#![deny(missing_docs)]

//! Core library for the Gemini File Search service.

/// HTTP routing and REST handlers.
pub mod api;
/// Command-line parsing and command runners.
pub mod cli;
/// Environment-driven configuration management.
pub mod config;
/// Gemini REST adapter.
pub mod gemini;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload and indexing metrics helpers.
pub mod metrics;
/// Store management, upload orchestration, and question answering.
pub mod processing;
/// Capability interface to the remote indexing service.
pub mod remote;
