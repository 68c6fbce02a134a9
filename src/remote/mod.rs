//! Capability interface to the remote document-indexing service.
//!
//! The service is the only source of durable state. Everything the orchestrator and store
//! manager need from it goes through [`FileSearchRemote`], so tests can swap in an in-memory
//! fake and production code uses [`crate::gemini::GeminiService`].

#[cfg(test)]
pub(crate) mod fake;

use crate::processing::{AnswerError, DocumentRecord, DocumentUpload, QueryAnswer, StoreHandle};
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by remote calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Request never produced a response (DNS, connect, timeout).
    #[error("transport failure: {0}")]
    Transport(String),
    /// Quota or rate limit hit (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Remote side failed temporarily (HTTP 5xx).
    #[error("service unavailable ({status}): {body}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Remote side rejected the request (HTTP 4xx other than 429).
    #[error("request rejected ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Response could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Model answered in a way that cannot be shown.
    #[error("unusable answer: {0}")]
    Answer(#[from] AnswerError),
}

impl RemoteError {
    /// Whether the failure is worth retrying after a short wait.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited(_) | Self::Unavailable { .. }
        )
    }

    /// Classify an HTTP failure status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited(body),
            500..=599 => Self::Unavailable { status, body },
            _ => Self::Rejected { status, body },
        }
    }
}

/// Operations offered by the remote File Search service.
///
/// None of these are assumed idempotent except the lookup half of
/// [`FileSearchRemote::create_or_get_store`].
#[async_trait]
pub trait FileSearchRemote: Send + Sync {
    /// Return the store with this display name, creating it when absent.
    async fn create_or_get_store(&self, display_name: &str) -> Result<StoreHandle, RemoteError>;

    /// Submit a file for ingestion. The returned record is normally `processing`.
    async fn upload_document(
        &self,
        store: &StoreHandle,
        upload: &DocumentUpload,
    ) -> Result<DocumentRecord, RemoteError>;

    /// Re-fetch the status of a previously returned record, identified by its `id`.
    ///
    /// The whole record is passed so adapters that expose uploads as intermediate
    /// operations can carry the filename forward until the document itself is visible.
    async fn document_status(
        &self,
        store: &StoreHandle,
        document: &DocumentRecord,
    ) -> Result<DocumentRecord, RemoteError>;

    /// Snapshot of every document in the store.
    async fn list_documents(&self, store: &StoreHandle) -> Result<Vec<DocumentRecord>, RemoteError>;

    /// Delete one document by identifier.
    async fn delete_document(&self, store: &StoreHandle, document_id: &str)
    -> Result<(), RemoteError>;

    /// Answer a question using the store as retrieval context.
    async fn ask(&self, store: &StoreHandle, question: &str) -> Result<QueryAnswer, RemoteError>;
}
