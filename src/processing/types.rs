//! Domain records and the error taxonomy shared by the store manager, orchestrator, and query path.

use crate::{config::ConfigError, remote::RemoteError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

/// Handle to a named remote document collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    /// Resource name assigned by the remote service (`fileSearchStores/...`).
    pub id: String,
    /// Human readable name used to look the store up.
    pub display_name: String,
    /// Creation time reported by the remote service.
    pub create_time: Option<OffsetDateTime>,
}

/// Indexing state of a document as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// Upload accepted, indexing still running.
    Processing,
    /// Document is searchable.
    Active,
    /// Remote service gave up on the document.
    Failed,
}

impl DocumentState {
    /// Lowercase label used in logs and API responses.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file as tracked by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Remote identifier. While an upload is still an in-flight operation this is the
    /// operation name; afterwards it is the document resource name.
    pub id: String,
    /// Original filename, used as the remote display name.
    pub filename: String,
    /// Current indexing state.
    pub state: DocumentState,
    /// Size in bytes, when known.
    pub size_bytes: u64,
    /// MIME type recorded by the remote service.
    pub mime_type: Option<String>,
    /// Upload time reported by the remote service.
    pub create_time: Option<OffsetDateTime>,
    /// Failure detail provided by the remote service for `failed` records.
    pub failure_reason: Option<String>,
}

/// File submitted to the remote service.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Display name for the remote document.
    pub filename: String,
    /// MIME type sent alongside the content.
    pub mime_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

/// Reference from an answer back to a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// Title of the cited document, falling back to its URI.
    pub source: String,
    /// Passage shown to the user, if the remote service returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Link to the source, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Generated answer with its supporting citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryAnswer {
    /// Answer text.
    pub text: String,
    /// Citations in the order the remote service returned them.
    pub citations: Vec<Citation>,
}

/// Snapshot handed to the progress callback after every status poll.
#[derive(Debug, Clone)]
pub struct PollProgress {
    /// Record as returned by the latest poll.
    pub record: DocumentRecord,
    /// 1-based poll counter.
    pub poll: u32,
    /// Time since the upload was submitted.
    pub elapsed: Duration,
}

/// Result of [`crate::processing::upload_and_index`].
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// Final record (or the pre-existing one for skipped uploads).
    pub record: DocumentRecord,
    /// `true` when a document with the same filename already existed and nothing was uploaded.
    pub skipped: bool,
    /// Number of status polls performed.
    pub polls: u32,
    /// Hex-encoded SHA-256 of the submitted content.
    pub content_digest: String,
}

/// A document that could not be deleted while clearing a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionFailure {
    /// Remote identifier of the document.
    pub id: String,
    /// Filename of the document.
    pub filename: String,
    /// Rendered remote error.
    pub error: String,
}

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    /// Filenames that were removed.
    pub deleted: Vec<String>,
    /// Documents whose deletion failed.
    pub failed: Vec<DeletionFailure>,
}

impl ClearReport {
    /// Number of deletions attempted.
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}

/// Input rejected before any remote call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Upload carried no filename.
    #[error("a filename is required")]
    MissingFilename,
    /// Upload carried no bytes.
    #[error("'{filename}' is empty")]
    EmptyFile {
        /// Offending filename.
        filename: String,
    },
    /// Upload exceeds the configured size limit.
    #[error("'{filename}' is {size} bytes, above the {max} byte limit")]
    TooLarge {
        /// Offending filename.
        filename: String,
        /// Actual size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        max: usize,
    },
    /// Question was blank.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// Request contained no files.
    #[error("no files were provided")]
    NoFiles,
}

/// Answers the remote model produced but that cannot be shown to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerError {
    /// Response carried no candidates.
    #[error("no candidates in the response")]
    NoCandidates,
    /// Model stopped for safety or policy reasons.
    #[error("the response was blocked ({reason})")]
    Blocked {
        /// Finish reason reported by the model.
        reason: String,
    },
    /// Candidate had no content parts.
    #[error("response has no content parts")]
    NoContent,
    /// Content parts contained no text.
    #[error("response does not contain text content")]
    NoText,
}

/// Errors surfaced by the store manager, the orchestrator, and the query path.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad input, caught before contacting the remote service.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
    /// Remote call failed after any allowed retries.
    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),
    /// Remote service marked the document as failed.
    #[error(
        "Indexing failed for '{}': {}",
        .0.filename,
        .0.failure_reason.as_deref().unwrap_or("no reason provided")
    )]
    IndexingFailed(Box<DocumentRecord>),
    /// Document was still processing when the polling budget ran out.
    #[error(
        "Indexing of '{}' did not finish within {}s; it may still complete, try again later",
        .record.filename,
        .waited.as_secs()
    )]
    IndexingTimeout {
        /// Last observed record.
        record: Box<DocumentRecord>,
        /// Time spent polling.
        waited: Duration,
    },
    /// Bulk delete left documents behind.
    #[error(
        "Remote service error: {} of {} deletion(s) failed",
        .0.failed.len(),
        .0.attempted()
    )]
    ClearIncomplete(ClearReport),
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Whether retrying the same action later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::IndexingTimeout { .. } => true,
            Self::Remote(error) => error.is_transient(),
            _ => false,
        }
    }

    /// Short machine-readable error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Remote(_) | Self::ClearIncomplete(_) => "remote",
            Self::IndexingFailed(_) => "indexing_failed",
            Self::IndexingTimeout { .. } => "indexing_timeout",
            Self::Configuration(_) => "configuration",
        }
    }
}
