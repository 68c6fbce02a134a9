//! Session-level service tying the store manager, orchestrator, and query path together.

use crate::{
    config::{ConfigError, get_config},
    gemini::{GeminiError, GeminiService},
    metrics::{IndexingMetrics, MetricsSnapshot},
    processing::{
        orchestrator,
        poll::IndexingPolicy,
        store,
        types::{
            ClearReport, DocumentRecord, IndexedDocument, PollProgress, QueryAnswer,
            ServiceError, StoreHandle,
        },
        validate::validate_question,
    },
    remote::FileSearchRemote,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the remote handle, the resolved store, and the indexing policy for one process.
///
/// Uploads are serialised: concurrent callers queue on a FIFO gate and run one at a time in
/// arrival order. Listing, clearing, and asking do not wait on the gate.
pub struct FileSearchService {
    remote: Box<dyn FileSearchRemote>,
    store: StoreHandle,
    policy: IndexingPolicy,
    metrics: Arc<IndexingMetrics>,
    upload_gate: Mutex<()>,
}

/// Outcome of one upload together with every progress update it produced.
#[derive(Debug)]
pub struct UploadReport {
    /// Indexed document, or the error that ended the upload.
    pub outcome: Result<IndexedDocument, ServiceError>,
    /// One entry per status poll, including polls made before a failure.
    pub progress: Vec<PollProgress>,
}

/// Abstraction over the service used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait FileSearchApi: Send + Sync {
    /// Store all operations act on.
    fn store(&self) -> &StoreHandle;

    /// Largest accepted upload in bytes.
    fn max_upload_bytes(&self) -> usize;

    /// Current documents, oldest first.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, ServiceError>;

    /// Upload and wait for indexing, collecting progress updates.
    async fn upload(&self, filename: String, bytes: Vec<u8>) -> UploadReport;

    /// Delete every document in the store.
    async fn clear_store(&self) -> Result<ClearReport, ServiceError>;

    /// Delete one document by filename.
    async fn remove_document(&self, filename: &str) -> Result<bool, ServiceError>;

    /// Ask a question against the store.
    async fn ask(&self, question: &str) -> Result<QueryAnswer, ServiceError>;

    /// Current counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl FileSearchService {
    /// Build the service from the global configuration, resolving the configured store.
    pub async fn new() -> Result<Self, ServiceError> {
        let config = get_config()?;
        let remote = GeminiService::new(config).map_err(|error| match error {
            GeminiError::InvalidUrl(_) => {
                ServiceError::Configuration(ConfigError::InvalidValue("GEMINI_BASE_URL".into()))
            }
            other => ServiceError::Remote(other.into()),
        })?;
        Self::connect(
            Box::new(remote),
            &config.store_display_name,
            IndexingPolicy::from(config),
        )
        .await
    }

    /// Build the service around any remote implementation.
    pub async fn connect(
        remote: Box<dyn FileSearchRemote>,
        store_display_name: &str,
        policy: IndexingPolicy,
    ) -> Result<Self, ServiceError> {
        let store = store::ensure_store(remote.as_ref(), store_display_name).await?;
        Ok(Self {
            remote,
            store,
            policy,
            metrics: Arc::new(IndexingMetrics::new()),
            upload_gate: Mutex::new(()),
        })
    }

    /// Store resolved at construction.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Policy applied to uploads.
    pub fn policy(&self) -> &IndexingPolicy {
        &self.policy
    }

    /// Current documents, oldest first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>, ServiceError> {
        store::list_documents(self.remote.as_ref(), &self.store).await
    }

    /// Upload a file and wait for indexing, forwarding every poll to `on_progress`.
    pub async fn upload_and_index<F>(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        mut on_progress: F,
    ) -> Result<IndexedDocument, ServiceError>
    where
        F: FnMut(&PollProgress) + Send,
    {
        let _turn = self.upload_gate.lock().await;
        let mut polls = 0u32;
        let result = orchestrator::upload_and_index(
            self.remote.as_ref(),
            &self.store,
            &self.policy,
            filename,
            bytes,
            |progress| {
                polls = progress.poll;
                on_progress(progress);
            },
        )
        .await;

        self.metrics.record_polls(polls);
        match &result {
            Ok(document) if document.skipped => self.metrics.record_skipped(),
            Ok(_) => self.metrics.record_indexed(),
            Err(_) => self.metrics.record_failed(),
        }
        result
    }

    /// Delete every document in the store.
    pub async fn clear_store(&self) -> Result<ClearReport, ServiceError> {
        let result = store::clear_store(self.remote.as_ref(), &self.store).await;
        match &result {
            Ok(report) | Err(ServiceError::ClearIncomplete(report)) => {
                self.metrics.record_deleted(report.deleted.len());
            }
            Err(_) => {}
        }
        result
    }

    /// Delete one document by filename.
    pub async fn remove_document(&self, filename: &str) -> Result<bool, ServiceError> {
        let removed = store::remove_document(self.remote.as_ref(), &self.store, filename).await?;
        if removed {
            self.metrics.record_deleted(1);
        }
        Ok(removed)
    }

    /// Ask a question, using the store for retrieval.
    pub async fn ask(&self, question: &str) -> Result<QueryAnswer, ServiceError> {
        let question = validate_question(question)?;
        tracing::info!(store = %self.store.id, chars = question.len(), "Asking question");
        let answer = self.remote.ask(&self.store, question).await?;
        tracing::info!(
            store = %self.store.id,
            citations = answer.citations.len(),
            "Answer received"
        );
        Ok(answer)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl FileSearchApi for FileSearchService {
    fn store(&self) -> &StoreHandle {
        FileSearchService::store(self)
    }

    fn max_upload_bytes(&self) -> usize {
        self.policy.max_upload_bytes
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, ServiceError> {
        FileSearchService::list_documents(self).await
    }

    async fn upload(&self, filename: String, bytes: Vec<u8>) -> UploadReport {
        let mut progress = Vec::new();
        let outcome = self
            .upload_and_index(&filename, bytes, |update| progress.push(update.clone()))
            .await;
        UploadReport { outcome, progress }
    }

    async fn clear_store(&self) -> Result<ClearReport, ServiceError> {
        FileSearchService::clear_store(self).await
    }

    async fn remove_document(&self, filename: &str) -> Result<bool, ServiceError> {
        FileSearchService::remove_document(self, filename).await
    }

    async fn ask(&self, question: &str) -> Result<QueryAnswer, ServiceError> {
        FileSearchService::ask(self, question).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        FileSearchService::metrics_snapshot(self)
    }
}
