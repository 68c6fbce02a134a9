//! Upload/index orchestration: validate, skip duplicates, submit, and poll until terminal.

use super::{
    poll::{IndexingPolicy, retry_transient},
    store::find_document,
    types::{
        DocumentRecord, DocumentState, DocumentUpload, IndexedDocument, PollProgress,
        ServiceError, StoreHandle,
    },
    validate::{content_digest, detect_mime_type, validate_upload},
};
use crate::remote::FileSearchRemote;
use tokio::time::Instant;

/// Upload a file and wait until the remote service has indexed it.
///
/// 1. Unnamed, empty, or oversized files fail with [`ServiceError::Validation`] before any
///    remote call.
/// 2. A document with the same filename short-circuits: its record is returned as-is with
///    `skipped = true` and nothing is uploaded.
/// 3. Submission errors propagate immediately.
/// 4. Every `policy.poll_interval` the status is re-fetched and `on_progress` is invoked,
///    whether or not the state changed. Transient poll failures are retried up to
///    `policy.max_transient_retries` times.
/// 5. The loop ends on `active`, on `failed` ([`ServiceError::IndexingFailed`]), or once
///    `policy.timeout` has elapsed since submission ([`ServiceError::IndexingTimeout`]).
///
/// Abandoning the returned future stops the local observation only; the remote job keeps
/// running.
pub async fn upload_and_index<F>(
    remote: &dyn FileSearchRemote,
    store: &StoreHandle,
    policy: &IndexingPolicy,
    filename: &str,
    bytes: Vec<u8>,
    mut on_progress: F,
) -> Result<IndexedDocument, ServiceError>
where
    F: FnMut(&PollProgress) + Send,
{
    validate_upload(filename, bytes.len(), policy.max_upload_bytes)?;
    let digest = content_digest(&bytes);

    if let Some(existing) = find_document(remote, store, filename).await? {
        tracing::info!(
            store = %store.id,
            filename,
            document = %existing.id,
            state = %existing.state,
            "Document already present; skipping upload"
        );
        return Ok(IndexedDocument {
            record: existing,
            skipped: true,
            polls: 0,
            content_digest: digest,
        });
    }

    let upload = DocumentUpload {
        filename: filename.to_string(),
        mime_type: detect_mime_type(filename),
        bytes,
    };
    tracing::info!(
        store = %store.id,
        filename,
        mime_type = %upload.mime_type,
        size = upload.bytes.len(),
        sha256 = %digest,
        "Submitting document"
    );
    let mut record = remote.upload_document(store, &upload).await?;
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut polls = 0u32;

    loop {
        match record.state {
            DocumentState::Active => {
                tracing::info!(
                    store = %store.id,
                    filename,
                    document = %record.id,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Document indexed"
                );
                return Ok(IndexedDocument {
                    record,
                    skipped: false,
                    polls,
                    content_digest: digest,
                });
            }
            DocumentState::Failed => {
                tracing::warn!(
                    store = %store.id,
                    filename,
                    document = %record.id,
                    reason = record.failure_reason.as_deref().unwrap_or("unspecified"),
                    "Document indexing failed"
                );
                return Err(ServiceError::IndexingFailed(Box::new(record)));
            }
            DocumentState::Processing if polls > 0 && started.elapsed() >= policy.timeout => {
                let waited = started.elapsed();
                tracing::warn!(
                    store = %store.id,
                    filename,
                    document = %record.id,
                    polls,
                    waited_secs = waited.as_secs(),
                    "Indexing timed out"
                );
                return Err(ServiceError::IndexingTimeout {
                    record: Box::new(record),
                    waited,
                });
            }
            DocumentState::Processing => {}
        }

        tokio::time::sleep(policy.poll_interval).await;
        let Some(next) = poll_status(remote, store, policy, deadline, &record).await? else {
            let waited = started.elapsed();
            tracing::warn!(
                store = %store.id,
                filename,
                document = %record.id,
                polls,
                waited_secs = waited.as_secs(),
                "Indexing timed out while the status endpoint was failing"
            );
            return Err(ServiceError::IndexingTimeout {
                record: Box::new(record),
                waited,
            });
        };
        record = next;
        polls += 1;

        let progress = PollProgress {
            record: record.clone(),
            poll: polls,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            filename,
            document = %record.id,
            poll = polls,
            state = %record.state,
            elapsed_ms = progress.elapsed.as_millis() as u64,
            "Indexing status polled"
        );
        on_progress(&progress);
    }
}

async fn poll_status(
    remote: &dyn FileSearchRemote,
    store: &StoreHandle,
    policy: &IndexingPolicy,
    deadline: Instant,
    current: &DocumentRecord,
) -> Result<Option<DocumentRecord>, ServiceError> {
    let record = retry_transient(policy, deadline, "document_status", move || {
        remote.document_status(store, current)
    })
    .await?;
    Ok(record)
}
