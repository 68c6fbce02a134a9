//! Store manager: store lookup, document listing, duplicate detection, and bulk delete.

use super::types::{ClearReport, DeletionFailure, DocumentRecord, ServiceError, StoreHandle};
use crate::remote::FileSearchRemote;

/// Look up the store by display name, creating it when absent.
pub async fn ensure_store(
    remote: &dyn FileSearchRemote,
    display_name: &str,
) -> Result<StoreHandle, ServiceError> {
    let store = remote.create_or_get_store(display_name).await?;
    tracing::info!(store = %store.id, display_name, "Store ready");
    Ok(store)
}

/// Current documents in the store, oldest upload first.
///
/// Records without a creation time keep their remote order after the dated ones.
pub async fn list_documents(
    remote: &dyn FileSearchRemote,
    store: &StoreHandle,
) -> Result<Vec<DocumentRecord>, ServiceError> {
    let mut documents = remote.list_documents(store).await?;
    documents.sort_by_key(|doc| (doc.create_time.is_none(), doc.create_time));
    tracing::debug!(store = %store.id, count = documents.len(), "Listed documents");
    Ok(documents)
}

/// First record whose filename matches exactly.
pub async fn find_document(
    remote: &dyn FileSearchRemote,
    store: &StoreHandle,
    filename: &str,
) -> Result<Option<DocumentRecord>, ServiceError> {
    Ok(list_documents(remote, store)
        .await?
        .into_iter()
        .find(|doc| doc.filename == filename))
}

/// Whether a record with exactly this filename is present.
pub async fn document_exists(
    remote: &dyn FileSearchRemote,
    store: &StoreHandle,
    filename: &str,
) -> Result<bool, ServiceError> {
    Ok(find_document(remote, store, filename).await?.is_some())
}

/// Delete every document in the store.
///
/// Deletion continues past individual failures. When any deletion fails the whole operation
/// returns [`ServiceError::ClearIncomplete`] with the full report; re-list to observe the
/// final state.
pub async fn clear_store(
    remote: &dyn FileSearchRemote,
    store: &StoreHandle,
) -> Result<ClearReport, ServiceError> {
    let documents = list_documents(remote, store).await?;
    let mut report = ClearReport::default();

    for document in documents {
        match remote.delete_document(store, &document.id).await {
            Ok(()) => {
                tracing::debug!(store = %store.id, document = %document.id, "Document deleted");
                report.deleted.push(document.filename);
            }
            Err(error) => {
                tracing::warn!(
                    store = %store.id,
                    document = %document.id,
                    filename = %document.filename,
                    error = %error,
                    "Failed to delete document"
                );
                report.failed.push(DeletionFailure {
                    id: document.id,
                    filename: document.filename,
                    error: error.to_string(),
                });
            }
        }
    }

    tracing::info!(
        store = %store.id,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "Store cleared"
    );

    if report.failed.is_empty() {
        Ok(report)
    } else {
        Err(ServiceError::ClearIncomplete(report))
    }
}

/// Delete the first document with this filename. Returns `false` when there is none.
pub async fn remove_document(
    remote: &dyn FileSearchRemote,
    store: &StoreHandle,
    filename: &str,
) -> Result<bool, ServiceError> {
    let Some(document) = find_document(remote, store, filename).await? else {
        return Ok(false);
    };
    remote.delete_document(store, &document.id).await?;
    tracing::info!(store = %store.id, document = %document.id, filename, "Document removed");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::DocumentState;
    use crate::remote::fake::FakeRemote;
    use time::macros::datetime;

    #[tokio::test]
    async fn ensure_store_is_idempotent() {
        let remote = FakeRemote::new();
        let first = ensure_store(&remote, "papers").await.expect("first");
        let second = ensure_store(&remote, "papers").await.expect("second");
        assert_eq!(first, second);
        assert_eq!(remote.calls().create_or_get, 2);
    }

    #[tokio::test]
    async fn document_exists_matches_exact_filename() {
        let remote = FakeRemote::new().with_documents(&["report.pdf"]);
        let store = FakeRemote::store();
        let cases = [
            ("report.pdf", true),
            ("Report.pdf", false),
            ("report", false),
        ];
        for (filename, expected) in cases {
            let exists = document_exists(&remote, &store, filename)
                .await
                .expect("lookup");
            assert_eq!(exists, expected, "{filename}");
        }
    }

    #[tokio::test]
    async fn clear_store_continues_after_a_failed_deletion() {
        let remote = FakeRemote::new()
            .with_documents(&["a.txt", "b.txt", "c.txt"])
            .with_failing_delete("b.txt");
        let store = FakeRemote::store();

        let err = clear_store(&remote, &store)
            .await
            .expect_err("partial failure");
        let ServiceError::ClearIncomplete(report) = err else {
            panic!("expected ClearIncomplete, got {err:?}");
        };
        assert_eq!(report.deleted, ["a.txt", "c.txt"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "b.txt");
        assert_eq!(remote.calls().delete, 3);

        let remaining = list_documents(&remote, &store).await.expect("relist");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].filename, "b.txt");
    }

    #[tokio::test]
    async fn clear_store_reports_every_deletion() {
        let remote = FakeRemote::new().with_documents(&["a.txt", "b.txt"]);
        let store = FakeRemote::store();
        let report = clear_store(&remote, &store).await.expect("cleared");
        assert_eq!(report.deleted.len(), 2);
        assert!(report.failed.is_empty());
        assert!(remote.documents().is_empty());
    }

    #[tokio::test]
    async fn remove_document_reports_missing_files() {
        let remote = FakeRemote::new().with_documents(&["a.txt"]);
        let store = FakeRemote::store();
        let missing = remove_document(&remote, &store, "missing.txt").await;
        assert_eq!(missing.ok(), Some(false));
        let removed = remove_document(&remote, &store, "a.txt").await;
        assert_eq!(removed.ok(), Some(true));
        assert_eq!(remote.calls().delete, 1);
        assert!(remote.documents().is_empty());
    }

    #[tokio::test]
    async fn listing_orders_by_upload_time_with_undated_last() {
        let dated = |name: &str, at| DocumentRecord {
            id: format!("fileSearchStores/fake-store/documents/{name}"),
            filename: name.into(),
            state: DocumentState::Active,
            size_bytes: 0,
            mime_type: None,
            create_time: at,
            failure_reason: None,
        };
        let remote = FakeRemote::new().with_records(vec![
            dated("undated", None),
            dated("late", Some(datetime!(2025-03-02 10:00 UTC))),
            dated("early", Some(datetime!(2025-03-01 10:00 UTC))),
        ]);

        let docs = list_documents(&remote, &FakeRemote::store())
            .await
            .expect("list");
        let names: Vec<_> = docs.iter().map(|doc| doc.filename.as_str()).collect();
        assert_eq!(names, ["early", "late", "undated"]);
    }
}
