//! Resumable upload into a File Search store.
//!
//! The protocol takes two requests: a `start` call carrying the metadata, which answers with a
//! session URL in `x-goog-upload-url`, then a single `upload, finalize` call with the bytes.
//! The finalize response is the long-running import operation.

use reqwest::Method;
use serde_json::json;

use super::client::GeminiService;
use super::types::{GeminiError, OperationDto};
use crate::processing::{DocumentUpload, StoreHandle};

const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Send the file and return the import operation.
pub(crate) async fn upload_to_store(
    service: &GeminiService,
    store: &StoreHandle,
    upload: &DocumentUpload,
) -> Result<OperationDto, GeminiError> {
    let path = format!("upload/v1beta/{}:uploadToFileSearchStore", store.id);
    let response = service
        .request(Method::POST, &path)
        .header("X-Goog-Upload-Protocol", "resumable")
        .header("X-Goog-Upload-Command", "start")
        .header(
            "X-Goog-Upload-Header-Content-Length",
            upload.bytes.len().to_string(),
        )
        .header(
            "X-Goog-Upload-Header-Content-Type",
            upload.mime_type.as_str(),
        )
        .json(&json!({
            "displayName": upload.filename,
            "mimeType": upload.mime_type,
        }))
        .send()
        .await?;
    let response = service.ensure_success(response, &path).await?;

    let session_url = response
        .headers()
        .get(UPLOAD_URL_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(GeminiError::MissingUploadUrl)?;
    tracing::debug!(store = %store.id, filename = %upload.filename, "Upload session started");

    let response = service
        .request_url(Method::POST, &session_url)
        .header("X-Goog-Upload-Command", "upload, finalize")
        .header("X-Goog-Upload-Offset", "0")
        .body(upload.bytes.clone())
        .send()
        .await?;
    let response = service.ensure_success(response, "upload session").await?;
    let operation: OperationDto = response.json().await?;

    tracing::debug!(
        store = %store.id,
        filename = %upload.filename,
        operation = %operation.name,
        done = operation.done,
        "Upload finalized"
    );
    Ok(operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiModel;
    use httpmock::{Method::POST, MockServer};

    fn upload() -> DocumentUpload {
        DocumentUpload {
            filename: "notes.txt".into(),
            mime_type: "text/plain".into(),
            bytes: b"hello world".to_vec(),
        }
    }

    fn store() -> StoreHandle {
        StoreHandle {
            id: "fileSearchStores/s1".into(),
            display_name: "papers".into(),
            create_time: None,
        }
    }

    #[tokio::test]
    async fn start_then_finalize_returns_operation() {
        let server = MockServer::start_async().await;
        let service = GeminiService::from_parts(&server.base_url(), "test-key", GeminiModel::Flash)
            .expect("service");
        let session_url = server.url("/resumable/session-1");

        let start = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload/v1beta/fileSearchStores/s1:uploadToFileSearchStore")
                    .header("x-goog-api-key", "test-key")
                    .header("x-goog-upload-protocol", "resumable")
                    .header("x-goog-upload-command", "start")
                    .header("x-goog-upload-header-content-length", "11")
                    .header("x-goog-upload-header-content-type", "text/plain")
                    .body_contains("\"displayName\":\"notes.txt\"");
                then.status(200)
                    .header("x-goog-upload-url", session_url.clone());
            })
            .await;

        let finalize = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/resumable/session-1")
                    .header("x-goog-upload-command", "upload, finalize")
                    .header("x-goog-upload-offset", "0")
                    .body("hello world");
                then.status(200).json_body(serde_json::json!({
                    "name": "fileSearchStores/s1/upload/operations/op-1"
                }));
            })
            .await;

        let operation = upload_to_store(&service, &store(), &upload())
            .await
            .expect("operation");

        start.assert();
        finalize.assert();
        assert_eq!(operation.name, "fileSearchStores/s1/upload/operations/op-1");
        assert!(!operation.done);
    }

    #[tokio::test]
    async fn missing_session_url_is_an_error() {
        let server = MockServer::start_async().await;
        let service = GeminiService::from_parts(&server.base_url(), "test-key", GeminiModel::Flash)
            .expect("service");
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload/v1beta/fileSearchStores/s1:uploadToFileSearchStore");
                then.status(200);
            })
            .await;

        let err = upload_to_store(&service, &store(), &upload())
            .await
            .expect_err("no session");
        assert!(matches!(err, GeminiError::MissingUploadUrl));
    }

    #[tokio::test]
    async fn rejected_start_surfaces_the_status() {
        let server = MockServer::start_async().await;
        let service = GeminiService::from_parts(&server.base_url(), "test-key", GeminiModel::Flash)
            .expect("service");
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload/v1beta/fileSearchStores/s1:uploadToFileSearchStore");
                then.status(400).body("unsupported mime type");
            })
            .await;

        let err = upload_to_store(&service, &store(), &upload())
            .await
            .expect_err("rejected");
        assert!(matches!(
            err,
            GeminiError::UnexpectedStatus { status, ref body }
                if status.as_u16() == 400 && body == "unsupported mime type"
        ));
    }
}
