//! HTTP client wrapper for the Gemini File Search API.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use super::{
    answer::into_answer,
    pager::collect_all,
    types::{
        DocumentDto, FileSearchStoreDto, GeminiError, GenerateContentResponse,
        ListDocumentsResponse, ListStoresResponse, OperationDto,
    },
    upload::upload_to_store,
};
use crate::config::{Config, GeminiModel};
use crate::processing::{DocumentRecord, DocumentState, DocumentUpload, QueryAnswer, StoreHandle};
use crate::remote::{FileSearchRemote, RemoteError};

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Lightweight HTTP client for File Search operations.
pub struct GeminiService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: GeminiModel,
}

impl GeminiService {
    /// Construct a client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, GeminiError> {
        let service = Self::from_parts(
            &config.gemini_base_url,
            &config.gemini_api_key,
            config.model,
        )?;
        tracing::debug!(
            url = %service.base_url,
            model = %service.model,
            "Initialized Gemini HTTP client"
        );
        Ok(service)
    }

    /// Construct a client from explicit values.
    pub fn from_parts(
        base_url: &str,
        api_key: &str,
        model: GeminiModel,
    ) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .user_agent(concat!("filesearch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = normalize_base_url(base_url).map_err(GeminiError::InvalidUrl)?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            model,
        })
    }

    /// Look up a store by display name, paging through every store.
    pub async fn find_store(&self, display_name: &str) -> Result<Option<StoreHandle>, GeminiError> {
        let stores =
            collect_all::<ListStoresResponse>(self, format!("{API_VERSION}/fileSearchStores"))
                .await?;
        Ok(stores
            .into_iter()
            .find(|store| store.display_name.as_deref() == Some(display_name))
            .map(store_handle))
    }

    /// Create a store with the given display name.
    pub async fn create_store(&self, display_name: &str) -> Result<StoreHandle, GeminiError> {
        let path = format!("{API_VERSION}/fileSearchStores");
        let response = self
            .request(Method::POST, &path)
            .json(&json!({ "displayName": display_name }))
            .send()
            .await?;
        let store: FileSearchStoreDto = self.ensure_success(response, &path).await?.json().await?;
        tracing::info!(store = %store.name, display_name, "Created file search store");
        Ok(store_handle(store))
    }

    /// Fetch one document by resource name.
    pub async fn get_document(&self, name: &str) -> Result<DocumentRecord, GeminiError> {
        let path = format!("{API_VERSION}/{name}");
        let response = self.request(Method::GET, &path).send().await?;
        let document: DocumentDto = self.ensure_success(response, &path).await?.json().await?;
        Ok(document_record(document))
    }

    async fn get_operation(&self, name: &str) -> Result<OperationDto, GeminiError> {
        let path = format!("{API_VERSION}/{name}");
        let response = self.request(Method::GET, &path).send().await?;
        Ok(self.ensure_success(response, &path).await?.json().await?)
    }

    /// Map an import operation onto a record, carrying `pending` forward while it runs.
    async fn resolve_operation(
        &self,
        operation: OperationDto,
        pending: &DocumentRecord,
    ) -> Result<DocumentRecord, GeminiError> {
        let mut record = DocumentRecord {
            id: operation.name.clone(),
            ..pending.clone()
        };
        if !operation.done {
            record.state = DocumentState::Processing;
            return Ok(record);
        }
        if let Some(status) = &operation.error {
            record.state = DocumentState::Failed;
            record.failure_reason = Some(format!("{} | {}", status.code, status.message));
            return Ok(record);
        }
        match operation.document_name() {
            Some(name) => {
                let mut document = self.get_document(name).await?;
                if document.filename.is_empty() {
                    document.filename = pending.filename.clone();
                }
                Ok(document)
            }
            None => {
                record.state = DocumentState::Active;
                Ok(record)
            }
        }
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.request_url(method, &format_endpoint(&self.base_url, path))
    }

    pub(crate) fn request_url(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
    }

    pub(crate) async fn ensure_success(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, GeminiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = GeminiError::UnexpectedStatus { status, body };
        tracing::error!(request = context, error = %error, "Gemini request failed");
        Err(error)
    }
}

#[async_trait]
impl FileSearchRemote for GeminiService {
    async fn create_or_get_store(&self, display_name: &str) -> Result<StoreHandle, RemoteError> {
        if let Some(store) = self.find_store(display_name).await? {
            tracing::debug!(store = %store.id, display_name, "Found existing store");
            return Ok(store);
        }
        Ok(self.create_store(display_name).await?)
    }

    async fn upload_document(
        &self,
        store: &StoreHandle,
        upload: &DocumentUpload,
    ) -> Result<DocumentRecord, RemoteError> {
        let operation = upload_to_store(self, store, upload).await?;
        let pending = DocumentRecord {
            id: operation.name.clone(),
            filename: upload.filename.clone(),
            state: DocumentState::Processing,
            size_bytes: upload.bytes.len() as u64,
            mime_type: Some(upload.mime_type.clone()),
            create_time: None,
            failure_reason: None,
        };
        Ok(self.resolve_operation(operation, &pending).await?)
    }

    async fn document_status(
        &self,
        _store: &StoreHandle,
        document: &DocumentRecord,
    ) -> Result<DocumentRecord, RemoteError> {
        if is_operation(&document.id) {
            let operation = self.get_operation(&document.id).await?;
            return Ok(self.resolve_operation(operation, document).await?);
        }
        Ok(self.get_document(&document.id).await?)
    }

    async fn list_documents(
        &self,
        store: &StoreHandle,
    ) -> Result<Vec<DocumentRecord>, RemoteError> {
        let documents = collect_all::<ListDocumentsResponse>(
            self,
            format!("{API_VERSION}/{}/documents", store.id),
        )
        .await?;
        Ok(documents.into_iter().map(document_record).collect())
    }

    async fn delete_document(
        &self,
        _store: &StoreHandle,
        document_id: &str,
    ) -> Result<(), RemoteError> {
        let path = format!("{API_VERSION}/{document_id}");
        let response = self
            .request(Method::DELETE, &path)
            .query(&[("force", true)])
            .send()
            .await
            .map_err(GeminiError::from)?;
        self.ensure_success(response, &path).await?;
        Ok(())
    }

    async fn ask(&self, store: &StoreHandle, question: &str) -> Result<QueryAnswer, RemoteError> {
        let path = format!("{API_VERSION}/models/{}:generateContent", self.model);
        let body = json!({
            "contents": [ { "role": "user", "parts": [ { "text": question } ] } ],
            "tools": [ { "fileSearch": { "fileSearchStoreNames": [ store.id ] } } ],
        });
        let response = self
            .request(Method::POST, &path)
            .json(&body)
            .send()
            .await
            .map_err(GeminiError::from)?;
        let response: GenerateContentResponse = self
            .ensure_success(response, &path)
            .await?
            .json()
            .await
            .map_err(GeminiError::from)?;
        Ok(into_answer(response).map_err(GeminiError::from)?)
    }
}

fn is_operation(id: &str) -> bool {
    id.contains("/operations/")
}

fn store_handle(store: FileSearchStoreDto) -> StoreHandle {
    StoreHandle {
        display_name: store.display_name.unwrap_or_default(),
        create_time: parse_time(store.create_time.as_deref()),
        id: store.name,
    }
}

fn document_record(document: DocumentDto) -> DocumentRecord {
    let filename = document
        .display_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            document
                .name
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        });
    DocumentRecord {
        state: document_state(document.state.as_deref()),
        size_bytes: document.size_bytes.unwrap_or(0),
        mime_type: document.mime_type,
        create_time: parse_time(document.create_time.as_deref()),
        failure_reason: None,
        filename,
        id: document.name,
    }
}

fn document_state(state: Option<&str>) -> DocumentState {
    match state {
        Some("STATE_ACTIVE") => DocumentState::Active,
        Some("STATE_FAILED") => DocumentState::Failed,
        _ => DocumentState::Processing,
    }
}

fn parse_time(value: Option<&str>) -> Option<OffsetDateTime> {
    let value = value?;
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(time) => Some(time),
        Err(err) => {
            tracing::debug!(value, error = %err, "Ignoring unparseable timestamp");
            None
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
