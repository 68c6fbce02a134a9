//! Wire types and errors for the Gemini File Search REST API.

use crate::processing::AnswerError;
use crate::remote::RemoteError;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Errors returned while talking to the Gemini REST API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Gemini URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Gemini responded with an unexpected status code.
    #[error("Unexpected Gemini response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Gemini.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Resumable upload start did not return a session URL.
    #[error("Upload session URL missing from response")]
    MissingUploadUrl,
    /// Model response cannot be turned into an answer.
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

impl From<GeminiError> for RemoteError {
    fn from(error: GeminiError) -> Self {
        match error {
            GeminiError::Http(err) if err.is_decode() => RemoteError::Malformed(err.to_string()),
            GeminiError::Http(err) => RemoteError::Transport(err.to_string()),
            GeminiError::UnexpectedStatus { status, body } => {
                RemoteError::from_status(status.as_u16(), body)
            }
            GeminiError::Answer(err) => RemoteError::Answer(err),
            other @ (GeminiError::InvalidUrl(_) | GeminiError::MissingUploadUrl) => {
                RemoteError::Malformed(other.to_string())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileSearchStoreDto {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListStoresResponse {
    #[serde(default)]
    pub file_search_stores: Vec<FileSearchStoreDto>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentDto {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "int64")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<DocumentDto>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Long-running operation returned by `uploadToFileSearchStore`.
#[derive(Debug, Deserialize)]
pub(crate) struct OperationDto {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationStatus>,
    #[serde(default)]
    pub response: Option<Value>,
}

impl OperationDto {
    pub fn document_name(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|response| response.get("documentName"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationStatus {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<CandidateDto>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CandidateDto {
    #[serde(default)]
    pub content: Option<ContentDto>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    pub citation_metadata: Option<CitationMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContentDto {
    #[serde(default)]
    pub parts: Vec<PartDto>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PartDto {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroundingChunk {
    #[serde(default)]
    pub retrieved_context: Option<SourceRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CitationMetadata {
    #[serde(default, alias = "citationSources")]
    pub citations: Vec<SourceRef>,
}

/// Title/URI/text triple shared by grounding chunks and citation sources.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SourceRef {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Accept int64 values encoded either as JSON strings or numbers.
fn int64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        Text(String),
    }

    match Option::<Int64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Int64::Number(value)) => Ok(Some(value)),
        Some(Int64::Text(text)) => text
            .parse()
            .map(Some)
            .map_err(|_| {
                serde::de::Error::custom(format!("invalid int64 value '{text}'"))
            }),
    }
}
