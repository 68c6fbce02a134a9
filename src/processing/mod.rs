//! Document pipeline: store management, upload/index orchestration, and question answering.

mod orchestrator;
mod poll;
mod service;
pub mod store;
pub mod types;
pub mod validate;

pub use orchestrator::upload_and_index;
pub use poll::IndexingPolicy;
pub use service::{FileSearchApi, FileSearchService, UploadReport};
pub use types::{
    AnswerError, Citation, ClearReport, DeletionFailure, DocumentRecord, DocumentState,
    DocumentUpload, IndexedDocument, PollProgress, QueryAnswer, ServiceError, StoreHandle,
    ValidationError,
};
