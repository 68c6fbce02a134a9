//! In-memory [`FileSearchRemote`] used by unit tests.

use super::{FileSearchRemote, RemoteError};
use crate::processing::{
    Citation, DocumentRecord, DocumentState, DocumentUpload, QueryAnswer, StoreHandle,
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Calls {
    pub create_or_get: usize,
    pub uploads: usize,
    pub status: usize,
    pub list: usize,
    pub delete: usize,
    pub ask: usize,
}

impl Calls {
    pub(crate) fn total(&self) -> usize {
        self.create_or_get + self.uploads + self.status + self.list + self.delete + self.ask
    }
}

#[derive(Default)]
struct FakeState {
    stores: Vec<StoreHandle>,
    documents: Vec<DocumentRecord>,
    upload_error: Option<RemoteError>,
    upload_state: Option<DocumentState>,
    status_script: VecDeque<Result<DocumentState, RemoteError>>,
    failing_deletes: HashSet<String>,
    answer: Option<Result<QueryAnswer, RemoteError>>,
    calls: Calls,
    next_id: usize,
}

pub(crate) struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn store() -> StoreHandle {
        StoreHandle {
            id: "fileSearchStores/fake-store".into(),
            display_name: "fake".into(),
            create_time: None,
        }
    }

    /// Seed active documents with the given filenames.
    pub(crate) fn with_documents(self, filenames: &[&str]) -> Self {
        {
            let mut state = self.lock();
            for filename in filenames {
                let id = format!(
                    "fileSearchStores/fake-store/documents/seed-{}",
                    state.next_id
                );
                state.next_id += 1;
                state.documents.push(record(id, filename, DocumentState::Active));
            }
        }
        self
    }

    pub(crate) fn with_records(self, records: Vec<DocumentRecord>) -> Self {
        self.lock().documents.extend(records);
        self
    }

    /// States (or errors) returned by successive `document_status` calls.
    pub(crate) fn with_status_script(
        self,
        script: Vec<Result<DocumentState, RemoteError>>,
    ) -> Self {
        self.lock().status_script = script.into();
        self
    }

    pub(crate) fn with_upload_error(self, error: RemoteError) -> Self {
        self.lock().upload_error = Some(error);
        self
    }

    pub(crate) fn with_upload_state(self, state: DocumentState) -> Self {
        self.lock().upload_state = Some(state);
        self
    }

    pub(crate) fn with_failing_delete(self, filename: &str) -> Self {
        {
            let mut state = self.lock();
            let ids: Vec<String> = state
                .documents
                .iter()
                .filter(|doc| doc.filename == filename)
                .map(|doc| doc.id.clone())
                .collect();
            state.failing_deletes.extend(ids);
        }
        self
    }

    pub(crate) fn with_answer(self, answer: Result<QueryAnswer, RemoteError>) -> Self {
        self.lock().answer = Some(answer);
        self
    }

    pub(crate) fn calls(&self) -> Calls {
        self.lock().calls
    }

    pub(crate) fn documents(&self) -> Vec<DocumentRecord> {
        self.lock().documents.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake remote poisoned")
    }
}

fn record(id: String, filename: &str, state: DocumentState) -> DocumentRecord {
    DocumentRecord {
        id,
        filename: filename.to_string(),
        state,
        size_bytes: 0,
        mime_type: None,
        create_time: None,
        failure_reason: None,
    }
}

#[async_trait]
impl FileSearchRemote for FakeRemote {
    async fn create_or_get_store(&self, display_name: &str) -> Result<StoreHandle, RemoteError> {
        let mut state = self.lock();
        state.calls.create_or_get += 1;
        if let Some(existing) = state
            .stores
            .iter()
            .find(|store| store.display_name == display_name)
        {
            return Ok(existing.clone());
        }
        let store = StoreHandle {
            id: format!("fileSearchStores/{display_name}-{}", state.stores.len()),
            display_name: display_name.to_string(),
            create_time: None,
        };
        state.stores.push(store.clone());
        Ok(store)
    }

    async fn upload_document(
        &self,
        _store: &StoreHandle,
        upload: &DocumentUpload,
    ) -> Result<DocumentRecord, RemoteError> {
        let mut state = self.lock();
        state.calls.uploads += 1;
        if let Some(error) = state.upload_error.clone() {
            return Err(error);
        }
        let id = format!("fileSearchStores/fake-store/documents/up-{}", state.next_id);
        state.next_id += 1;
        let initial = state.upload_state.unwrap_or(DocumentState::Processing);
        let mut uploaded = record(id, &upload.filename, initial);
        uploaded.size_bytes = upload.bytes.len() as u64;
        uploaded.mime_type = Some(upload.mime_type.clone());
        state.documents.push(uploaded.clone());
        Ok(uploaded)
    }

    async fn document_status(
        &self,
        _store: &StoreHandle,
        document: &DocumentRecord,
    ) -> Result<DocumentRecord, RemoteError> {
        let mut state = self.lock();
        state.calls.status += 1;
        let next = state.status_script.pop_front();
        let stored = state
            .documents
            .iter_mut()
            .find(|doc| doc.id == document.id)
            .ok_or_else(|| RemoteError::Rejected {
                status: 404,
                body: format!("{} not found", document.id),
            })?;
        match next {
            Some(Ok(new_state)) => {
                stored.state = new_state;
                if new_state == DocumentState::Failed {
                    stored.failure_reason = Some("unsupported content".into());
                }
                Ok(stored.clone())
            }
            Some(Err(error)) => Err(error),
            None => Ok(stored.clone()),
        }
    }

    async fn list_documents(
        &self,
        _store: &StoreHandle,
    ) -> Result<Vec<DocumentRecord>, RemoteError> {
        let mut state = self.lock();
        state.calls.list += 1;
        Ok(state.documents.clone())
    }

    async fn delete_document(
        &self,
        _store: &StoreHandle,
        document_id: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.calls.delete += 1;
        if state.failing_deletes.contains(document_id) {
            return Err(RemoteError::Unavailable {
                status: 503,
                body: "backend unavailable".into(),
            });
        }
        state.documents.retain(|doc| doc.id != document_id);
        Ok(())
    }

    async fn ask(&self, _store: &StoreHandle, question: &str) -> Result<QueryAnswer, RemoteError> {
        let mut state = self.lock();
        state.calls.ask += 1;
        state.answer.clone().unwrap_or_else(|| {
            Ok(QueryAnswer {
                text: format!("echo: {question}"),
                citations: vec![Citation {
                    source: "seed.pdf".into(),
                    snippet: None,
                    uri: None,
                }],
            })
        })
    }
}
