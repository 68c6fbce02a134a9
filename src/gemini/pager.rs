//! Streaming helpers for iterating `pageToken`-paginated list endpoints without manual loops.

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::TryStreamExt;
use reqwest::Method;
use serde::de::DeserializeOwned;

use super::client::GeminiService;
use super::types::{
    DocumentDto, FileSearchStoreDto, GeminiError, ListDocumentsResponse, ListStoresResponse,
};

/// Largest page size accepted by the document and store list endpoints.
pub(crate) const MAX_PAGE_SIZE: u32 = 20;

/// One page of a list response.
pub(crate) trait Page: DeserializeOwned + Send + 'static {
    type Item: Send + 'static;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl Page for ListStoresResponse {
    type Item = FileSearchStoreDto;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.file_search_stores, self.next_page_token)
    }
}

impl Page for ListDocumentsResponse {
    type Item = DocumentDto;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.documents, self.next_page_token)
    }
}

/// Stream every item of a paginated list endpoint, following `nextPageToken` until it is absent.
pub(crate) fn paginate<'a, P>(
    service: &'a GeminiService,
    path: String,
) -> impl Stream<Item = Result<P::Item, GeminiError>> + 'a
where
    P: Page,
{
    try_stream! {
        let mut page_token: Option<String> = None;

        loop {
            let mut request = service
                .request(Method::GET, &path)
                .query(&[("pageSize", MAX_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = service.ensure_success(request.send().await?, &path).await?;
            let page: P = response.json().await?;
            let (items, next) = page.into_parts();
            for item in items {
                yield item;
            }

            match next.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
    }
}

/// Collect every item of a paginated list endpoint.
pub(crate) async fn collect_all<P>(
    service: &GeminiService,
    path: String,
) -> Result<Vec<P::Item>, GeminiError>
where
    P: Page,
{
    paginate::<P>(service, path).try_collect().await
}
