//! In-memory content source used by tests

use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Url;

use super::client::{ContentSource, Predicate, Query};
use super::document::{Document, SearchResponse};
use crate::error::{BlogError, Result};

/// Serves a fixed set of documents with API-like paging and projection
pub struct MemorySource {
    documents: Vec<Document>,
    requests: AtomicUsize,
}

impl MemorySource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of queries, page fetches and lookups served so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn search(
        &self,
        doc_type: Option<&str>,
        fetch: &[String],
        page: u32,
        page_size: u32,
    ) -> SearchResponse {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let matching: Vec<&Document> = self
            .documents
            .iter()
            .filter(|d| doc_type.map_or(true, |t| d.doc_type == t))
            .collect();

        let page_size = page_size.max(1);
        let total = matching.len() as u32;
        let total_pages = total.div_ceil(page_size);
        let start = ((page - 1) * page_size) as usize;

        let results: Vec<Document> = matching
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .map(|d| project(d, fetch))
            .collect();

        let next_page = (page < total_pages).then(|| {
            let mut url = Url::parse("memory://api/documents/search").unwrap();
            url.query_pairs_mut()
                .append_pair("page", &(page + 1).to_string())
                .append_pair("pageSize", &page_size.to_string())
                .append_pair("type", doc_type.unwrap_or(""))
                .append_pair("fetch", &fetch.join(","));
            url.to_string()
        });

        SearchResponse {
            page,
            results_per_page: page_size,
            results_size: results.len() as u32,
            total_results_size: total,
            total_pages,
            next_page,
            prev_page: None,
            results,
        }
    }
}

/// Keep only the fetched fields, like the API does
fn project(document: &Document, fetch: &[String]) -> Document {
    let mut document = document.clone();
    if fetch.is_empty() {
        return document;
    }
    if let Some(data) = document.data.as_object_mut() {
        let prefix = format!("{}.", document.doc_type);
        data.retain(|key, _| fetch.iter().any(|f| f.strip_prefix(&prefix) == Some(key.as_str())));
    }
    document
}

impl ContentSource for MemorySource {
    async fn query(&self, query: &Query) -> Result<SearchResponse> {
        let doc_type = query.predicates.iter().find_map(|p| match p {
            Predicate::At { path, value } if path == "document.type" => Some(value.as_str()),
            _ => None,
        });
        Ok(self.search(
            doc_type,
            &query.fetch,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(20),
        ))
    }

    async fn fetch_page(&self, cursor: &str) -> Result<SearchResponse> {
        let url = Url::parse(cursor).map_err(|_| BlogError::InvalidCursor(cursor.to_string()))?;
        if url.scheme() != "memory" {
            return Err(BlogError::InvalidCursor(cursor.to_string()));
        }

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default()
        };
        let page = param("page")
            .parse()
            .map_err(|_| BlogError::InvalidCursor(cursor.to_string()))?;
        let page_size = param("pageSize").parse().unwrap_or(20);
        let doc_type = param("type");
        let fetch: Vec<String> = param("fetch")
            .split(',')
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        Ok(self.search(
            Some(doc_type.as_str()).filter(|t| !t.is_empty()),
            &fetch,
            page,
            page_size,
        ))
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents
            .iter()
            .find(|d| d.doc_type == doc_type && d.uid.as_deref() == Some(uid))
            .cloned()
            .ok_or_else(|| BlogError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
    }
}

mod tests {
    use super::*;
    use crate::content::fixtures::post_document;

    fn source(count: usize) -> MemorySource {
        MemorySource::new(
            (1..=count)
                .map(|i| post_document(&format!("post-{}", i), &format!("Post {}", i), None))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_pages_follow_cursor() {
        let source = source(5);
        let query = Query::new(Predicate::document_type("posts"))
            .fetch("posts", ["title"])
            .page_size(2);

        let first = source.query(&query).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.results[0].data.as_object().unwrap().len(), 1);

        let second = source.fetch_page(first.next_page.as_deref().unwrap()).await.unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(second.results[0].uid.as_deref(), Some("post-3"));
        assert_eq!(second.results[0].data.as_object().unwrap().len(), 1);

        let third = source.fetch_page(second.next_page.as_deref().unwrap()).await.unwrap();
        assert_eq!(third.results.len(), 1);
        assert_eq!(third.next_page, None);
        assert_eq!(source.requests(), 3);
    }

    #[tokio::test]
    async fn test_get_by_uid() {
        let source = source(2);
        assert!(source.get_by_uid("posts", "post-2").await.is_ok());
        assert!(source.get_by_uid("posts", "nope").await.unwrap_err().is_not_found());
    }
}
