//! HTTP client for the headless content API

use std::fmt;
use std::future::Future;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use super::document::{ApiInfo, Document, SearchResponse};
use crate::config::ApiConfig;
use crate::error::{BlogError, Result};

/// A query filter, rendered in the API's predicate syntax
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `path` equals `value`
    At { path: String, value: String },
    /// `path` differs from `value`
    Not { path: String, value: String },
    /// `path` equals one of `values`
    Any { path: String, values: Vec<String> },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::At {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn not(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Not {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn any<I, S>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Documents of the given custom type
    pub fn document_type(doc_type: &str) -> Self {
        Self::at("document.type", doc_type)
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At { path, value } => write!(f, "[at({}, {})]", path, quote(value)),
            Self::Not { path, value } => write!(f, "[not({}, {})]", path, quote(value)),
            Self::Any { path, values } => {
                let values: Vec<String> = values.iter().map(|v| quote(v)).collect();
                write!(f, "[any({}, [{}])]", path, values.join(", "))
            }
        }
    }
}

/// A document search: predicates, field projection and paging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    /// Fully qualified fields to return, e.g. `posts.title`
    pub fetch: Vec<String>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
    pub orderings: Option<String>,
}

impl Query {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicates: vec![predicate],
            ..Self::default()
        }
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Restrict returned fields; names are qualified with `doc_type`
    pub fn fetch<I, S>(mut self, doc_type: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fetch = fields
            .into_iter()
            .map(|field| format!("{}.{}", doc_type, field.as_ref()))
            .collect();
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Sort order, e.g. `[document.first_publication_date desc]`
    pub fn orderings(mut self, orderings: Option<&str>) -> Self {
        self.orderings = orderings.map(str::to_string);
        self
    }

    /// Value of the `q` parameter
    pub fn q(&self) -> String {
        let predicates: String = self.predicates.iter().map(|p| p.to_string()).collect();
        format!("[{}]", predicates)
    }

    /// Query string parameters, excluding `ref` and credentials
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", self.q())];
        if !self.fetch.is_empty() {
            params.push(("fetch", self.fetch.join(",")));
        }
        if let Some(page_size) = self.page_size {
            params.push(("pageSize", page_size.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(orderings) = &self.orderings {
            params.push(("orderings", orderings.clone()));
        }
        params
    }
}

/// Anything that can answer document queries and follow page cursors.
///
/// Both page generation and "load more" pagination go through this trait.
pub trait ContentSource: Send + Sync {
    /// Run a search and return the first matching page
    fn query(&self, query: &Query) -> impl Future<Output = Result<SearchResponse>> + Send;

    /// Fetch the page an opaque `next_page` cursor points at
    fn fetch_page(&self, cursor: &str) -> impl Future<Output = Result<SearchResponse>> + Send;

    /// Resolve one document of `doc_type` by its UID
    fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
    ) -> impl Future<Output = Result<Document>> + Send;
}

/// Content API client. All settings come from the [`ApiConfig`] it is
/// created with.
#[derive(Debug, Clone)]
pub struct ContentClient {
    client: Client,
    config: ApiConfig,
    endpoint: Url,
}

impl ContentClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/')).map_err(|e| {
            BlogError::Config(format!("invalid api endpoint {}: {}", config.endpoint, e))
        })?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| BlogError::ContentFetch {
                url: endpoint.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// The ref to query against: the configured one, or the master ref
    pub async fn master_ref(&self) -> Result<String> {
        if let Some(reference) = &self.config.ref_id {
            return Ok(reference.clone());
        }

        let mut url = self.endpoint.clone();
        self.append_token(&mut url);
        let info: ApiInfo = self.get_json(url).await?;
        info.master_ref()
            .map(str::to_string)
            .ok_or_else(|| BlogError::MissingRef(self.endpoint.to_string()))
    }

    /// Full search URL for a query
    pub fn search_url(&self, query: &Query, reference: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["documents", "search"]);
        }
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", reference);
            for (key, value) in query.params() {
                pairs.append_pair(key, &value);
            }
        }
        self.append_token(&mut url);
        url
    }

    fn append_token(&self, url: &mut Url) {
        if let Some(token) = &self.config.access_token {
            let present = url.query_pairs().any(|(key, _)| key == "access_token");
            if !present {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        // Credentials stay out of the logs
        let display_url = format!("{}{}", url.origin().ascii_serialization(), url.path());
        tracing::debug!("GET {}", display_url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| BlogError::ContentFetch {
                url: display_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlogError::UpstreamStatus {
                url: display_url,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| BlogError::ContentFetch {
                url: display_url,
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl ContentSource for ContentClient {
    async fn query(&self, query: &Query) -> Result<SearchResponse> {
        let reference = self.master_ref().await?;
        let url = self.search_url(query, &reference);
        self.get_json(url).await
    }

    async fn fetch_page(&self, cursor: &str) -> Result<SearchResponse> {
        let mut url = Url::parse(cursor).map_err(|_| BlogError::InvalidCursor(cursor.to_string()))?;
        if url.origin() != self.endpoint.origin() {
            return Err(BlogError::InvalidCursor(cursor.to_string()));
        }
        self.append_token(&mut url);
        self.get_json(url).await
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document> {
        let query = Query::new(Predicate::at(format!("my.{}.uid", doc_type), uid)).page_size(1);
        let response = self.query(&query).await?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| BlogError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
    }
}
