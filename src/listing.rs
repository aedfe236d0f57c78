//! Home page listing and its "load more" pagination
//!
//! A listing starts from the first page of summaries and follows the
//! opaque `next_page` cursor returned by the content source. New batches are
//! appended to what is already shown.

use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::content::{ContentSource, PostFormatter, PostSummary, Predicate, Query, SearchResponse};
use crate::error::Result;

/// One page of formatted summaries and the cursor for the next one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPagination {
    pub next_page: Option<String>,
    pub results: Vec<PostSummary>,
}

impl PostPagination {
    /// Format every document of a search response
    pub fn from_response(response: &SearchResponse, formatter: &PostFormatter) -> Result<Self> {
        let results = response
            .results
            .iter()
            .map(|doc| formatter.summary(doc))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            next_page: response.next_page.clone(),
            results,
        })
    }
}

/// Where a listing is in its pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingState {
    /// Showing the first page only
    Initial,
    /// At least one more page was loaded and more remain
    Loaded,
    /// No further cursor
    Exhausted,
}

/// The home page post feed
#[derive(Debug, Clone)]
pub struct Listing {
    posts: Vec<PostSummary>,
    next_page: Option<String>,
    state: ListingState,
}

impl Listing {
    /// Start a listing from its first page
    pub fn new(first_page: PostPagination) -> Self {
        let next_page = first_page.next_page.filter(|cursor| !cursor.is_empty());
        let state = if next_page.is_some() {
            ListingState::Initial
        } else {
            ListingState::Exhausted
        };

        Self {
            posts: first_page.results,
            next_page,
            state,
        }
    }

    /// Query and format the first page of posts
    pub async fn first_page<S: ContentSource>(
        source: &S,
        formatter: &PostFormatter,
        config: &SiteConfig,
    ) -> Result<Self> {
        let doc_type = &config.api.document_type;
        let query = Query::new(Predicate::document_type(doc_type))
            .fetch(doc_type, &config.listing.fetch)
            .page_size(config.listing.page_size)
            .orderings(config.listing.orderings.as_deref());

        let response = source.query(&query).await?;
        tracing::debug!(
            "Listing first page: {} of {} posts",
            response.results.len(),
            response.total_results_size
        );
        Ok(Self::new(PostPagination::from_response(&response, formatter)?))
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    /// Whether a "load more" control should be shown
    pub fn has_more(&self) -> bool {
        self.state != ListingState::Exhausted
    }

    /// Fetch the page at the stored cursor and append its posts.
    ///
    /// Returns the posts that were added; posts whose `uid` is already shown
    /// are skipped. On failure the listing is left untouched. An exhausted
    /// listing returns an empty batch without fetching.
    pub async fn load_more<S: ContentSource>(
        &mut self,
        source: &S,
        formatter: &PostFormatter,
    ) -> Result<&[PostSummary]> {
        let Some(cursor) = self.next_page.as_deref() else {
            return Ok(&[]);
        };

        let response = source.fetch_page(cursor).await?;
        let page = PostPagination::from_response(&response, formatter)?;

        let start = self.posts.len();
        for post in page.results {
            if self.posts.iter().any(|p| p.uid == post.uid) {
                tracing::debug!("Skipping duplicate post {}", post.uid);
                continue;
            }
            self.posts.push(post);
        }

        self.next_page = page.next_page.filter(|cursor| !cursor.is_empty());
        self.state = if self.next_page.is_some() {
            ListingState::Loaded
        } else {
            ListingState::Exhausted
        };

        Ok(&self.posts[start..])
    }

    /// Current view as a pagination value
    pub fn to_pagination(&self) -> PostPagination {
        PostPagination {
            next_page: self.next_page.clone(),
            results: self.posts.clone(),
        }
    }
}
