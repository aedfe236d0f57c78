//! Display-ready posts and the formatter that builds them from documents

use serde::{Deserialize, Serialize};

use super::document::Document;
use super::reading_time::EstimatedReadingTime;
use super::richtext::RichText;
use crate::error::{BlogError, Result};
use crate::helpers::{date_xml, parse_api_date, DateFormatter};

/// A post as shown on the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Unique key of the post, used in its URL
    pub uid: String,
    /// Localized publication date; `None` for documents never published
    pub first_publication_date: Option<String>,
    /// Machine-readable publication date for `<time datetime>`
    pub published_at: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A post as shown on its own page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub summary: PostSummary,
    pub banner_url: Option<String>,
    pub content: Vec<ContentBlock>,
    pub reading_time: EstimatedReadingTime,
}

/// A section of a post: a heading followed by rich text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub body: RichText,
}

/// Fields of the `posts` custom type
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFields {
    title: Option<String>,
    subtitle: Option<String>,
    author: Option<String>,
    banner: Option<Banner>,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Banner {
    url: Option<String>,
}

/// Turns raw documents into display posts
#[derive(Debug, Clone)]
pub struct PostFormatter {
    dates: DateFormatter,
}

impl PostFormatter {
    pub fn new(dates: DateFormatter) -> Self {
        Self { dates }
    }

    /// Build a listing summary. `subtitle` may be absent; `uid`, `title` and
    /// `author` may not.
    pub fn summary(&self, document: &Document) -> Result<PostSummary> {
        let fields = parse_fields(document)?;
        self.build_summary(document, &fields)
    }

    /// Build a full post, including its content and reading time
    pub fn detail(&self, document: &Document) -> Result<PostDetail> {
        let fields = parse_fields(document)?;
        let summary = self.build_summary(document, &fields)?;
        let reading_time = EstimatedReadingTime::estimate(&fields.content);

        Ok(PostDetail {
            summary,
            banner_url: fields
                .banner
                .and_then(|b| b.url)
                .filter(|url| !url.is_empty()),
            content: fields.content,
            reading_time,
        })
    }

    fn build_summary(&self, document: &Document, fields: &PostFields) -> Result<PostSummary> {
        let uid = document
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| BlogError::malformed(&document.id, "missing uid"))?;

        let published = match document.first_publication_date.as_deref() {
            Some(value) => Some(parse_api_date(value).ok_or_else(|| {
                BlogError::malformed(
                    &document.id,
                    format!("unparseable first_publication_date {:?}", value),
                )
            })?),
            None => None,
        };

        Ok(PostSummary {
            uid,
            first_publication_date: published.as_ref().map(|d| self.dates.format(d)),
            published_at: published.as_ref().map(date_xml),
            title: required(document, "title", &fields.title)?,
            subtitle: fields.subtitle.clone().unwrap_or_default(),
            author: required(document, "author", &fields.author)?,
        })
    }
}

fn parse_fields(document: &Document) -> Result<PostFields> {
    if document.data.is_null() {
        return Ok(PostFields::default());
    }
    serde_json::from_value(document.data.clone())
        .map_err(|e| BlogError::malformed(&document.id, e.to_string()))
}

fn required(document: &Document, field: &str, value: &Option<String>) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| BlogError::malformed(&document.id, format!("missing {}", field)))
}
