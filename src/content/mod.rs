//! Content module - fetching documents and turning them into posts

pub mod client;
mod document;
#[cfg(test)]
pub(crate) mod memory;
mod post;
mod reading_time;
mod richtext;
pub mod sanitize;

pub use client::{ContentClient, ContentSource, Predicate, Query};
pub use document::{ApiInfo, ApiRef, Document, SearchResponse};
pub use post::{ContentBlock, PostDetail, PostFormatter, PostSummary};
pub use reading_time::{EstimatedReadingTime, WORDS_PER_MINUTE};
pub use richtext::{BlockKind, RichText, RichTextBlock, Span, SpanKind};

#[cfg(test)]
pub(crate) use post::fixtures;
