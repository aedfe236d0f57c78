//! Reading time estimation

use serde::Serialize;

use super::post::ContentBlock;

/// Reading speed used for every estimate
pub const WORDS_PER_MINUTE: usize = 200;

/// Word count and estimated minutes for a post body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EstimatedReadingTime {
    pub words_count: usize,
    pub reading_time: usize,
}

impl EstimatedReadingTime {
    /// Estimate the reading time of a sequence of content blocks.
    ///
    /// Words are counted by splitting on single spaces without trimming, so
    /// an empty heading or body still counts as one word. An empty sequence
    /// estimates to zero minutes.
    pub fn estimate(content: &[ContentBlock]) -> Self {
        content.iter().fold(Self::default(), |mut acc, block| {
            let heading_words = count_words(&block.heading);
            let body_words = count_words(&block.body.as_text());

            acc.words_count += heading_words + body_words;
            acc.reading_time = acc.words_count.div_ceil(WORDS_PER_MINUTE);
            acc
        })
    }
}

fn count_words(text: &str) -> usize {
    text.split(' ').count()
}
