//! Structured rich text as returned by the content API
//!
//! A rich text value is a list of blocks (paragraphs, headings, list items,
//! images, embeds). Text blocks carry inline spans addressed by UTF-16
//! offsets into the block text.

use serde::{Deserialize, Serialize};

use crate::helpers::{html_escape, image_tag};

/// A rich text field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText(pub Vec<RichTextBlock>);

/// Block kinds understood by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "preformatted")]
    Preformatted,
    #[serde(rename = "heading1")]
    Heading1,
    #[serde(rename = "heading2")]
    Heading2,
    #[serde(rename = "heading3")]
    Heading3,
    #[serde(rename = "heading4")]
    Heading4,
    #[serde(rename = "heading5")]
    Heading5,
    #[serde(rename = "heading6")]
    Heading6,
    #[serde(rename = "list-item")]
    ListItem,
    #[serde(rename = "o-list-item")]
    OListItem,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "embed")]
    Embed,
    #[serde(other)]
    Unknown,
}

/// One rich text block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Image source
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub oembed: Option<Embed>,
}

/// Inline formatting over `[start, end)` of the block text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink,
    Label,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl RichText {
    /// Build a rich text value of plain paragraphs
    pub fn from_paragraphs<I, S>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            paragraphs
                .into_iter()
                .map(|text| RichTextBlock::text(BlockKind::Paragraph, text))
                .collect(),
        )
    }

    /// Plain text of every text-bearing block, joined by a single space
    pub fn as_text(&self) -> String {
        self.0
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render to HTML. Text is escaped; the output still goes through the
    /// sanitizer before it reaches a page.
    pub fn as_html(&self) -> String {
        let mut html = String::new();
        let mut open_list: Option<BlockKind> = None;

        for block in &self.0 {
            let list_kind = match block.kind {
                BlockKind::ListItem | BlockKind::OListItem => Some(block.kind),
                _ => None,
            };

            if open_list != list_kind {
                if let Some(kind) = open_list {
                    html.push_str(list_close(kind));
                }
                if let Some(kind) = list_kind {
                    html.push_str(list_open(kind));
                }
                open_list = list_kind;
            }

            html.push_str(&block.to_html());
        }

        if let Some(kind) = open_list {
            html.push_str(list_close(kind));
        }

        html
    }
}

fn list_open(kind: BlockKind) -> &'static str {
    if kind == BlockKind::OListItem {
        "<ol>"
    } else {
        "<ul>"
    }
}

fn list_close(kind: BlockKind) -> &'static str {
    if kind == BlockKind::OListItem {
        "</ol>"
    } else {
        "</ul>"
    }
}

impl RichTextBlock {
    /// A text block without spans
    pub fn text(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
            spans: Vec::new(),
            url: None,
            alt: None,
            oembed: None,
        }
    }

    fn to_html(&self) -> String {
        let inner = || render_spans(self.text.as_deref().unwrap_or(""), &self.spans);

        match self.kind {
            BlockKind::Paragraph => format!("<p>{}</p>", inner()),
            BlockKind::Preformatted => format!("<pre>{}</pre>", inner()),
            BlockKind::Heading1 => format!("<h1>{}</h1>", inner()),
            BlockKind::Heading2 => format!("<h2>{}</h2>", inner()),
            BlockKind::Heading3 => format!("<h3>{}</h3>", inner()),
            BlockKind::Heading4 => format!("<h4>{}</h4>", inner()),
            BlockKind::Heading5 => format!("<h5>{}</h5>", inner()),
            BlockKind::Heading6 => format!("<h6>{}</h6>", inner()),
            BlockKind::ListItem | BlockKind::OListItem => format!("<li>{}</li>", inner()),
            BlockKind::Image => match &self.url {
                Some(url) => format!(
                    r#"<p class="block-img">{}</p>"#,
                    image_tag(url, self.alt.as_deref())
                ),
                None => String::new(),
            },
            BlockKind::Embed => match self.oembed.as_ref().and_then(|e| e.embed_url.as_deref()) {
                Some(url) => {
                    let title = self
                        .oembed
                        .as_ref()
                        .and_then(|e| e.title.as_deref())
                        .unwrap_or(url);
                    format!(
                        r#"<p class="embed"><a href="{}">{}</a></p>"#,
                        html_escape(url),
                        html_escape(title)
                    )
                }
                None => String::new(),
            },
            BlockKind::Unknown => match &self.text {
                Some(_) => format!("<p>{}</p>", inner()),
                None => String::new(),
            },
        }
    }
}

impl Span {
    fn open_tag(&self) -> String {
        match self.kind {
            SpanKind::Strong => "<strong>".to_string(),
            SpanKind::Em => "<em>".to_string(),
            SpanKind::Hyperlink => {
                let data = self.data.as_ref();
                let url = data.and_then(|d| d.url.as_deref()).unwrap_or("#");
                match data.and_then(|d| d.target.as_deref()) {
                    Some(target) => format!(
                        r#"<a href="{}" target="{}" rel="noopener">"#,
                        html_escape(url),
                        html_escape(target)
                    ),
                    None => format!(r#"<a href="{}">"#, html_escape(url)),
                }
            }
            SpanKind::Label => {
                let label = self
                    .data
                    .as_ref()
                    .and_then(|d| d.label.as_deref())
                    .unwrap_or("");
                format!(r#"<span class="{}">"#, html_escape(label))
            }
            SpanKind::Unknown => "<span>".to_string(),
        }
    }

    fn close_tag(&self) -> &'static str {
        match self.kind {
            SpanKind::Strong => "</strong>",
            SpanKind::Em => "</em>",
            SpanKind::Hyperlink => "</a>",
            SpanKind::Label | SpanKind::Unknown => "</span>",
        }
    }
}

/// Convert a UTF-16 offset into a byte offset, clamped to the text length
fn utf16_to_byte(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (index, c) in text.char_indices() {
        if units >= offset {
            return index;
        }
        units += c.len_utf16();
    }
    text.len()
}

fn escape_segment(text: &str) -> String {
    html_escape(text).replace('\n', "<br />")
}

/// Render block text with its spans. Overlapping spans are closed and
/// reopened so the output stays well nested.
fn render_spans(text: &str, spans: &[Span]) -> String {
    let ranges: Vec<(usize, usize, &Span)> = spans
        .iter()
        .map(|s| (utf16_to_byte(text, s.start), utf16_to_byte(text, s.end), s))
        .filter(|(start, end, _)| start < end)
        .collect();

    if ranges.is_empty() {
        return escape_segment(text);
    }

    let mut bounds: Vec<usize> = vec![0, text.len()];
    for (start, end, _) in &ranges {
        bounds.push(*start);
        bounds.push(*end);
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut html = String::new();
    // Indexes into `ranges`, outermost first
    let mut stack: Vec<usize> = Vec::new();

    for window in bounds.windows(2) {
        let (seg_start, seg_end) = (window[0], window[1]);
        let active = |i: usize| ranges[i].0 <= seg_start && ranges[i].1 >= seg_end;

        // Close down to the first span that is no longer active
        if let Some(depth) = stack.iter().position(|&i| !active(i)) {
            let reopen: Vec<usize> = stack[depth..]
                .iter()
                .copied()
                .filter(|&i| active(i))
                .collect();
            for &i in stack[depth..].iter().rev() {
                html.push_str(ranges[i].2.close_tag());
            }
            stack.truncate(depth);
            for i in reopen {
                html.push_str(&ranges[i].2.open_tag());
                stack.push(i);
            }
        }

        // Open new spans, longest first
        let mut opening: Vec<usize> = (0..ranges.len())
            .filter(|&i| active(i) && !stack.contains(&i))
            .collect();
        opening.sort_by(|&a, &b| ranges[b].1.cmp(&ranges[a].1).then(a.cmp(&b)));
        for i in opening {
            html.push_str(&ranges[i].2.open_tag());
            stack.push(i);
        }

        html.push_str(&escape_segment(&text[seg_start..seg_end]));
    }

    for &i in stack.iter().rev() {
        html.push_str(ranges[i].2.close_tag());
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RichText {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_as_text_joins_blocks() {
        let text = parse(
            r#"[
                {"type": "paragraph", "text": "Hello world", "spans": []},
                {"type": "image", "url": "https://images.prismic.io/x.png"},
                {"type": "paragraph", "text": "again", "spans": []}
            ]"#,
        );
        assert_eq!(text.as_text(), "Hello world again");
        assert_eq!(RichText::default().as_text(), "");
    }

    #[test]
    fn test_as_html_paragraphs_and_escaping() {
        let text = RichText::from_paragraphs(["a < b", "line\nbreak"]);
        assert_eq!(text.as_html(), "<p>a &lt; b</p><p>line<br />break</p>");
    }

    #[test]
    fn test_as_html_groups_lists() {
        let text = parse(
            r#"[
                {"type": "list-item", "text": "one", "spans": []},
                {"type": "list-item", "text": "two", "spans": []},
                {"type": "o-list-item", "text": "first", "spans": []},
                {"type": "paragraph", "text": "end", "spans": []}
            ]"#,
        );
        assert_eq!(
            text.as_html(),
            "<ul><li>one</li><li>two</li></ul><ol><li>first</li></ol><p>end</p>"
        );
    }

    #[test]
    fn test_spans() {
        let text = parse(
            r#"[{"type": "paragraph", "text": "Read the docs now", "spans": [
                {"start": 0, "end": 4, "type": "strong"},
                {"start": 9, "end": 13, "type": "hyperlink",
                 "data": {"link_type": "Web", "url": "https://reactjs.org"}}
            ]}]"#,
        );
        assert_eq!(
            text.as_html(),
            r#"<p><strong>Read</strong> the <a href="https://reactjs.org">docs</a> now</p>"#
        );
    }

    #[test]
    fn test_nested_and_overlapping_spans() {
        let nested = render_spans(
            "abcdef",
            &[
                Span { start: 0, end: 6, kind: SpanKind::Strong, data: None },
                Span { start: 2, end: 4, kind: SpanKind::Em, data: None },
            ],
        );
        assert_eq!(nested, "<strong>ab<em>cd</em>ef</strong>");

        let overlapping = render_spans(
            "abcdef",
            &[
                Span { start: 0, end: 4, kind: SpanKind::Strong, data: None },
                Span { start: 2, end: 6, kind: SpanKind::Em, data: None },
            ],
        );
        assert_eq!(overlapping, "<strong>ab<em>cd</em></strong><em>ef</em>");
    }

    #[test]
    fn test_spans_use_utf16_offsets() {
        let html = render_spans(
            "ação 😀 fim",
            &[Span { start: 5, end: 7, kind: SpanKind::Em, data: None }],
        );
        assert_eq!(html, "ação <em>😀</em> fim");
    }

    #[test]
    fn test_unknown_kinds_are_tolerated() {
        let text = parse(
            r#"[{"type": "table", "text": "cell", "spans": [
                {"start": 0, "end": 4, "type": "mark"}
            ]}]"#,
        );
        assert_eq!(text.as_html(), "<p><span>cell</span></p>");
    }
}
