//! Built-in site templates using the Tera template engine
//!
//! Templates and static assets are embedded in the binary. Text values are
//! autoescaped; pre-rendered HTML (sanitized post bodies) and URLs built by
//! the URL helpers are marked `safe` in the templates.

use serde::Serialize;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{ContentBlock, PostDetail, PostSummary};
use crate::error::Result;
use crate::helpers::{encode_segment, full_url_for, post_url, url_for};

/// Stylesheet written to the public directory
pub const STYLESHEET: &str = include_str!("assets/styles.css");

/// Default logo, used when the site has no `static/images/logo.svg`
pub const LOGO_SVG: &str = include_str!("assets/logo.svg");

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("index.html", include_str!("site/index.html")),
            ("post.html", include_str!("site/post.html")),
            ("loading.html", include_str!("site/loading.html")),
            ("not_found.html", include_str!("site/not_found.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("site/partials/header.html"),
            ),
            (
                "partials/post_card.html",
                include_str!("site/partials/post_card.html"),
            ),
        ])?;

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub description: String,
    pub language: String,
    pub home: String,
    pub logo: String,
    pub stylesheet: String,
}

impl ConfigData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            language: config.language.clone(),
            home: url_for(config, "/"),
            logo: url_for(config, &config.logo),
            stylesheet: url_for(config, "styles.css"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostCardData {
    pub uid: String,
    pub url: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub first_publication_date: Option<String>,
    pub published_at: Option<String>,
}

impl PostCardData {
    pub fn from_summary(config: &SiteConfig, post: &PostSummary) -> Self {
        Self {
            uid: post.uid.clone(),
            url: post_url(config, &post.uid),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            first_publication_date: post.first_publication_date.clone(),
            published_at: post.published_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPageData {
    pub uid: String,
    pub permalink: String,
    pub title: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub first_publication_date: Option<String>,
    pub published_at: Option<String>,
}

impl PostPageData {
    pub fn from_detail(config: &SiteConfig, post: &PostDetail) -> Self {
        Self {
            uid: post.summary.uid.clone(),
            permalink: full_url_for(config, &format!("post/{}/", encode_segment(&post.summary.uid))),
            title: post.summary.title.clone(),
            author: post.summary.author.clone(),
            banner_url: post.banner_url.clone(),
            first_publication_date: post.summary.first_publication_date.clone(),
            published_at: post.summary.published_at.clone(),
        }
    }
}

/// A content block with its body already rendered and sanitized
#[derive(Debug, Clone, Serialize)]
pub struct BlockData {
    pub heading: String,
    pub html: String,
}

impl BlockData {
    pub fn from_block(block: &ContentBlock) -> Self {
        Self {
            heading: block.heading.clone(),
            html: crate::content::sanitize::sanitize_html(&block.body.as_html()),
        }
    }
}

/// A pre-rendered "load more" batch, fetched by the listing page script
#[derive(Debug, Clone, Serialize)]
pub struct PaginationFragment {
    pub next_page: Option<String>,
    pub results: Vec<PostSummary>,
    /// Cards for `results`, ready to append to the list
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse() {
        assert!(TemplateRenderer::new().is_ok());
    }

    #[test]
    fn test_block_data_is_sanitized() {
        let block: ContentBlock = serde_json::from_str(
            r#"{"heading": "Intro", "body": [
                {"type": "paragraph", "text": "<script>alert(1)</script> ok", "spans": [
                    {"start": 26, "end": 28, "type": "hyperlink", "data": {"url": "javascript:alert(1)"}}
                ]}
            ]}"#,
        )
        .unwrap();
        let data = BlockData::from_block(&block);
        assert_eq!(data.heading, "Intro");
        assert_eq!(data.html, "<p>&lt;script&gt;alert(1)&lt;/script&gt; <a>ok</a></p>");
    }

    #[test]
    fn test_post_card_urls() {
        let config = SiteConfig::default();
        let card = PostCardData::from_summary(
            &config,
            &PostSummary {
                uid: "criando-um-app".to_string(),
                first_publication_date: Some("19 abr 2021".to_string()),
                published_at: None,
                title: "Criando um app".to_string(),
                subtitle: String::new(),
                author: "Danilo Vieira".to_string(),
            },
        );
        assert_eq!(card.url, "/post/criando-um-app/");
    }
}
