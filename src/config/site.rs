//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable that overrides `api.access_token`
pub const ACCESS_TOKEN_ENV: &str = "SPACETRAVELING_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub language: String,
    pub logo: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub static_dir: String,
    pub i18n_dir: String,

    // Content API
    #[serde(default)]
    pub api: ApiConfig,

    // Home page
    #[serde(default)]
    pub listing: ListingConfig,

    // Post pages
    pub static_paths: usize,
    pub revalidate_secs: u64,

    // Date / Time format
    pub date_format: String,
    pub locale: String,
    pub timezone: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            description: String::new(),
            language: "pt-BR".to_string(),
            logo: "/images/logo.svg".to_string(),

            url: "http://localhost:4000".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            static_dir: "static".to_string(),
            i18n_dir: "languages".to_string(),

            api: ApiConfig::default(),
            listing: ListingConfig::default(),

            static_paths: 2,
            revalidate_secs: 60 * 60 * 24,

            date_format: "dd MMM yyyy".to_string(),
            locale: "pt_BR".to_string(),
            timezone: "America/Sao_Paulo".to_string(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: SiteConfig = serde_yaml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides (credentials stay out of _config.yml)
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                self.api.access_token = Some(token);
            }
        }
    }
}

/// Content API connection settings, handed to the content client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API entry point, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Pin queries to a fixed ref instead of the master ref
    pub ref_id: Option<String>,
    /// Custom type of blog posts in the repository
    pub document_type: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://spacetraveling.cdn.prismic.io/api/v2".to_string(),
            access_token: None,
            ref_id: None,
            document_type: "posts".to_string(),
            user_agent: format!("spacetraveling/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Home page listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub page_size: u32,
    /// Fields fetched for each summary (without the type prefix)
    pub fetch: Vec<String>,
    /// Directory holding the pre-rendered "load more" batches
    pub pagination_dir: String,
    /// Sort order of the listing; the API default when unset
    pub orderings: Option<String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: 4,
            fetch: vec![
                "title".to_string(),
                "subtitle".to_string(),
                "author".to_string(),
            ],
            pagination_dir: "posts".to_string(),
            orderings: None,
        }
    }
}
