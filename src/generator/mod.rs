//! Generator module - renders the site from a content source using the
//! built-in Tera templates

use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tera::Context;
use walkdir::WalkDir;

use crate::content::{ContentSource, PostDetail, PostFormatter, PostSummary, Predicate, Query};
use crate::error::{BlogError, Result};
use crate::helpers::{is_valid_slug, pagination_url, DateFormatter};
use crate::i18n::I18n;
use crate::listing::Listing;
use crate::templates::{
    BlockData, ConfigData, PaginationFragment, PostCardData, PostPageData, TemplateRenderer,
    LOGO_SVG, STYLESHEET,
};
use crate::Blog;

/// Seconds before the loading placeholder reloads itself
pub const LOADING_REFRESH_SECS: u64 = 2;

/// Where the placeholder for not yet generated posts is written
pub const FALLBACK_PATH: &str = "_fallback/index.html";

/// Where the not-found page is written
pub const NOT_FOUND_PATH: &str = "404.html";

/// What a post detail page shows
#[derive(Debug, Clone)]
pub enum PostPage {
    /// The post is still being generated; no content is available
    Loading,
    Loaded(PostDetail),
}

/// A page the generator can (re)build on its own
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Index,
    Post(String),
}

impl Route {
    /// Map a request path to a route. Post slugs are percent-decoded and
    /// must be valid slugs; anything else is `None`.
    pub fn parse(root: &str, path: &str) -> Option<Self> {
        let path = strip_root(root, path)?.trim_start_matches('/');

        if path.is_empty() || path == "index.html" {
            return Some(Self::Index);
        }

        let rest = path.strip_prefix("post/")?;
        let rest = rest.strip_suffix("index.html").unwrap_or(rest);
        let raw = rest.trim_end_matches('/');
        if raw.contains('/') {
            return None;
        }

        let slug = percent_decode_str(raw).decode_utf8().ok()?;
        is_valid_slug(&slug).then(|| Self::Post(slug.into_owned()))
    }

    /// Whether a request path points below the post directory
    pub fn is_post_path(root: &str, path: &str) -> bool {
        strip_root(root, path)
            .is_some_and(|path| path.trim_start_matches('/').starts_with("post/"))
    }

    /// Output file of this route inside the public directory
    pub fn output_path(&self, public_dir: &Path) -> PathBuf {
        match self {
            Self::Index => public_dir.join("index.html"),
            Self::Post(uid) => public_dir.join("post").join(uid).join("index.html"),
        }
    }
}

/// The part of `path` below the site root, or `None` outside of it
fn strip_root<'a>(root: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(root.trim_end_matches('/'))?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Outcome of a full site generation
#[derive(Debug, Default)]
pub struct GenerateReport {
    /// Home page plus pre-rendered "load more" batches
    pub listing_pages: usize,
    /// Posts generated ahead of time
    pub posts: Vec<String>,
    /// Posts that failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Static site generator over a content source
pub struct Generator<S> {
    blog: Blog,
    source: S,
    renderer: TemplateRenderer,
    formatter: PostFormatter,
    i18n: I18n,
}

impl<S: ContentSource> Generator<S> {
    /// Create a new generator
    pub fn new(blog: &Blog, source: S) -> Result<Self> {
        let renderer = TemplateRenderer::new()?;
        let formatter = PostFormatter::new(DateFormatter::from_config(&blog.config)?);

        let mut i18n = I18n::new(&blog.config.language);
        i18n.load_languages(&blog.i18n_dir)?;

        Ok(Self {
            blog: blog.clone(),
            source,
            renderer,
            formatter,
            i18n,
        })
    }

    pub fn blog(&self) -> &Blog {
        &self.blog
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Generate the entire site.
    ///
    /// A failing home page fails the build. A failing post is logged and
    /// reported; it is retried when first requested.
    pub async fn generate(&self) -> Result<GenerateReport> {
        fs::create_dir_all(&self.blog.public_dir)?;

        self.write_assets()?;
        self.copy_static_files()?;

        let mut report = GenerateReport {
            listing_pages: self.generate_index().await?,
            ..Default::default()
        };

        self.generate_fallback()?;
        self.generate_not_found()?;

        for uid in self.static_paths().await? {
            match self.generate_post(&uid).await {
                Ok(_) => report.posts.push(uid),
                Err(e) => {
                    tracing::error!("Failed to generate post {}: {}", uid, e);
                    report.failed.push((uid, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Generate the home page and every "load more" batch after it.
    ///
    /// Returns the number of listing pages written.
    pub async fn generate_index(&self) -> Result<usize> {
        let config = &self.blog.config;
        let mut listing = Listing::first_page(&self.source, &self.formatter, config).await?;
        let first_count = listing.posts().len();

        let mut seen: HashSet<String> =
            listing.next_page().map(str::to_string).into_iter().collect();
        let mut fragments = Vec::new();
        while listing.has_more() {
            let batch = listing
                .load_more(&self.source, &self.formatter)
                .await?
                .to_vec();

            let page = fragments.len() + 2;
            let repeated = listing
                .next_page()
                .is_some_and(|cursor| !seen.insert(cursor.to_string()));
            let next_page =
                (listing.has_more() && !repeated).then(|| pagination_url(config, page + 1));

            fragments.push(PaginationFragment {
                next_page,
                html: self.render_cards(&batch)?,
                results: batch,
            });

            if repeated {
                tracing::warn!("Pagination cursor repeated, stopping at page {}", page);
                break;
            }
        }

        let next_page = (!fragments.is_empty()).then(|| pagination_url(config, 2));
        let html = self.render_index(&listing.posts()[..first_count], next_page.as_deref())?;

        // Batches first, then the index, then batches the new index no longer links
        let pagination_dir = self.blog.public_dir.join(&config.listing.pagination_dir);
        for (i, fragment) in fragments.iter().enumerate() {
            let path = pagination_dir.join(format!("{}.json", i + 2));
            write_file(&path, &serde_json::to_string(fragment)?)?;
        }
        write_file(&Route::Index.output_path(&self.blog.public_dir), &html)?;
        remove_stale_fragments(&pagination_dir, fragments.len() + 1)?;
        tracing::info!(
            "Generated home page with {} posts and {} more pages",
            listing.posts().len(),
            fragments.len()
        );

        Ok(fragments.len() + 1)
    }

    /// UIDs of the posts generated ahead of time
    pub async fn static_paths(&self) -> Result<Vec<String>> {
        let config = &self.blog.config;
        if config.static_paths == 0 {
            return Ok(Vec::new());
        }

        let query = Query::new(Predicate::document_type(&config.api.document_type))
            .page_size(config.static_paths as u32);
        let response = self.source.query(&query).await?;

        Ok(response
            .results
            .iter()
            .filter_map(|doc| doc.uid.clone())
            .take(config.static_paths)
            .collect())
    }

    /// Fetch one post and write its page
    pub async fn generate_post(&self, uid: &str) -> Result<PathBuf> {
        let doc_type = &self.blog.config.api.document_type;
        if !is_valid_slug(uid) {
            return Err(BlogError::NotFound {
                doc_type: doc_type.clone(),
                uid: uid.to_string(),
            });
        }

        let document = self.source.get_by_uid(doc_type, uid).await?;
        let post = self.formatter.detail(&document)?;
        let html = self.render_post_page(&PostPage::Loaded(post))?;

        let path = Route::Post(uid.to_string()).output_path(&self.blog.public_dir);
        write_file(&path, &html)?;
        tracing::info!("Generated post: {}", uid);
        Ok(path)
    }

    /// Regenerate a route
    pub async fn generate_route(&self, route: &Route) -> Result<()> {
        match route {
            Route::Index => self.generate_index().await.map(|_| ()),
            Route::Post(uid) => self.generate_post(uid).await.map(|_| ()),
        }
    }

    /// Write the placeholder page shown while a post is generated
    pub fn generate_fallback(&self) -> Result<PathBuf> {
        let path = self.blog.public_dir.join(FALLBACK_PATH);
        write_file(&path, &self.render_post_page(&PostPage::Loading)?)?;
        Ok(path)
    }

    /// Write the not-found page
    pub fn generate_not_found(&self) -> Result<PathBuf> {
        let path = self.blog.public_dir.join(NOT_FOUND_PATH);
        write_file(&path, &self.render_not_found()?)?;
        Ok(path)
    }

    /// Render the home page
    pub fn render_index(&self, posts: &[PostSummary], next_page: Option<&str>) -> Result<String> {
        let cards: Vec<PostCardData> = posts
            .iter()
            .map(|p| PostCardData::from_summary(&self.blog.config, p))
            .collect();

        let mut context = self.base_context();
        context.insert("posts", &cards);
        context.insert("next_page", &next_page);
        self.renderer.render("index.html", &context)
    }

    /// Render a post page in either of its states
    pub fn render_post_page(&self, page: &PostPage) -> Result<String> {
        let mut context = self.base_context();

        match page {
            PostPage::Loading => {
                context.insert("refresh_secs", &LOADING_REFRESH_SECS);
                self.renderer.render("loading.html", &context)
            }
            PostPage::Loaded(post) => {
                let blocks: Vec<BlockData> =
                    post.content.iter().map(BlockData::from_block).collect();
                context.insert("post", &PostPageData::from_detail(&self.blog.config, post));
                context.insert(
                    "reading_time",
                    &self.i18n.get_count("reading_time", post.reading_time.reading_time),
                );
                context.insert("blocks", &blocks);
                self.renderer.render("post.html", &context)
            }
        }
    }

    /// Render the not-found page
    pub fn render_not_found(&self) -> Result<String> {
        self.renderer.render("not_found.html", &self.base_context())
    }

    /// Render post cards as one HTML snippet
    fn render_cards(&self, posts: &[PostSummary]) -> Result<String> {
        let mut html = String::new();
        for post in posts {
            let mut context = Context::new();
            context.insert("post", &PostCardData::from_summary(&self.blog.config, post));
            html.push_str(&self.renderer.render("partials/post_card.html", &context)?);
        }
        Ok(html)
    }

    /// Create a base context with common variables
    fn base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("config", &ConfigData::from_config(&self.blog.config));
        context.insert("i18n", &self.i18n.get_all_translations());
        context.insert("generator_version", env!("CARGO_PKG_VERSION"));
        context
    }

    /// Write the built-in stylesheet and logo
    fn write_assets(&self) -> Result<()> {
        let public_dir = &self.blog.public_dir;
        write_file(&public_dir.join("styles.css"), STYLESHEET)?;
        write_file(&public_dir.join("images").join("logo.svg"), LOGO_SVG)?;
        Ok(())
    }

    /// Copy user static files over the built-in assets
    fn copy_static_files(&self) -> Result<()> {
        let static_dir = &self.blog.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Ok(relative) = path.strip_prefix(static_dir) else {
                continue;
            };
            let dest = self.blog.public_dir.join(relative);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
            tracing::debug!("Copied: {:?}", relative);
        }

        Ok(())
    }
}

/// Write through a temporary file in the same directory, then rename it
/// over `path`
fn write_file(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }
    file.persist(path).map_err(|e| e.error)?;

    tracing::debug!("Generated: {:?}", path);
    Ok(())
}

/// Remove `{n}.json` batches with `n` above `last`
fn remove_stale_fragments(dir: &Path, last: usize) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let page = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<usize>().ok());
        if page.is_some_and(|n| n > last) {
            fs::remove_file(&path)?;
            tracing::debug!("Removed stale page: {:?}", path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::fixtures::post_document;
    use crate::content::memory::MemorySource;
    use crate::content::{Document, SearchResponse};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const DATE: &str = "2021-03-25T19:25:28+0000";

    fn documents(count: usize) -> Vec<Document> {
        (1..=count)
            .map(|i| post_document(&format!("post-{}", i), &format!("Post {}", i), Some(DATE)))
            .collect()
    }

    fn generator(dir: &Path, documents: Vec<Document>) -> Generator<MemorySource> {
        let blog = Blog::with_config(dir.to_path_buf(), SiteConfig::default());
        Generator::new(&blog, MemorySource::new(documents)).unwrap()
    }

    fn read(dir: &Path, path: &str) -> String {
        fs::read_to_string(dir.join("public").join(path)).unwrap()
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/", "/"), Some(Route::Index));
        assert_eq!(Route::parse("/", "/index.html"), Some(Route::Index));
        assert_eq!(
            Route::parse("/", "/post/como-utilizar-hooks/"),
            Some(Route::Post("como-utilizar-hooks".to_string()))
        );
        assert_eq!(
            Route::parse("/blog/", "/blog/post/hooks/index.html"),
            Some(Route::Post("hooks".to_string()))
        );
        assert_eq!(
            Route::parse("/", "/post/cria%C3%A7%C3%A3o"),
            Some(Route::Post("criação".to_string()))
        );
        assert_eq!(Route::parse("/", "/post/..%2Fsecret/"), None);
        assert_eq!(Route::parse("/", "/post/a/b/"), None);
        assert_eq!(Route::parse("/", "/styles.css"), None);
        // Paths outside the root are not routes
        assert_eq!(Route::parse("/blog/", "/post/hooks/"), None);
        assert_eq!(Route::parse("/blog/", "/"), None);
        assert_eq!(Route::parse("/blog/", "/blogpost/hooks/"), None);
        assert_eq!(Route::parse("/blog/", "/blog"), Some(Route::Index));
        assert!(!Route::is_post_path("/blog/", "/post/a/b/"));
        assert!(Route::is_post_path("/", "/post/a/b/"));
        assert!(!Route::is_post_path("/", "/styles.css"));
    }

    #[test]
    fn test_route_output_path() {
        let public = Path::new("public");
        assert_eq!(Route::Index.output_path(public), public.join("index.html"));
        assert_eq!(
            Route::Post("hooks".to_string()).output_path(public),
            public.join("post/hooks/index.html")
        );
    }

    #[tokio::test]
    async fn test_generate_site() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path(), documents(5));

        let report = generator.generate().await.unwrap();
        assert_eq!(report.listing_pages, 2);
        assert_eq!(report.posts, ["post-1", "post-2"]);
        assert!(report.failed.is_empty());

        let index = read(dir.path(), "index.html");
        for i in 1..=4 {
            assert!(index.contains(&format!("Post {}", i)));
        }
        assert!(!index.contains("Post 5"));
        assert!(index.contains("href=\"/post/post-1/\""));
        assert!(index.contains("25 mar 2021"));
        assert!(index.contains("data-next-page=\"/posts/2.json\""));
        assert!(index.contains("Carregar mais posts"));

        let fragment: serde_json::Value =
            serde_json::from_str(&read(dir.path(), "posts/2.json")).unwrap();
        assert!(fragment["next_page"].is_null());
        assert_eq!(fragment["results"].as_array().unwrap().len(), 1);
        assert_eq!(fragment["results"][0]["uid"], "post-5");
        assert!(fragment["html"].as_str().unwrap().contains("href=\"/post/post-5/\""));

        assert!(dir.path().join("public/post/post-1/index.html").exists());
        assert!(dir.path().join("public/post/post-2/index.html").exists());
        assert!(!dir.path().join("public/post/post-3").exists());
        assert!(dir.path().join("public/styles.css").exists());
        assert!(dir.path().join("public/images/logo.svg").exists());
        assert!(read(dir.path(), FALLBACK_PATH).contains("Carregando..."));
        assert!(read(dir.path(), NOT_FOUND_PATH).contains("Post não encontrado"));
    }

    #[tokio::test]
    async fn test_index_without_more_posts() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path(), documents(3));

        assert_eq!(generator.generate_index().await.unwrap(), 1);
        let index = read(dir.path(), "index.html");
        assert!(index.contains("Post 3"));
        assert!(!index.contains("load-posts-button"));
        assert!(!dir.path().join("public/posts").exists());
    }

    #[tokio::test]
    async fn test_fragments_chain() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path(), documents(10));

        assert_eq!(generator.generate_index().await.unwrap(), 3);
        let second: serde_json::Value =
            serde_json::from_str(&read(dir.path(), "posts/2.json")).unwrap();
        assert_eq!(second["next_page"], "/posts/3.json");
        let third: serde_json::Value =
            serde_json::from_str(&read(dir.path(), "posts/3.json")).unwrap();
        assert!(third["next_page"].is_null());
        assert_eq!(third["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_generate_post_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path(), documents(3));

        let path = generator.generate_post("post-3").await.unwrap();
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("<h1>Post 3</h1>"));
        assert!(html.contains("<h2>Proin et varius</h2>"));
        assert!(html.contains("<strong>Nulla</strong> auctor sit amet"));
        assert!(html.contains("25 mar 2021"));
        assert!(html.contains("Joseph Oliveira"));
        assert!(html.contains("1 min"));
        assert!(html.contains("class=\"banner\""));
        assert!(html.contains("rel=\"canonical\" href=\"http://localhost:4000/post/post-3/\""));
    }

    #[tokio::test]
    async fn test_generate_post_missing() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path(), documents(1));

        let err = generator.generate_post("nope").await.unwrap_err();
        assert!(err.is_not_found());

        let requests = generator.source().requests();
        assert!(generator.generate_post("../etc").await.unwrap_err().is_not_found());
        assert_eq!(generator.source().requests(), requests);
    }

    #[tokio::test]
    async fn test_malformed_post_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut docs = documents(1);
        let mut broken = post_document("broken", "Broken", Some(DATE));
        broken.data["author"] = serde_json::Value::Null;
        docs.insert(0, broken);
        let generator = generator(dir.path(), docs);

        let err = generator.generate_post("broken").await.unwrap_err();
        assert!(matches!(err, BlogError::MalformedDocument { .. }));
        assert!(!dir.path().join("public/post/broken").exists());
    }

    #[test]
    fn test_loading_page_has_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path(), Vec::new());

        let html = generator.render_post_page(&PostPage::Loading).unwrap();
        assert!(html.contains("Carregando..."));
        assert!(html.contains("http-equiv=\"refresh\""));
        assert!(!html.contains("<h2>"));
        assert!(!html.contains("reading-time"));
    }

    #[tokio::test]
    async fn test_static_files_override_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("static/images")).unwrap();
        fs::write(dir.path().join("static/images/logo.svg"), "<svg>custom</svg>").unwrap();
        fs::write(dir.path().join("static/favicon.png"), "png").unwrap();

        let generator = generator(dir.path(), documents(1));
        generator.generate().await.unwrap();

        assert_eq!(read(dir.path(), "images/logo.svg"), "<svg>custom</svg>");
        assert!(dir.path().join("public/favicon.png").exists());
    }

    /// One post per page; the page after page 2 links back to page 2
    struct CyclingSource;

    fn single_post_page(uid: &str, next_page: &str) -> SearchResponse {
        SearchResponse {
            next_page: Some(next_page.to_string()),
            results: vec![post_document(uid, uid, Some(DATE))],
            ..Default::default()
        }
    }

    impl ContentSource for CyclingSource {
        async fn query(&self, _query: &Query) -> Result<SearchResponse> {
            Ok(single_post_page("post-1", "memory://page/2"))
        }

        async fn fetch_page(&self, cursor: &str) -> Result<SearchResponse> {
            Ok(match cursor {
                "memory://page/2" => single_post_page("post-2", "memory://page/3"),
                _ => single_post_page("post-3", "memory://page/2"),
            })
        }

        async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document> {
            Err(BlogError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_cursor_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::with_config(dir.path().to_path_buf(), SiteConfig::default());
        let generator = Generator::new(&blog, CyclingSource).unwrap();

        assert_eq!(generator.generate_index().await.unwrap(), 3);
        let second: serde_json::Value =
            serde_json::from_str(&read(dir.path(), "posts/2.json")).unwrap();
        assert_eq!(second["next_page"], "/posts/3.json");
        let third: serde_json::Value =
            serde_json::from_str(&read(dir.path(), "posts/3.json")).unwrap();
        assert!(third["next_page"].is_null());
        assert_eq!(third["results"][0]["uid"], "post-3");
    }

    #[tokio::test]
    async fn test_stale_fragments_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        generator(dir.path(), documents(10)).generate_index().await.unwrap();
        assert!(dir.path().join("public/posts/3.json").exists());

        generator(dir.path(), documents(6)).generate_index().await.unwrap();
        assert!(dir.path().join("public/posts/2.json").exists());
        assert!(!dir.path().join("public/posts/3.json").exists());
    }

    #[tokio::test]
    async fn test_regeneration_keeps_files_readable() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path(), documents(6));
        generator.generate_index().await.unwrap();

        let public = dir.path().join("public");
        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut bad_reads = 0;
                while !stop.load(Ordering::SeqCst) {
                    match fs::read_to_string(public.join("index.html")) {
                        Ok(html) if html.contains("</html>") => {}
                        _ => bad_reads += 1,
                    }
                    match fs::read_to_string(public.join("posts/2.json")) {
                        Ok(json) if serde_json::from_str::<serde_json::Value>(&json).is_ok() => {}
                        _ => bad_reads += 1,
                    }
                }
                bad_reads
            })
        };

        for _ in 0..100 {
            generator.generate_index().await.unwrap();
        }
        stop.store(true, Ordering::SeqCst);
        assert_eq!(reader.join().unwrap(), 0);
    }
}
