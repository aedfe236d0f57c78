//! Development server with on-demand regeneration
//!
//! Generated pages are served from the public directory. A page older than
//! `revalidate_secs` is still served, and regenerated in the background.
//! A post that was never generated gets the loading placeholder while it is
//! generated; the placeholder reloads itself until the page exists.
//! A missing home page is generated before the response is sent.
//!
//! Failed generations are remembered for a short while, so repeated
//! requests for a missing post are answered without asking the API again.

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::content::{ContentClient, ContentSource};
use crate::error::BlogError;
use crate::generator::{Generator, PostPage, Route};
use crate::Blog;

/// Why the last generation of a route failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    NotFound,
    Upstream,
}

impl From<&BlogError> for Failure {
    fn from(err: &BlogError) -> Self {
        if err.is_not_found() {
            Self::NotFound
        } else {
            Self::Upstream
        }
    }
}

struct FailureEntry {
    failure: Failure,
    at: Instant,
}

/// How long a failed generation is answered from memory
const FAILURE_TTL: Duration = Duration::from_secs(60);

/// Upper bound on remembered failures
const MAX_FAILURES: usize = 1024;

/// Seconds a client should wait while the home page is being generated
const RETRY_AFTER_SECS: &str = "2";

/// Server state
pub struct ServerState<S> {
    generator: Generator<S>,
    revalidate: Duration,
    in_flight: Mutex<HashSet<Route>>,
    failures: Mutex<HashMap<Route, FailureEntry>>,
    failure_ttl: Duration,
    max_failures: usize,
}

impl<S: ContentSource + 'static> ServerState<S> {
    pub fn new(generator: Generator<S>) -> Self {
        let revalidate = Duration::from_secs(generator.blog().config.revalidate_secs);
        Self {
            generator,
            revalidate,
            in_flight: Mutex::new(HashSet::new()),
            failures: Mutex::new(HashMap::new()),
            failure_ttl: FAILURE_TTL,
            max_failures: MAX_FAILURES,
        }
    }

    /// Serve a generated route, regenerating it when stale or missing
    async fn serve_route(self: &Arc<Self>, route: Route) -> Response {
        let path = route.output_path(&self.generator.blog().public_dir);

        if let Ok(metadata) = tokio::fs::metadata(&path).await {
            if is_stale(metadata.modified().ok(), SystemTime::now(), self.revalidate) {
                tracing::debug!("Serving stale {:?}, regenerating", route);
                self.spawn_regenerate(route);
            }
            return serve_file(&path).await;
        }

        if let Some(failure) = self.recent_failure(&route) {
            return self.failure_response(failure);
        }

        if route == Route::Index {
            let Some(task) = self.spawn_regenerate(route) else {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                    "Generating",
                )
                    .into_response();
            };
            return match task.await {
                Ok(Ok(())) => serve_file(&path).await,
                Ok(Err(failure)) => self.failure_response(failure),
                Err(e) => {
                    tracing::error!("Home page generation panicked: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            };
        }

        self.spawn_regenerate(route);
        match self.generator.render_post_page(&PostPage::Loading) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!("Failed to render loading page: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /// Start a background regeneration unless one is already running.
    /// The task outlives the request that started it.
    fn spawn_regenerate(
        self: &Arc<Self>,
        route: Route,
    ) -> Option<JoinHandle<Result<(), Failure>>> {
        if !lock(&self.in_flight).insert(route.clone()) {
            return None;
        }

        let state = Arc::clone(self);
        Some(tokio::spawn(async move {
            let outcome = match state.generator.generate_route(&route).await {
                Ok(()) => {
                    lock(&state.failures).remove(&route);
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("Failed to regenerate {:?}: {}", route, e);
                    let failure = Failure::from(&e);
                    state.record_failure(route.clone(), failure);
                    Err(failure)
                }
            };
            lock(&state.in_flight).remove(&route);
            outcome
        }))
    }

    /// Remember a failure, dropping expired entries and the oldest one when full
    fn record_failure(&self, route: Route, failure: Failure) {
        let mut failures = lock(&self.failures);
        failures.retain(|_, entry| entry.at.elapsed() < self.failure_ttl);
        if failures.len() >= self.max_failures && !failures.contains_key(&route) {
            let oldest = failures
                .iter()
                .min_by_key(|(_, entry)| entry.at)
                .map(|(route, _)| route.clone());
            if let Some(oldest) = oldest {
                failures.remove(&oldest);
            }
        }
        failures.insert(
            route,
            FailureEntry {
                failure,
                at: Instant::now(),
            },
        );
    }

    /// The last failure of `route` while it is still remembered
    fn recent_failure(&self, route: &Route) -> Option<Failure> {
        let mut failures = lock(&self.failures);
        match failures.get(route) {
            Some(entry) if entry.at.elapsed() < self.failure_ttl => Some(entry.failure),
            Some(_) => {
                failures.remove(route);
                None
            }
            None => None,
        }
    }

    fn failure_response(&self, failure: Failure) -> Response {
        match failure {
            Failure::NotFound => self.not_found(),
            Failure::Upstream => {
                (StatusCode::BAD_GATEWAY, "Failed to load content").into_response()
            }
        }
    }

    fn not_found(&self) -> Response {
        match self.generator.render_not_found() {
            Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        }
    }
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read_to_string(path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to read {:?}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether a page written at `modified` must be regenerated at `now`.
/// Unknown modification times count as stale.
pub fn is_stale(modified: Option<SystemTime>, now: SystemTime, max_age: Duration) -> bool {
    match modified {
        Some(modified) => now
            .duration_since(modified)
            .map(|age| age >= max_age)
            .unwrap_or(false),
        None => true,
    }
}

/// Build the router over a server state
pub fn router<S: ContentSource + 'static>(state: Arc<ServerState<S>>) -> Router {
    Router::new()
        .fallback(request_handler::<S>)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the development server
pub async fn start(blog: &Blog, ip: &str, port: u16, open: bool) -> Result<()> {
    let client = ContentClient::new(blog.config.api.clone())?;
    let state = Arc::new(ServerState::new(Generator::new(blog, client)?));
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Generated routes go through regeneration; anything else is a file
async fn request_handler<S: ContentSource + 'static>(
    State(state): State<Arc<ServerState<S>>>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();
    let root = state.generator.blog().config.root.clone();

    if let Some(route) = Route::parse(&root, &path) {
        return state.serve_route(route).await;
    }
    if Route::is_post_path(&root, &path) {
        return state.not_found();
    }

    let mut service = ServeDir::new(&state.generator.blog().public_dir);
    match service.try_call(request).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => state.not_found(),
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
