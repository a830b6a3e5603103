//! Embedded web UI for sift
//!
//! Serves the bundled single-page app under `/ui/` and owns the server-wide
//! fallback for requests no route matched.
//!
//! ## Development Mode
//!
//! If a `webui/` directory exists in the current working directory, files
//! are served from disk instead of the embedded assets.
//!
//! ## Deep links
//!
//! A client-side route such as `/ui/index/logs/settings` has no asset
//! behind it. Instead of an absolute redirect, which breaks when the server
//! sits behind a proxy under an unknown sub-path, the fallback answers with
//! a relative `Location` that climbs back to the UI root (`./../../`).

use axum::{
    body::Body,
    extract::Path,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;
use std::path::PathBuf;
use tracing::debug;

/// Path prefix the UI is mounted under
pub const UI_PREFIX: &str = "/ui/";

#[derive(Embed)]
#[folder = "assets"]
#[include = "*.html"]
#[include = "*.js"]
#[include = "*.css"]
#[include = "*.ico"]
#[include = "*.svg"]
#[include = "*.png"]
#[include = "*.woff2"]
struct EmbeddedAssets;

/// UI routes, merged into the server router at the root
pub fn ui_router() -> Router {
    Router::new()
        .route(
            "/ui",
            get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "ui/")]) })
                .fallback(fallback),
        )
        .route("/ui/", get(serve_index).fallback(fallback))
        .route("/ui/*path", get(serve_asset).fallback(fallback))
}

/// Check if we should use development mode (serve from disk)
fn dev_webui_dir() -> Option<PathBuf> {
    let webui_dir = std::env::current_dir().ok()?.join("webui");
    webui_dir.is_dir().then_some(webui_dir)
}

async fn serve_index() -> Response {
    match load("index.html").await {
        Some(response) => response,
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_asset(method: Method, uri: Uri, Path(path): Path<String>) -> Response {
    match load(&path).await {
        Some(response) => response,
        None => fallback(method, uri).await,
    }
}

async fn load(path: &str) -> Option<Response> {
    let path = path.trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };
    if path.split('/').any(|segment| segment == "..") {
        return None;
    }

    if let Some(webui_dir) = dev_webui_dir() {
        let file_path = webui_dir.join(path);
        if file_path.is_file() {
            debug!("Serving from dev directory: {:?}", file_path);
            let content = tokio::fs::read(&file_path).await.ok()?;
            return Some(asset_response(path, "no-cache, no-store, must-revalidate", content));
        }
    }

    let content = EmbeddedAssets::get(path)?;
    debug!("Serving embedded asset: {}", path);
    Some(asset_response(path, cache_control_for(path), content.data.into_owned()))
}

fn asset_response(path: &str, cache_control: &'static str, content: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, cache_control.to_string()),
        ],
        Body::from(content),
    )
        .into_response()
}

/// Determine cache-control header based on file type
fn cache_control_for(path: &str) -> &'static str {
    if path.ends_with(".html") {
        "no-cache, must-revalidate"
    } else if path.starts_with("assets/") || path.ends_with(".js") || path.ends_with(".css") {
        "public, max-age=31536000, immutable"
    } else {
        "public, max-age=3600"
    }
}

/// Relative `Location` from a deep link back to the UI root.
///
/// `rest` is the request path after [`UI_PREFIX`]; one `../` per separator.
pub fn spa_location(rest: &str) -> String {
    let depth = rest.matches('/').count();
    format!("./{}", "../".repeat(depth))
}

/// Handler for requests no route matched
pub async fn fallback(method: Method, uri: Uri) -> Response {
    tracing::error!(
        method = %method,
        code = 404,
        took = 0,
        "{}",
        uri.path()
    );
    metrics::counter!("sift_unmatched_total", "method" => method.to_string()).increment(1);

    let deep_link = matches!(method, Method::GET | Method::HEAD)
        .then(|| uri.path().strip_prefix(UI_PREFIX))
        .flatten();

    match deep_link {
        Some(rest) => (
            StatusCode::FOUND,
            [(header::LOCATION, spa_location(rest))],
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        ui_router().fallback(fallback)
    }

    async fn send(method: Method, uri: &str) -> Response {
        app()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_cache_control() {
        assert!(cache_control_for("index.html").contains("no-cache"));
        assert!(cache_control_for("assets/main.js").contains("immutable"));
        assert!(cache_control_for("main.css").contains("immutable"));
        assert!(cache_control_for("favicon.ico").contains("3600"));
    }

    #[test]
    fn test_spa_location() {
        assert_eq!(spa_location("settings"), "./");
        assert_eq!(spa_location("a/b/c"), "./../../");
        assert_eq!(spa_location("index/logs/"), "./../../");
    }

    #[tokio::test]
    async fn test_serves_index() {
        let response = send(Method::GET, "/ui/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_serves_asset() {
        let response = send(Method::GET, "/ui/app.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CACHE_CONTROL]
            .to_str()
            .unwrap()
            .contains("immutable"));
    }

    #[tokio::test]
    async fn test_deep_link_redirects_relative() {
        let response = send(Method::GET, "/ui/a/b/c").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "./../../");
    }

    #[tokio::test]
    async fn test_non_get_under_ui_is_not_found() {
        let response = send(Method::POST, "/ui/a/b/c").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    #[tokio::test]
    async fn test_unmatched_outside_ui_is_not_found() {
        let response = send(Method::GET, "/nowhere/a/b").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    #[tokio::test]
    async fn test_wrong_method_on_bare_prefix_is_not_found() {
        let response = send(Method::DELETE, "/ui").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bare_prefix_redirects_to_slash() {
        let response = send(Method::GET, "/ui").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "ui/");
    }
}
