use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode, Uri},
    response::IntoResponse,
    Router,
};

use crate::ui::is_client_route;

#[cfg(feature = "embed-frontend")]
use include_dir::{include_dir, Dir};
#[cfg(feature = "embed-frontend")]
use mime_guess::MimeGuess;

#[cfg(feature = "embed-frontend")]
static FRONTEND_DIST: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/frontend/dist");

fn cache_control_for(path: &str) -> HeaderValue {
    if path == "index.html" {
        HeaderValue::from_static("no-store")
    } else if path.starts_with("assets/") {
        HeaderValue::from_static("public, max-age=31536000, immutable")
    } else {
        HeaderValue::from_static("public, max-age=3600")
    }
}

fn not_found() -> Response<Body> {
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(feature = "embed-frontend")]
fn build_response(path: &str, bytes: &'static [u8]) -> Response<Body> {
    let mime = MimeGuess::from_path(path).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, cache_control_for(path)),
        ],
        bytes,
    )
        .into_response()
}

/// Asset path relative to the dist root, `None` for paths escaping it
#[cfg(feature = "embed-frontend")]
fn asset_path(uri: &Uri) -> Option<String> {
    let path = uri.path().trim_start_matches('/');
    if path.split('/').any(|segment| segment == ".." || segment.contains('\\')) {
        return None;
    }
    Some(if path.is_empty() {
        "index.html".to_string()
    } else {
        path.to_string()
    })
}

#[cfg(feature = "embed-frontend")]
async fn spa_handler(uri: Uri) -> Response<Body> {
    let Some(req_path) = asset_path(&uri) else {
        return not_found();
    };

    if let Some(file) = FRONTEND_DIST.get_file(&req_path) {
        return build_response(&req_path, file.contents());
    }

    if !is_client_route(uri.path()) {
        return not_found();
    }

    match FRONTEND_DIST.get_file("index.html") {
        Some(file) => build_response("index.html", file.contents()),
        None => not_found(),
    }
}

/// Dashboard front end compiled into the binary
#[cfg(feature = "embed-frontend")]
pub fn spa_service(_dist_path: &str) -> Router {
    Router::new().fallback(spa_handler)
}

/// Dashboard front end served from `dist_path`.
///
/// Unknown paths get `index.html` when the client-side router owns them and 404 otherwise.
#[cfg(not(feature = "embed-frontend"))]
pub fn spa_service(dist_path: &str) -> Router {
    use axum::{extract::Request, handler::HandlerWithoutStateExt, middleware};
    use std::path::PathBuf;
    use tower::ServiceExt;
    use tower_http::services::{ServeDir, ServeFile};

    let dist = PathBuf::from(dist_path);
    let index = dist.join("index.html");

    let client_routes = move |req: Request| {
        let index = index.clone();
        async move {
            if !is_client_route(req.uri().path()) {
                return not_found();
            }
            match ServeFile::new(index).oneshot(req).await {
                Ok(response) => response.into_response(),
                Err(e) => match e {},
            }
        }
    };

    Router::new()
        .fallback_service(ServeDir::new(dist).fallback(client_routes.into_service()))
        .layer(middleware::map_response(with_cache_control))
}

#[cfg(not(feature = "embed-frontend"))]
async fn with_cache_control(uri: Uri, mut response: Response<Body>) -> Response<Body> {
    let status = response.status();
    if !(status.is_success() || status == StatusCode::NOT_MODIFIED) {
        return response;
    }

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"text/html"));
    let path = if is_html {
        "index.html"
    } else {
        uri.path().trim_start_matches('/')
    };
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache_control_for(path));
    response
}
