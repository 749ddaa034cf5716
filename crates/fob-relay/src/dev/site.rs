//! Static site snapshots and the HTTP surface of the `serve` command.
//!
//! A snapshot stands in for a build: every file under the root is hashed into
//! one BLAKE3 digest, and problems found while reading become diagnostics on
//! the resulting [`BuildSummary`].

use crate::broadcast::BuildSummary;
use crate::dev::watcher::is_ignored;
use crate::host_check::{host_gate, HostValidator};
use crate::protocol::Diagnostic;
use crate::relay::CONTROL_PREFIX;
use crate::ui::format_size;
use axum::{
    body::{self, Body},
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use blake3::Hasher;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use walkdir::WalkDir;

/// Files larger than this are left out of the snapshot with a warning.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Length of the hex hash announced to clients.
pub const HASH_LEN: usize = 20;

/// HTML responses larger than this are passed through without injection.
const MAX_INJECT_BODY: usize = 16 * 1024 * 1024;

/// Hash the site under `root`.
///
/// Files are visited in name order so equal trees give equal hashes. Ignored
/// paths use the same patterns as the file watcher.
pub fn snapshot(root: &Path, ignore: &[String]) -> BuildSummary {
    let mut hasher = Hasher::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.path().strip_prefix(root) {
            Ok(rel) => !is_ignored(rel, ignore),
            Err(_) => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let file = e.path().map(|p| relative_name(root, p));
                let diagnostic = Diagnostic::new(e.to_string());
                errors.push(match file {
                    Some(file) => diagnostic.with_file(file),
                    None => diagnostic,
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = relative_name(root, entry.path());
        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                errors.push(Diagnostic::new(e.to_string()).with_file(name));
                continue;
            }
        };
        if size > MAX_FILE_SIZE {
            warnings.push(
                Diagnostic::new(format!(
                    "skipped: {} exceeds the {} snapshot limit",
                    format_size(size),
                    format_size(MAX_FILE_SIZE)
                ))
                .with_file(name),
            );
            continue;
        }

        match std::fs::read(entry.path()) {
            Ok(content) => {
                hasher.update(name.as_bytes());
                hasher.update(b"\0");
                hasher.update(blake3::hash(&content).as_bytes());
            }
            Err(e) => errors.push(Diagnostic::new(e.to_string()).with_file(name)),
        }
    }

    let digest = hasher.finalize();
    BuildSummary::new(&digest.to_hex().as_str()[..HASH_LEN])
        .with_warnings(warnings)
        .with_errors(errors)
}

/// `/`-separated path of `path` relative to `root`.
fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Router serving `root` with the relay client injected into HTML pages.
///
/// Every request passes the same Host/Origin gate as the relay's control
/// routes.
pub fn router(root: &Path, validator: Arc<HostValidator>) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
        .layer(middleware::from_fn(inject_client_script))
        .layer(middleware::from_fn_with_state(validator, host_gate))
}

/// Middleware adding the relay client `<script>` to HTML responses.
pub async fn inject_client_script(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body::to_bytes(body, MAX_INJECT_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to buffer HTML response: {}", e);
            return (parts.status, "Failed to read response body").into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Response::from_parts(parts, Body::from(html))
}

/// Insert the client script tag before the last `</body>`, or append it.
fn inject_script(html: &str) -> String {
    let script_tag = format!(r#"<script src="{}/client.js"></script>"#, CONTROL_PREFIX);

    let mut result = String::with_capacity(html.len() + script_tag.len() + 4);
    match html.rfind("</body>") {
        Some(pos) => {
            result.push_str(&html[..pos]);
            result.push_str("  ");
            result.push_str(&script_tag);
            result.push('\n');
            result.push_str(&html[pos..]);
        }
        None => {
            result.push_str(html);
            result.push('\n');
            result.push_str(&script_tag);
        }
    }
    result
}
