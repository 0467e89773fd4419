//! Read-only HTTP host for the cleaned datalogs.
//!
//! The host only ever reads `output_directory`. Files may be replaced by the cleaner while
//! they are being served; a client can then see a torn copy and is expected to retry.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use datalog_core::Config;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HostState {
    root: Arc<PathBuf>,
}

/// Routes `GET /` to a listing of `root` and everything else to the files below it.
pub fn router(root: impl Into<PathBuf>) -> Router {
    let root = root.into();
    let files = ServeDir::new(&root);
    let state = HostState {
        root: Arc::new(root),
    };

    Router::new()
        .route("/", get(index))
        .fallback_service(files)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
}

/// Binds `server_host:server_port` and serves `output_directory` until `shutdown` reads
/// `true`.
pub async fn serve(config: &Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let address = (config.server_host.as_str(), config.server_port);
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {}:{}", config.server_host, config.server_port))?;
    serve_listener(listener, &config.output_directory, shutdown).await
}

pub async fn serve_listener(
    listener: TcpListener,
    root: &Path,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(
        address = %listener.local_addr()?,
        root = %root.display(),
        "serving cleaned datalogs"
    );
    axum::serve(listener, router(root))
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .context("file host stopped unexpectedly")?;
    info!("file host stopped");
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // sender gone, serve until the process ends
            std::future::pending::<()>().await;
        }
    }
}

async fn index(State(state): State<HostState>) -> Response {
    match list_files(&state.root).await {
        Ok(names) => Html(render_index(&names)).into_response(),
        Err(err) => {
            error!(root = %state.root.display(), error = %err, "failed to list output directory");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn list_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn render_index(names: &[String]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Cleaned datalogs</title></head>\n<body>\n<h1>Cleaned datalogs</h1>\n<ul>\n",
    );
    for name in names {
        let _ = writeln!(
            html,
            "<li><a href=\"/{}\">{}</a></li>",
            percent_encode(name),
            escape_html(name)
        );
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn percent_encode(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_links_are_encoded_and_escaped() {
        let html = render_index(&["a b&c.csv".to_string(), "cleaned_datalog1.csv".to_string()]);
        assert!(html.contains("<a href=\"/a%20b%26c.csv\">a b&amp;c.csv</a>"));
        assert!(html.contains("<a href=\"/cleaned_datalog1.csv\">cleaned_datalog1.csv</a>"));
    }
}
