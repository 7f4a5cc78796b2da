//! `/stream` handler
//!
//! Resolves the `ep` token to a managed torrent, picks its playable file and
//! streams it through the engine's range reader. Missing pieces make the
//! body wait instead of returning short data.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LAST_MODIFIED,
};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;
use streamgate_core::{FileReader, GatewayError, TorrentFile, select_playable_file};

use super::range::{RangeOutcome, effective_range, format_http_date, not_modified, resolve_range};
use crate::server::AppState;

/// Query parameters of a stream request
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Hex info hash of the torrent to stream
    pub ep: Option<String>,
}

/// Gateway error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self(error)
    }
}

/// HTTP status for a gateway error.
pub fn status_for(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
        GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
        GatewayError::Duplicate { .. } => StatusCode::CONFLICT,
        GatewayError::Download { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::Engine(_) | GatewayError::Storage { .. } | GatewayError::Server { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("Stream request failed: {}", self.0);
        } else {
            tracing::warn!("Stream request rejected: {}", self.0);
        }
        (status, self.0.to_string()).into_response()
    }
}

/// Trims surrounding whitespace and removes control characters.
pub fn sanitize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Streams the playable file of the torrent named by `ep`.
///
/// # Errors
///
/// - `400` - Missing or empty `ep`
/// - `404` - Unknown torrent or no playable file
/// - `504` - Metadata did not arrive within the readiness timeout
pub async fn stream_torrent(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = sanitize_token(query.ep.as_deref().unwrap_or_default());
    if token.is_empty() {
        return Err(GatewayError::Validation {
            reason: "Missing stream token 'ep'".to_string(),
        }
        .into());
    }

    let Some(torrent) = state.registry.find_by_hex(&token) else {
        tracing::debug!("No torrent matches stream token {}", token);
        return Err(GatewayError::NotFound {
            what: format!("torrent {token}"),
        }
        .into());
    };

    let info = torrent.wait_ready(state.settings.readiness_timeout).await?;
    let file = select_playable_file(&info.files)
        .cloned()
        .ok_or_else(|| GatewayError::NotFound {
            what: format!("playable file in {}", info.name),
        })?;
    let reader = torrent.open_file(&file)?;

    let response = file_response(
        &state,
        &method,
        &headers,
        &file,
        reader,
        torrent.modified_at(),
    )?;
    tracing::info!(
        "Serving {} from {} ({})",
        file.path,
        torrent.info_hash(),
        response.status()
    );
    Ok(response)
}

fn file_response(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    file: &TorrentFile,
    reader: Arc<dyn FileReader>,
    modified_at: chrono::DateTime<chrono::Utc>,
) -> Result<Response, GatewayError> {
    let total_size = reader.len();
    let last_modified = format_http_date(modified_at);

    if not_modified(headers, modified_at) {
        return build(
            Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(LAST_MODIFIED, last_modified),
            Body::empty(),
        );
    }

    let (status, start, length, content_range) =
        match resolve_range(effective_range(headers, modified_at), total_size) {
            RangeOutcome::Full => (StatusCode::OK, 0, total_size, None),
            RangeOutcome::Partial(range) => (
                StatusCode::PARTIAL_CONTENT,
                range.start,
                range.len(),
                Some(range.content_range(total_size)),
            ),
            RangeOutcome::Unsatisfiable => {
                return build(
                    Response::builder()
                        .status(StatusCode::RANGE_NOT_SATISFIABLE)
                        .header(CONTENT_RANGE, format!("bytes */{total_size}")),
                    Body::empty(),
                );
            }
        };

    let content_type = mime_guess::from_path(&file.path).first_or_octet_stream();
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type.as_ref())
        .header(ACCEPT_RANGES, "bytes")
        .header(CONTENT_LENGTH, length)
        .header(LAST_MODIFIED, last_modified);
    if let Some(content_range) = content_range {
        builder = builder.header(CONTENT_RANGE, content_range);
    }

    let body = if method == Method::HEAD || length == 0 {
        Body::empty()
    } else {
        Body::from_stream(file_body(
            reader,
            start,
            length,
            state.settings.chunk_size,
            state.settings.read_stall_timeout,
        ))
    };
    build(builder, body)
}

fn build(builder: axum::http::response::Builder, body: Body) -> Result<Response, GatewayError> {
    builder.body(body).map_err(|e| GatewayError::Server {
        reason: format!("Failed to build response: {e}"),
    })
}

/// Body stream reading `length` bytes from `start`, one chunk at a time.
///
/// A chunk that takes longer than `stall_timeout` ends the body with an
/// error; the client sees a truncated transfer rather than a hung one.
fn file_body(
    reader: Arc<dyn FileReader>,
    start: u64,
    length: u64,
    chunk_size: usize,
    stall_timeout: Option<Duration>,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let end = start + length;
    futures::stream::try_unfold(start, move |position| {
        let reader = Arc::clone(&reader);
        async move {
            if position >= end {
                return Ok(None);
            }

            let wanted = (end - position).min(chunk_size as u64) as usize;
            let read = reader.read_at(position, wanted);
            let chunk = match stall_timeout {
                Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no data at offset {position} within {limit:?}"),
                    )
                })?,
                None => read.await,
            }
            .map_err(io::Error::other)?;

            if chunk.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended at offset {position}"),
                ));
            }
            let next = position + chunk.len() as u64;
            Ok(Some((chunk, next)))
        }
    })
}
