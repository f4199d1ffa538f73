use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use axum::middleware::Next;
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use tracing::info;

use crate::catalog::FontDirectory;
use crate::ocr::OcrEngine;
use crate::pipeline::{IdentifyError, IdentifyResponse};
use crate::settings;

use super::models::{ErrorResponse, ServerRequest};
use super::state::ServerState;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const UPLOAD_FIELD: &str = "file";

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState {
        identifier: crate::build_identifier(&settings),
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("server: listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router<E, D>(state: Arc<ServerState<E, D>>) -> Router
where
    E: OcrEngine + 'static,
    D: FontDirectory + 'static,
{
    Router::new()
        .route("/identify-font", post(identify_font::<E, D>))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn cors_middleware(req: Request, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn rejected(status: StatusCode, message: String) -> Self {
        Self { status, message }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<IdentifyError> for ServerError {
    fn from(err: IdentifyError) -> Self {
        match err {
            IdentifyError::Decode(_) => ServerError::bad_request(err.to_string()),
            IdentifyError::Ocr(_) => ServerError::internal(err.to_string()),
        }
    }
}

async fn identify_font<E, D>(
    State(state): State<Arc<ServerState<E, D>>>,
    request: Request,
) -> Result<Json<IdentifyResponse>, (StatusCode, Json<ErrorResponse>)>
where
    E: OcrEngine + 'static,
    D: FontDirectory + 'static,
{
    let result = match read_image_payload(request).await {
        Ok(bytes) => identify_upload(state, bytes).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err((err.status, Json(ErrorResponse { error: err.message }))),
    }
}

/// Accepts raw image bytes, a multipart upload or `{"data_base64": ...}`.
async fn read_image_payload(request: Request) -> Result<Vec<u8>, ServerError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let bytes = if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|err| ServerError::rejected(err.status(), err.body_text()))?;
        read_multipart_image(&mut multipart).await?
    } else if content_type.starts_with("application/json") {
        let Json(payload) = Json::<ServerRequest>::from_request(request, &())
            .await
            .map_err(|err| ServerError::rejected(err.status(), err.body_text()))?;
        let Some(encoded) = payload.data_base64 else {
            return Err(ServerError::bad_request("data_base64 is required"));
        };
        BASE64
            .decode(encoded.trim())
            .map_err(|err| ServerError::bad_request(format!("invalid base64 data: {}", err)))?
    } else {
        Bytes::from_request(request, &())
            .await
            .map_err(|err| ServerError::rejected(err.status(), err.body_text()))?
            .to_vec()
    };

    if bytes.is_empty() {
        return Err(ServerError::bad_request("image payload is empty"));
    }
    Ok(bytes)
}

async fn read_multipart_image(multipart: &mut Multipart) -> Result<Vec<u8>, ServerError> {
    let mut first_file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::rejected(err.status(), err.body_text()))?
    {
        let is_upload_field = field.name() == Some(UPLOAD_FIELD);
        let is_file = field.file_name().is_some();
        if !is_upload_field && !is_file {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ServerError::rejected(err.status(), err.body_text()))?;
        if is_upload_field {
            return Ok(bytes.to_vec());
        }
        if first_file.is_none() {
            first_file = Some(bytes.to_vec());
        }
    }
    first_file.ok_or_else(|| ServerError::bad_request("multipart payload has no file"))
}

async fn identify_upload<E, D>(
    state: Arc<ServerState<E, D>>,
    bytes: Vec<u8>,
) -> Result<IdentifyResponse, ServerError>
where
    E: OcrEngine + 'static,
    D: FontDirectory + 'static,
{
    info!("server: received {} bytes", bytes.len());
    let handle = tokio::runtime::Handle::current();
    let result = tokio::task::spawn_blocking(move || {
        handle.block_on(state.identifier.identify(&bytes))
    })
    .await
    .map_err(|err| ServerError::internal(format!("server task failed: {}", err)))?;

    result
        .map(|identification| identification.into_response())
        .map_err(ServerError::from)
}
