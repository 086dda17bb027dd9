//! HTTP surface: analyze, chat, shorten, health.
//!
//! Handlers translate pipeline errors into the short, user-facing messages
//! the frontend shows verbatim. Provider attempt details stay in the logs.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use safeagree_core::{
    ChatMessage, EnvelopePayload, Error, InputEnvelope, SourceKind, MAX_PDF_BYTES,
};
use safeagree_pipeline::{Analyzer, Assistant, Shortener};

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub assistant: Arc<Assistant>,
    pub shortener: Arc<Shortener>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/chat", post(chat))
        .route("/api/shorten", post(shorten))
        .route("/health", get(health))
        // Slack above the PDF cap so oversized uploads reach our own
        // FileTooLarge check instead of a bare 413.
        .layer(DefaultBodyLimit::max(MAX_PDF_BYTES + 1024 * 1024))
        .with_state(state)
}

#[derive(Deserialize)]
struct AnalyzeBody {
    #[serde(default)]
    content: String,
    /// Validated by hand so a typo'd value gets its own message instead of
    /// a whole-body deserialization rejection.
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Accepts either a JSON body or a multipart upload on the same route, so
/// the content type has to be inspected before picking an extractor.
async fn analyze(State(state): State<AppState>, req: Request) -> Response {
    let envelope = match build_envelope(req).await {
        Ok(envelope) => envelope,
        Err(resp) => return resp,
    };
    match state.analyzer.analyze(envelope).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn build_envelope(req: Request) -> Result<InputEnvelope, Response> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|_| bad_request("No content provided"))?;
        envelope_from_multipart(multipart).await
    } else {
        let Json(body) = Json::<AnalyzeBody>::from_request(req, &())
            .await
            .map_err(|_| bad_request("No content provided"))?;
        if body.content.trim().is_empty() {
            return Err(bad_request("No content provided"));
        }
        let kind = match body.kind.as_deref() {
            None | Some("text") => SourceKind::Text,
            Some("url") => SourceKind::Url,
            Some(_) => return Err(bad_request("Invalid type. Use \"url\" or \"text\".")),
        };
        Ok(InputEnvelope {
            kind,
            payload: EnvelopePayload::Text(body.content),
            declared_type: "text/plain".to_string(),
        })
    }
}

async fn envelope_from_multipart(mut multipart: Multipart) -> Result<InputEnvelope, Response> {
    let mut file: Option<(Vec<u8>, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| bad_request("No content provided"))?
    {
        if field.name() == Some("file") {
            let declared = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| bad_request("No content provided"))?;
            file = Some((bytes.to_vec(), declared));
        }
    }
    let (bytes, declared_type) = file.ok_or_else(|| bad_request("No content provided"))?;
    Ok(InputEnvelope {
        kind: SourceKind::File,
        payload: EnvelopePayload::Binary(bytes),
        declared_type,
    })
}

#[derive(Deserialize)]
struct ChatBody {
    messages: Vec<ChatMessage>,
    #[serde(default)]
    context: String,
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(_) => return bad_request("Invalid messages format"),
    };
    if body.messages.is_empty() {
        return bad_request("Invalid messages format");
    }
    let reply = state.assistant.reply(&body.messages, &body.context).await;
    Json(json!({ "content": reply.content })).into_response()
}

#[derive(Deserialize)]
struct ShortenBody {
    #[serde(default)]
    url: String,
}

async fn shorten(
    State(state): State<AppState>,
    body: Result<Json<ShortenBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(_) => return bad_request("No URL provided"),
    };
    if body.url.trim().is_empty() {
        return bad_request("No URL provided");
    }
    match state.shortener.shorten(&body.url).await {
        Ok(short_url) => Json(json!({ "shortUrl": short_url })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "providers": state.analyzer.chain().provider_names(),
    }))
    .into_response()
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
}

/// Maps pipeline errors onto status codes and the fixed messages the
/// frontend expects. Internals are logged here, never echoed to clients.
fn error_response(err: &Error) -> Response {
    let (status, message) = match err {
        Error::InvalidUrl(_) | Error::Fetch(_) => (
            StatusCode::BAD_REQUEST,
            "Could not fetch URL. Try using Text mode.",
        ),
        Error::UnsupportedFileType(_) => {
            (StatusCode::BAD_REQUEST, "Only PDF files are supported.")
        }
        Error::FileTooLarge { .. } => (
            StatusCode::BAD_REQUEST,
            "File too large. Maximum size is 10 MB.",
        ),
        Error::UnreadablePdf(_) => (
            StatusCode::BAD_REQUEST,
            "Could not read this PDF. It may be image-based or encrypted.",
        ),
        Error::ContentTooShort { .. } => (
            StatusCode::BAD_REQUEST,
            "Content too short or could not be extracted.",
        ),
        Error::AllProvidersExhausted(attempts) => {
            error!(?attempts, "all providers exhausted");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service is temporarily busy. We will be back shortly.",
            )
        }
        Error::UnparseableResponse(detail) => {
            error!(%detail, "model output did not parse");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to parse AI response",
            )
        }
        Error::Shorten(_) => (StatusCode::BAD_GATEWAY, "Failed to shorten link"),
        other => {
            error!(error = %other, "unexpected pipeline error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}
