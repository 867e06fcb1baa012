//! HTTP request handlers for the reference analysis service.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::analyzer::FrameAnalyzer;
use super::slots::{Admission, SlotRegistry, DEFAULT_SESSION};
use super::types::{ErrorResponse, HealthResponse, SessionQuery};
use crate::analysis::{AnalyzeReply, Emotion, PollReply, SESSION_HEADER};
use crate::settings::schema::ServerSettings;

/// Debounce timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Frames arriving sooner than this after the last processing are debounced
    pub min_process_interval: Duration,
    /// Delay before a debounced frame is processed
    pub debounce: Duration,
    /// Sessions idle for longer are dropped by the cleanup task
    pub session_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            min_process_interval: Duration::from_millis(settings.min_process_interval_ms),
            debounce: Duration::from_millis(settings.debounce_ms),
            session_ttl: Duration::from_secs(settings.session_ttl_secs),
        }
    }
}

/// Application state shared across all handlers
pub struct AppState {
    pub slots: SlotRegistry,
    pub analyzer: Arc<dyn FrameAnalyzer>,
    pub config: ServerConfig,
    /// Cancelled on server shutdown
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        analyzer: Arc<dyn FrameAnalyzer>,
    ) -> (Arc<Self>, CancellationToken) {
        let shutdown_token = CancellationToken::new();
        let state = Arc::new(Self {
            slots: SlotRegistry::new(),
            analyzer,
            config,
            shutdown_token: shutdown_token.clone(),
        });
        (state, shutdown_token)
    }

    /// Detect the emotion and compose the reply for one frame.
    async fn process(&self, frame: &[u8], message: &str) -> AnalyzeReply {
        let emotion = match self.analyzer.detect(frame).await {
            Ok(emotion) => emotion,
            Err(e) => {
                tracing::debug!("Analyzer failed, falling back to neutral: {}", e);
                Emotion::Neutral
            }
        };
        AnalyzeReply::ok(emotion, self.analyzer.compose_reply(emotion, message))
    }
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.slots.count()))
}

/// `POST /analyze_emotion/`
///
/// Multipart fields `file` (the frame) and `message`. The session comes from
/// the `X-Session-Id` header, then the `session` query parameter, then
/// `"default"`.
///
/// # Response
///
/// - `200 OK`: `{"status":"ok","emotion":..,"chatbot_response":..}`
/// - `202 Accepted`: `{"status":"accepted"}`, frame debounced; poll `/get_result/`
/// - `400 Bad Request`: malformed multipart or missing `file`
pub async fn analyze_emotion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
    multipart: Multipart,
) -> Response {
    let session_id = resolve_session(&headers, &query);

    let (frame, message) = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => return e.into_response(),
    };

    let admission = state.slots.admit(
        &session_id,
        frame,
        message,
        Instant::now(),
        state.config.min_process_interval,
    );

    match admission {
        Admission::Debounced(token) => {
            tracing::debug!("Debouncing frame for session {}", session_id);
            spawn_debounce(state.clone(), session_id, token);
            (StatusCode::ACCEPTED, Json(AnalyzeReply::accepted())).into_response()
        }
        Admission::ProcessNow { frame, message } => {
            let reply = state.process(&frame, &message).await;
            state.slots.record(&session_id, reply.clone(), Instant::now());
            tracing::debug!(
                "Processed frame for session {}: {:?}",
                session_id,
                reply.emotion
            );
            (StatusCode::OK, Json(reply)).into_response()
        }
    }
}

/// `GET /get_result/?session=ID`
///
/// `pending` while a debounced frame awaits processing, `ok` with the last
/// result, otherwise `none`.
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Json<PollReply> {
    let session_id = query
        .session
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    Json(state.slots.poll(&session_id))
}

fn resolve_session(headers: &HeaderMap, query: &SessionQuery) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| query.session.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

type BadRequest = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>, code: &str) -> BadRequest {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::with_code(message, code)),
    )
}

async fn read_upload(mut multipart: Multipart) -> Result<(Vec<u8>, String), BadRequest> {
    let mut frame = None;
    let mut message = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string(), "INVALID_MULTIPART"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(e.to_string(), "INVALID_MULTIPART"))?;
                frame = Some(bytes.to_vec());
            }
            Some("message") => {
                message = field
                    .text()
                    .await
                    .map_err(|e| bad_request(e.to_string(), "INVALID_MULTIPART"))?;
            }
            _ => {}
        }
    }

    let frame = frame.ok_or_else(|| bad_request("missing 'file' field", "MISSING_FILE"))?;
    Ok((frame, message))
}

/// Process the session's pending frame after the debounce delay unless a
/// newer frame (or shutdown) cancels it first.
fn spawn_debounce(state: Arc<AppState>, session_id: String, token: CancellationToken) {
    let delay = state.config.debounce;
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = state.shutdown_token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let Some((frame, message)) = state.slots.take_pending(&session_id, &token) else {
            return;
        };
        let reply = state.process(&frame, &message).await;
        tracing::debug!(
            "Processed debounced frame for session {}: {:?}",
            session_id,
            reply.emotion
        );
        state.slots.record(&session_id, reply, Instant::now());
    });
}
