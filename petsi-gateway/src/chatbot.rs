//! Chatbot relay endpoints.
//!
//! `/api/chatbot` keeps a per-browser conversation id in a cookie and
//! passes it upstream with every message. `/api/web/chatbot` relays the
//! web widget payload as-is.

use crate::error::ApiResult;
use crate::routes::{relay, AppState};
use crate::upstream::{endpoints, UpstreamRequest};
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    response::Json,
    routing::post,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use petsi_common::logging::RequestContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamp format used when the client omits one.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Message from the session chatbot widget.
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub mensaje: String,
    #[serde(default = "default_message_type")]
    pub tipo_mensaje: Option<String>,
    #[serde(default)]
    pub fecha: Option<String>,
}

fn default_message_type() -> Option<String> {
    Some("web".into())
}

/// Payload sent to the upstream session chatbot.
#[derive(Debug, Serialize)]
struct SessionChatPayload {
    mensaje: String,
    tipo_mensaje: Option<String>,
    fecha: String,
    id_session: String,
}

/// Message from the web chatbot widget.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebChatMessage {
    pub user_id: String,
    pub type_message: String,
    pub text_message: String,
    #[serde(default)]
    pub date_time: Option<String>,
}

/// Build chatbot routes.
pub fn chatbot_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chatbot", post(session_chat_handler))
        .route("/api/web/chatbot", post(web_chat_handler))
}

fn now_timestamp() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Relay a message with the caller's session id.
///
/// An absent, unknown, or expired cookie starts a new session. Every call
/// extends the session and sweeps expired ones. A missing `fecha` is
/// stamped with the current UTC time. The cookie is only set on a
/// successful upstream reply.
async fn session_chat_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    jar: CookieJar,
    payload: Result<Json<ChatMessage>, JsonRejection>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let Json(message) = payload?;

    let presented = jar.get(state.cookie_name.as_str()).map(|c| c.value());
    let session_id = state.sessions.get_or_create(presented).await;
    if presented != Some(session_id.as_str()) {
        tracing::debug!(trace_id = %ctx.trace_id, session_id = %session_id, "Started chatbot session");
    }

    state.sessions.touch(&session_id).await;
    let swept = state.sessions.sweep().await;
    if swept > 0 {
        tracing::debug!(swept, "Swept expired chatbot sessions");
    }

    let body = SessionChatPayload {
        mensaje: message.mensaje,
        tipo_mensaje: message.tipo_mensaje,
        fecha: message
            .fecha
            .filter(|f| !f.is_empty())
            .unwrap_or_else(now_timestamp),
        id_session: session_id.clone(),
    };
    let request = UpstreamRequest::new(endpoints::SESSION_CHATBOT).json(serde_json::to_value(body)?);
    let reply = relay(&state, &ctx, request).await?;

    let cookie = Cookie::build((state.cookie_name.to_string(), session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.sessions.ttl().num_seconds()))
        .build();

    Ok((jar.add(cookie), reply))
}

/// Relay a web widget message, stamping the current UTC time if missing.
async fn web_chat_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<WebChatMessage>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(mut message) = payload?;
    if message.date_time.is_none() {
        message.date_time = Some(now_timestamp());
    }

    let request = UpstreamRequest::new(endpoints::WEB_CHATBOT).json(serde_json::to_value(message)?);
    relay(&state, &ctx, request).await
}
