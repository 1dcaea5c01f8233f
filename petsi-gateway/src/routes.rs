//! Route definitions for the PETSI gateway.
//!
//! Provides the drive, product, appointment, auth, and health endpoints.
//! Chatbot routes live in [`crate::chatbot`].

use crate::auth::{auth_middleware, AuthState, AuthUser};
use crate::chatbot::chatbot_routes;
use crate::error::{ApiError, ApiResult};
use crate::form::{read_text_field, FormFields};
use crate::session::SessionStore;
use crate::upstream::{endpoints, UpstreamClient, UpstreamRequest};
use crate::user::{UserStore, UserSummary};
use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::QueryRejection,
        DefaultBodyLimit, Extension, Path, Query, Request, State,
    },
    http::HeaderValue,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use petsi_common::config::Config;
use petsi_common::logging::{RequestContext, TRACE_ID_HEADER};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Service name used in logs and the health response.
pub const SERVICE_NAME: &str = "petsi-gateway";

/// Default and maximum page size for appointment listings.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
    pub sessions: SessionStore,
    pub users: UserStore,
    pub auth: AuthState,
    pub cookie_name: Arc<String>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build state from configuration. Hashes configured passwords.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            upstream: UpstreamClient::new(&config.upstream)?,
            sessions: SessionStore::new(config.session.ttl_secs),
            users: UserStore::from_config(&config.auth.users)?,
            auth: AuthState::new(
                config.auth.secret(),
                config.auth.access_token_expire_minutes.saturating_mul(60),
            ),
            cookie_name: Arc::new(config.session.cookie_name.clone()),
            max_upload_bytes: config.upstream.max_upload_bytes,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response types
// ─────────────────────────────────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderForm {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderForm {
    pub folder_id: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameFileForm {
    pub file_id: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct FolderIdQuery {
    pub folder_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FileIdQuery {
    pub file_id: String,
}

/// Pagination query parameters for appointment listings.
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_page_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

impl PaginationQuery {
    /// `limit` must be in 1..=500 and `offset` non-negative.
    pub fn validate(&self) -> ApiResult<()> {
        if !(1..=MAX_PAGE_LIMIT).contains(&self.limit) {
            return Err(ApiError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}, got {}",
                self.limit
            )));
        }
        if self.offset < 0 {
            return Err(ApiError::validation(format!(
                "offset must be greater than or equal to 0, got {}",
                self.offset
            )));
        }
        Ok(())
    }
}

/// Appointment filter; empty values are not forwarded.
#[derive(Debug, Default, Deserialize)]
pub struct AppointmentFilter {
    #[serde(default)]
    pub fecha: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Build the complete router with all routes.
pub fn build_all_routes(config: &Config) -> anyhow::Result<Router> {
    Ok(build_routes(AppState::from_config(config)?))
}

/// Build the router around an existing state.
pub fn build_routes(state: AppState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.auth.clone(), auth_middleware);

    Router::new()
        .merge(health_routes())
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/secure", get(secure_handler).layer(auth_layer))
        .merge(drive_routes())
        .merge(appointment_routes())
        .route("/api/productos", get(products_handler))
        .merge(chatbot_routes())
        .layer(middleware::from_fn(trace_middleware))
        .with_state(state)
}

/// Build health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
}

fn drive_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/drive/folders",
            get(list_folders_handler).post(create_folder_handler),
        )
        .route("/api/drive/folder/rename", put(rename_folder_handler))
        .route("/api/drive/folder", delete(delete_folder_handler))
        .route(
            "/api/drive/folders/:folder_id/files",
            get(list_folder_files_handler),
        )
        .route(
            "/api/drive/files/upload",
            post(upload_file_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/drive/file/rename", put(rename_file_handler))
        .route("/api/drive/file", delete(delete_file_handler))
        .route("/api/drive/file/download", get(download_link_handler))
        .route("/api/drive/products", get(drive_products_handler))
        .route("/api/drive/total/products", get(drive_product_totals_handler))
        .route("/api/drive/citas", get(drive_appointments_handler))
}

fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/citas", get(list_appointments_handler))
        .route("/api/citas/filtrar", get(filter_appointments_handler))
        .route("/api/citas/hoy", get(today_appointments_handler))
        .route("/api/citas/:cita_id", get(appointment_detail_handler))
}

/// Attach a [`RequestContext`] to every request and log its outcome.
pub async fn trace_middleware(mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers(), SERVICE_NAME);
    let trace_id = ctx.trace_id.clone();
    let span_id = ctx.span_id.clone();
    let service = ctx.service.clone();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(ctx);

    let started = Instant::now();
    let mut response = next.run(request).await;

    tracing::info!(
        service = %service,
        trace_id = %trace_id,
        span_id = %span_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Forward a request and relay the upstream JSON.
pub(crate) async fn relay(
    state: &AppState,
    ctx: &RequestContext,
    request: UpstreamRequest,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.upstream.call(request, ctx).await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Verify credentials against the user table and issue a bearer token.
async fn login_handler(
    State(state): State<AppState>,
    FormFields(form): FormFields<LoginForm>,
) -> ApiResult<Json<LoginResponse>> {

    let Some(user) = state.users.authenticate(&form.username, &form.password) else {
        tracing::warn!(username = %form.username, "Failed login attempt");
        return Err(ApiError::bad_request("Invalid credentials"));
    };

    let access_token = state.auth.generate_token(&user.username)?;
    tracing::info!(username = %user.username, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".into(),
        user: user.into(),
    }))
}

/// Greet the bearer of a valid token.
async fn secure_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let user = state
        .users
        .get(&auth_user.username)
        .ok_or_else(|| ApiError::unauthorized("User does not exist"))?;

    Ok(Json(json!({ "msg": format!("Hello {}", user.username) })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Drive Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn list_folders_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    relay(&state, &ctx, UpstreamRequest::new(endpoints::LIST_FOLDERS)).await
}

async fn create_folder_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    FormFields(form): FormFields<CreateFolderForm>,
) -> ApiResult<Json<Value>> {

    let request =
        UpstreamRequest::new(endpoints::CREATE_FOLDER).json(json!({ "name": form.name }));
    relay(&state, &ctx, request).await
}

async fn rename_folder_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    FormFields(form): FormFields<RenameFolderForm>,
) -> ApiResult<Json<Value>> {

    let request = UpstreamRequest::new(endpoints::RENAME_FOLDER).json(json!({
        "folder_id": form.folder_id,
        "new_name": form.new_name,
    }));
    relay(&state, &ctx, request).await
}

async fn delete_folder_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<FolderIdQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let request = UpstreamRequest::new(endpoints::DELETE_FOLDER).query("folder_id", query.folder_id);
    relay(&state, &ctx, request).await
}

async fn list_folder_files_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(folder_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let request = UpstreamRequest::new(endpoints::LIST_FOLDER_FILES).query("folder_id", folder_id);
    relay(&state, &ctx, request).await
}

/// A file read from the inbound multipart body.
struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Upload a file into a drive folder.
///
/// The file is buffered chunk by chunk and rejected with 400 as soon as it
/// grows past the configured limit, before anything is sent upstream.
async fn upload_file_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let mut multipart = multipart.map_err(|r| ApiError::validation(r.body_text()))?;

    let mut folder_id: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "folder_id" => folder_id = Some(read_text_field(&mut field, &name).await?),
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let mut data = Vec::new();

                while let Some(chunk) = field.chunk().await? {
                    if data.len() + chunk.len() > state.max_upload_bytes {
                        tracing::warn!(
                            trace_id = %ctx.trace_id,
                            filename = %filename,
                            limit = state.max_upload_bytes,
                            "Rejected oversize upload"
                        );
                        return Err(ApiError::bad_request(format!(
                            "File exceeds the maximum upload size of {} bytes",
                            state.max_upload_bytes
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }

                file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    let folder_id = folder_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation("Field required: folder_id"))?;
    let file = file.ok_or_else(|| ApiError::validation("Field required: file"))?;

    let mut part = reqwest::multipart::Part::bytes(file.data).file_name(file.filename);
    if let Some(content_type) = file.content_type {
        part = part
            .mime_str(&content_type)
            .map_err(|e| ApiError::bad_request(format!("Invalid content type: {e}")))?;
    }
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("folder_id", folder_id);

    relay(
        &state,
        &ctx,
        UpstreamRequest::new(endpoints::UPLOAD_FILE).multipart(form),
    )
    .await
}

async fn rename_file_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    FormFields(form): FormFields<RenameFileForm>,
) -> ApiResult<Json<Value>> {

    let request = UpstreamRequest::new(endpoints::RENAME_FILE).json(json!({
        "file_id": form.file_id,
        "new_name": form.new_name,
    }));
    relay(&state, &ctx, request).await
}

async fn delete_file_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<FileIdQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let request = UpstreamRequest::new(endpoints::DELETE_FILE).query("file_id", query.file_id);
    relay(&state, &ctx, request).await
}

async fn download_link_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<FileIdQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let request = UpstreamRequest::new(endpoints::DOWNLOAD_LINK).query("file_id", query.file_id);
    relay(&state, &ctx, request).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Product Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn drive_products_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    relay(&state, &ctx, UpstreamRequest::new(endpoints::DRIVE_PRODUCTS)).await
}

async fn drive_product_totals_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    relay(&state, &ctx, UpstreamRequest::new(endpoints::DRIVE_PRODUCT_TOTALS)).await
}

async fn products_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    relay(&state, &ctx, UpstreamRequest::new(endpoints::PRODUCTS)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Appointment Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn drive_appointments_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    relay(&state, &ctx, UpstreamRequest::new(endpoints::DRIVE_APPOINTMENTS)).await
}

/// Paginated appointment listing.
async fn list_appointments_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(page) = query?;
    page.validate()?;

    let request = UpstreamRequest::new(endpoints::LIST_APPOINTMENTS)
        .query("limit", page.limit)
        .query("offset", page.offset);
    relay(&state, &ctx, request).await
}

async fn filter_appointments_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<AppointmentFilter>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(filter) = query?;

    let mut request = UpstreamRequest::new(endpoints::FILTER_APPOINTMENTS);
    if let Some(fecha) = filter.fecha.filter(|v| !v.is_empty()) {
        request = request.query("fecha", fecha);
    }
    if let Some(estado) = filter.estado.filter(|v| !v.is_empty()) {
        request = request.query("estado", estado);
    }
    relay(&state, &ctx, request).await
}

/// Appointments for the server's current local date.
async fn today_appointments_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    let today = chrono::Local::now().date_naive().to_string();
    let request = UpstreamRequest::new(endpoints::FILTER_APPOINTMENTS).query("fecha", today);
    relay(&state, &ctx, request).await
}

async fn appointment_detail_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(cita_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let request = UpstreamRequest::new(endpoints::APPOINTMENT_DETAIL).path_segment(cita_id);
    relay(&state, &ctx, request).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Health Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Health check handler.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: SERVICE_NAME.into(),
    })
}
