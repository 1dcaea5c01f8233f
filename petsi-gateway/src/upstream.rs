//! Upstream webhook client.
//!
//! Every route the gateway serves maps onto one entry of the endpoint table
//! below. A handler builds an [`UpstreamRequest`] for its endpoint, and
//! [`UpstreamClient::call`] performs exactly one outbound call and returns
//! the decoded JSON body. Any failure on the way (connect, timeout, non-2xx,
//! undecodable body) comes back as [`Error::Upstream`] carrying the
//! underlying message.

use petsi_common::config::UpstreamConfig;
use petsi_common::logging::RequestContext;
use petsi_common::{Error, Result};
use reqwest::{multipart, Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// How long an endpoint may take before the call is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Quick lookups and CRUD calls
    Short,
    /// Listings and download links
    Standard,
    /// Uploads and the web chatbot
    Long,
}

/// HTTP verb used towards the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<UpstreamMethod> for Method {
    fn from(method: UpstreamMethod) -> Self {
        match method {
            UpstreamMethod::Get => Method::GET,
            UpstreamMethod::Post => Method::POST,
            UpstreamMethod::Put => Method::PUT,
            UpstreamMethod::Delete => Method::DELETE,
        }
    }
}

/// One upstream webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Short name used in logs
    pub name: &'static str,
    pub method: UpstreamMethod,
    /// Path appended to the upstream base URL
    pub path: &'static str,
    pub timeout: TimeoutClass,
}

const fn endpoint(
    name: &'static str,
    method: UpstreamMethod,
    path: &'static str,
    timeout: TimeoutClass,
) -> Endpoint {
    Endpoint {
        name,
        method,
        path,
        timeout,
    }
}

/// The upstream endpoint table.
pub mod endpoints {
    use super::{endpoint, Endpoint, TimeoutClass::*, UpstreamMethod::*};

    // Drive folders
    pub const LIST_FOLDERS: Endpoint = endpoint("list_folders", Get, "/api/drive/folders", Short);
    pub const CREATE_FOLDER: Endpoint =
        endpoint("create_folder", Post, "/api/drive/folders", Short);
    pub const RENAME_FOLDER: Endpoint =
        endpoint("rename_folder", Put, "/api/drive/folder/rename", Short);
    pub const DELETE_FOLDER: Endpoint =
        endpoint("delete_folder", Delete, "/api/drive/folder", Short);
    pub const LIST_FOLDER_FILES: Endpoint =
        endpoint("list_folder_files", Get, "/api/drive/folders/files", Short);

    // Drive files
    pub const UPLOAD_FILE: Endpoint =
        endpoint("upload_file", Post, "/api/drive/files/upload", Long);
    pub const RENAME_FILE: Endpoint =
        endpoint("rename_file", Put, "/api/drive/file/rename", Short);
    pub const DELETE_FILE: Endpoint =
        endpoint("delete_file", Delete, "/api/drive/file", Standard);
    pub const DOWNLOAD_LINK: Endpoint =
        endpoint("download_link", Get, "/api/drive/file/download", Standard);

    // Products
    pub const DRIVE_PRODUCTS: Endpoint =
        endpoint("drive_products", Get, "/api/drive/products", Standard);
    pub const DRIVE_PRODUCT_TOTALS: Endpoint =
        endpoint("drive_product_totals", Get, "/api/drive/total/products", Standard);
    pub const PRODUCTS: Endpoint = endpoint("products", Get, "/api/productos", Short);

    // Appointments
    pub const DRIVE_APPOINTMENTS: Endpoint =
        endpoint("drive_appointments", Get, "/api/drive/citas", Standard);
    pub const LIST_APPOINTMENTS: Endpoint =
        endpoint("list_appointments", Get, "/api/citas", Short);
    pub const FILTER_APPOINTMENTS: Endpoint =
        endpoint("filter_appointments", Get, "/api/citas/filtrar", Short);
    /// Takes the appointment id as an extra path segment.
    pub const APPOINTMENT_DETAIL: Endpoint =
        endpoint("appointment_detail", Get, "/api/citas", Short);

    // Chatbots
    pub const WEB_CHATBOT: Endpoint = endpoint("web_chatbot", Post, "/api/web/chatbot", Long);
    pub const SESSION_CHATBOT: Endpoint = endpoint("session_chatbot", Post, "/chatbot", Standard);

    pub const ALL: &[Endpoint] = &[
        LIST_FOLDERS,
        CREATE_FOLDER,
        RENAME_FOLDER,
        DELETE_FOLDER,
        LIST_FOLDER_FILES,
        UPLOAD_FILE,
        RENAME_FILE,
        DELETE_FILE,
        DOWNLOAD_LINK,
        DRIVE_PRODUCTS,
        DRIVE_PRODUCT_TOTALS,
        PRODUCTS,
        DRIVE_APPOINTMENTS,
        LIST_APPOINTMENTS,
        FILTER_APPOINTMENTS,
        APPOINTMENT_DETAIL,
        WEB_CHATBOT,
        SESSION_CHATBOT,
    ];
}

enum RequestBody {
    Empty,
    Json(Value),
    Multipart(multipart::Form),
}

/// A single outbound call, built up by a handler.
pub struct UpstreamRequest {
    endpoint: Endpoint,
    segment: Option<String>,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl UpstreamRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            segment: None,
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Append one percent-encoded path segment to the endpoint path.
    pub fn path_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: multipart::Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }
}

/// Per-class timeouts.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub short: Duration,
    pub standard: Duration,
    pub long: Duration,
}

impl Timeouts {
    pub fn get(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Short => self.short,
            TimeoutClass::Standard => self.standard,
            TimeoutClass::Long => self.long,
        }
    }
}

impl From<&UpstreamConfig> for Timeouts {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            short: Duration::from_secs(config.short_timeout_secs),
            standard: Duration::from_secs(config.standard_timeout_secs),
            long: Duration::from_secs(config.long_timeout_secs),
        }
    }
}

/// Shared client for the upstream webhook service.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: Arc<String>,
    timeouts: Timeouts,
}

impl UpstreamClient {
    /// Create a client for the configured upstream.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("petsi-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: Arc::new(config.base_url.trim_end_matches('/').to_string()),
            timeouts: Timeouts::from(config),
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Full URL for an endpoint, with an optional extra path segment.
    pub fn url_for(&self, endpoint: Endpoint, segment: Option<&str>) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, endpoint.path);
        let mut url =
            Url::parse(&raw).map_err(|e| Error::Config(format!("invalid upstream URL {raw}: {e}")))?;

        if let Some(segment) = segment {
            url.path_segments_mut()
                .map_err(|_| Error::Config(format!("upstream URL {raw} cannot take a path")))?
                .push(segment);
        }

        Ok(url)
    }

    /// Perform the call and decode the JSON body.
    pub async fn call(&self, request: UpstreamRequest, ctx: &RequestContext) -> Result<Value> {
        let endpoint = request.endpoint;
        let url = self.url_for(endpoint, request.segment.as_deref())?;
        let timeout = self.timeouts.get(endpoint.timeout);

        let mut headers = reqwest::header::HeaderMap::new();
        ctx.to_headers(&mut headers);

        let mut builder = self
            .client
            .request(endpoint.method.into(), url.clone())
            .headers(headers)
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        tracing::debug!(
            trace_id = %ctx.trace_id,
            endpoint = endpoint.name,
            url = %url,
            timeout_secs = timeout.as_secs(),
            "Calling upstream"
        );

        let started = Instant::now();
        let result = send(builder).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::info!(
                trace_id = %ctx.trace_id,
                endpoint = endpoint.name,
                elapsed_ms,
                "Upstream call succeeded"
            ),
            Err(e) => tracing::warn!(
                trace_id = %ctx.trace_id,
                endpoint = endpoint.name,
                elapsed_ms,
                error = %e,
                "Upstream call failed"
            ),
        }

        result
    }
}

async fn send(builder: reqwest::RequestBuilder) -> Result<Value> {
    let response = builder
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| Error::Upstream(e.to_string()))?;

    response
        .json::<Value>()
        .await
        .map_err(|e| Error::Upstream(e.to_string()))
}
