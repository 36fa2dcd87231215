//! HTTP front for the portal: JSON endpoints for the page controller and the
//! worker, and a fallback that serves every other path through the
//! registration.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use url::Url;

use crate::config::{AppConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::http::{Request, RequestMode};
use crate::portal::{
    ActionAck, CallbackSelection, ChatRules, Lead, LeadService, Offer, UserAction,
    default_offers, lead_id_from_query, request_callback, service_from_config,
};
use crate::stats::StatsSnapshot;
use crate::urls;
use crate::worker::{
    ClickOutcome, ControlMessage, Notification, Registration, SyncOutcome, VersionReply,
    WorkerState, on_click, reply_port,
};

/// Header telling the client where a proxied response came from.
pub const SOURCE_HEADER: HeaderName = HeaderName::from_static("x-portal-source");

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    registration: Arc<Registration>,
    leads: Arc<dyn LeadService>,
    chat: Arc<ChatRules>,
    origin: Url,
}

impl AppState {
    #[must_use]
    pub fn new(
        registration: Arc<Registration>,
        leads: Arc<dyn LeadService>,
        chat: ChatRules,
        origin: Url,
    ) -> Self {
        Self {
            registration,
            leads,
            chat: Arc::new(chat),
            origin,
        }
    }

    /// Builds the state from configuration, picking the simulated or HTTP
    /// lead service.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin or a portal endpoint is not a valid URL,
    /// or the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig, registration: Arc<Registration>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.fetch.user_agent.clone())
            .timeout(Duration::from_secs(config.fetch.timeout_secs))
            .build()?;
        Ok(Self::new(
            registration,
            service_from_config(&config.portal, client)?,
            ChatRules::default(),
            config.fetch.origin_url()?,
        ))
    }
}

/// Handler error mapped onto an HTTP status.
#[derive(Debug)]
enum ApiError {
    Portal(Error),
    NoWorker,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Portal(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> HttpResponse {
        let (status, message) = match self {
            Self::NoWorker => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no active worker".to_string(),
            ),
            Self::Portal(e) => {
                let status = match &e {
                    Error::InvalidInput(_) | Error::Json(_) | Error::Url(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    Error::InvalidState { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    e if e.is_network() => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };
        if status.is_server_error() {
            log::error!("{status}: {message}");
        }
        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: Option<String>,
}

async fn api_health(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok",
        version: state.registration.active_version().await,
    })
}

async fn api_lead(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<axum::Json<Lead>> {
    let lead_id = lead_id_from_query(query.as_deref());
    Ok(axum::Json(state.leads.fetch_lead(&lead_id).await?))
}

async fn api_post_action(
    State(state): State<AppState>,
    axum::Json(action): axum::Json<UserAction>,
) -> ApiResult<axum::Json<ActionAck>> {
    if action.action.trim().is_empty() {
        return Err(Error::InvalidInput("action must not be empty".into()).into());
    }
    Ok(axum::Json(state.leads.post_action(&action).await?))
}

async fn api_offers() -> axum::Json<Vec<Offer>> {
    axum::Json(default_offers())
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: Option<String>,
}

async fn api_chat(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<ChatRequest>,
) -> axum::Json<ChatResponse> {
    axum::Json(ChatResponse {
        reply: state.chat.reply(&payload.message).map(ToString::to_string),
    })
}

async fn api_callback(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CallbackSelection>,
) -> ApiResult<axum::Json<CallbackSelection>> {
    let selection = request_callback(&payload.day, &payload.slot, state.leads.as_ref()).await?;
    Ok(axum::Json(selection))
}

async fn api_worker_message(
    State(state): State<AppState>,
    axum::Json(message): axum::Json<ControlMessage>,
) -> ApiResult<HttpResponse> {
    match message {
        ControlMessage::SkipWaiting => {
            state.registration.post_message(message, None).await?;
            Ok(StatusCode::ACCEPTED.into_response())
        }
        ControlMessage::GetVersion => {
            let (port, rx) = reply_port();
            state.registration.post_message(message, Some(port)).await?;
            let reply: VersionReply = rx.await.map_err(|_| ApiError::NoWorker)?;
            Ok(axum::Json(reply).into_response())
        }
    }
}

async fn api_worker_push(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<axum::Json<Notification>> {
    let worker = state.registration.active().await.ok_or(ApiError::NoWorker)?;
    let payload = Some(body.as_str()).filter(|b| !b.is_empty());
    Ok(axum::Json(worker.push(payload)))
}

#[derive(Deserialize)]
struct ClickRequest {
    #[serde(default)]
    action: Option<String>,
}

async fn api_worker_click(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<ClickRequest>,
) -> axum::Json<ClickOutcome> {
    let action = payload.action.as_deref();
    let outcome = match state.registration.active().await {
        Some(worker) => worker.notification_click(action),
        None => on_click(action),
    };
    axum::Json(outcome)
}

#[derive(Deserialize)]
struct SyncRequest {
    tag: String,
}

async fn api_worker_sync(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<SyncRequest>,
) -> ApiResult<axum::Json<SyncOutcome>> {
    let worker = state.registration.active().await.ok_or(ApiError::NoWorker)?;
    Ok(axum::Json(worker.sync(&payload.tag).await))
}

#[derive(Serialize)]
struct WorkerStatus {
    active: Option<String>,
    waiting: Option<String>,
    state: Option<WorkerState>,
    installing: bool,
    stats: Option<StatsSnapshot>,
}

async fn api_worker_stats(State(state): State<AppState>) -> axum::Json<WorkerStatus> {
    let registration = &state.registration;
    let active = registration.active().await;
    axum::Json(WorkerStatus {
        active: active.as_ref().map(|w| w.cache_name().to_string()),
        waiting: registration.waiting_version().await,
        state: active.as_ref().map(|w| w.state()),
        installing: registration.is_installing().await,
        stats: active.as_ref().map(|w| w.stats()),
    })
}

/// Whether the incoming request loads a top-level document.
fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if header_str("sec-fetch-mode") == Some("navigate") {
        return true;
    }
    *method == Method::GET
        && header_str(header::ACCEPT.as_str()).is_some_and(|accept| accept.contains("text/html"))
}

const FORWARDED_HEADERS: &[HeaderName] = &[
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::CONTENT_TYPE,
];

const STRIPPED_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

async fn resolve_fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<HttpResponse> {
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mode = if is_navigation(&method, &headers) {
        RequestMode::Navigate
    } else {
        RequestMode::Subresource
    };

    let url = urls::on_origin(&state.origin, uri.path(), uri.query());
    let mut request = Request::new(method, url).with_mode(mode).with_body(body);
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(name) {
            request.headers.insert(name.clone(), value.clone());
        }
    }

    let resolved = state.registration.resolve(&request).await?;
    log::debug!(
        "{} {} -> {} ({})",
        request.method,
        target,
        resolved.response.status,
        resolved.source.label()
    );

    let mut response_headers = resolved.response.headers;
    for name in STRIPPED_HEADERS {
        response_headers.remove(name);
    }
    response_headers.insert(
        SOURCE_HEADER,
        HeaderValue::from_static(resolved.source.label()),
    );
    Ok((
        resolved.response.status,
        response_headers,
        resolved.response.body,
    )
        .into_response())
}

/// Builds the router with every route and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/lead", get(api_lead))
        .route("/api/actions", post(api_post_action))
        .route("/api/offers", get(api_offers))
        .route("/api/chat", post(api_chat))
        .route("/api/callback", post(api_callback))
        .route("/api/worker/message", post(api_worker_message))
        .route("/api/worker/push", post(api_worker_push))
        .route("/api/worker/notification-click", post(api_worker_click))
        .route("/api/worker/sync", post(api_worker_sync))
        .route("/api/worker/stats", get(api_worker_stats))
        .fallback(resolve_fallback)
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    Ok(listener)
}

/// Serves until `shutdown` is cancelled, then drains in-flight requests.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Portal listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    log::info!("Portal server stopped");
    Ok(())
}
