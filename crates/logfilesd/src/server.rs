use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use logfiles_core::{
    classify_hosts, resolve_hosts, CoordinatorConfig, FanoutCoordinator, HostResult, LocalIdentity,
    LogFilesError, QueryTarget, RawQuery, RemoteQuery,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::config::DaemonSettings;
use crate::identity::SystemIdentity;
use crate::remote::HttpRemoteQuery;

pub const FILES_ROUTE: &str = "/logfiles/api/v1/files";
pub const HOSTS_HEADER: &str = "X-hosts";

#[derive(Clone)]
pub(crate) struct AppState {
    coordinator: Arc<FanoutCoordinator>,
    openapi_json: Arc<String>,
}

/// Body of every non-200 answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryQuery {
    n_lines: Option<i64>,
    keyword: Option<String>,
    order_by: Option<i64>,
}

#[derive(OpenApi)]
#[openapi(info(
    title = "logfilesd",
    description = "Line-window queries over log files, fanned out across hosts.",
    version = "0.1.0"
))]
struct ApiDoc;

pub async fn serve(settings: DaemonSettings) -> io::Result<()> {
    let addr: SocketAddr = settings.listen.parse().map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid listen address {}: {err}", settings.listen),
        )
    })?;
    let app = build_app(&settings)?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        log_directory = %settings.log_directory.display(),
        "logfilesd listening"
    );
    axum::serve(listener, app).await
}

pub fn build_app(settings: &DaemonSettings) -> io::Result<Router> {
    let remote = HttpRemoteQuery::new(&settings.remote).map_err(io::Error::other)?;
    let identity = SystemIdentity::new(settings.advertised_address.clone());
    Ok(build_app_with(
        coordinator_config(settings),
        Arc::new(remote),
        Arc::new(identity),
    ))
}

pub fn build_app_with(
    config: CoordinatorConfig,
    remote: Arc<dyn RemoteQuery>,
    identity: Arc<dyn LocalIdentity>,
) -> Router {
    let (router, openapi_json) = build_openapi_router();
    let coordinator = FanoutCoordinator::new(config, remote, identity);
    tracing::info!(own_address = coordinator.own_address(), "local identity resolved");

    let state = AppState {
        coordinator: Arc::new(coordinator),
        openapi_json: Arc::new(openapi_json),
    };

    router
        .route("/openapi.json", get(openapi_spec))
        .with_state(state)
}

pub(crate) fn build_openapi_router() -> (Router<AppState>, String) {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(list_files))
        .routes(routes!(read_file))
        .split_for_parts();
    let json = api
        .to_pretty_json()
        .map(|value| format!("{value}\n"))
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "openapi document did not serialize");
            "{}\n".to_string()
        });
    (router, json)
}

fn coordinator_config(settings: &DaemonSettings) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::new(settings.log_directory.clone());
    config.cache_capacity = settings.cache_capacity;
    config.max_line_chunk = settings.max_line_chunk_bytes;
    config.defaults = settings.query_defaults.clone();
    if let Some(workers) = settings.worker_threads {
        config.workers = workers;
    }
    config
}

#[utoipa::path(
    get,
    path = "/logfiles/api/v1/files",
    params(
        ("n_lines" = Option<i64>, Query, description = "Lines per file; -1 reads whole files"),
        ("keyword" = Option<String>, Query, description = "Substring every returned line contains"),
        ("order_by" = Option<i64>, Query, description = "0 ascending, 1 descending"),
        ("X-hosts" = Option<String>, Header, description = "Comma-separated hosts to query")
    ),
    responses(
        (status = 200, description = "One record per host, local last", body = [HostResult]),
        (status = 400, description = "Invalid parameter", body = ErrorResponse),
        (status = 403, description = "Log directory not readable", body = ErrorResponse),
        (status = 404, description = "Log directory not found", body = ErrorResponse)
    )
)]
async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DirectoryQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_query(rejection),
    };
    let raw = RawQuery {
        start_pos: None,
        n_lines: query.n_lines,
        keyword: query.keyword,
        order_by: query.order_by,
        hosts: hosts_header(&headers),
    };
    run_query(&state, QueryTarget::Directory, raw).await
}

#[utoipa::path(
    get,
    path = "/logfiles/api/v1/files/{file_name}",
    params(
        ("file_name" = String, Path, description = "File inside the log directory"),
        (
            "start_pos" = Option<i64>,
            Query,
            description = "Byte cursor to resume from; -1 starts at the natural end"
        ),
        ("n_lines" = Option<i64>, Query, description = "Lines to return; -1 reads the whole file"),
        ("keyword" = Option<String>, Query, description = "Substring every returned line contains"),
        ("order_by" = Option<i64>, Query, description = "0 ascending, 1 descending"),
        ("X-hosts" = Option<String>, Header, description = "Comma-separated hosts to query")
    ),
    responses(
        (status = 200, description = "One record per host, local last", body = [HostResult]),
        (status = 400, description = "Invalid parameter", body = ErrorResponse),
        (status = 403, description = "Log directory not readable", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
async fn read_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    headers: HeaderMap,
    query: Result<Query<RawQuery>, QueryRejection>,
) -> Response {
    let Query(mut raw) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_query(rejection),
    };
    raw.hosts = hosts_header(&headers);
    run_query(&state, QueryTarget::File(file_name), raw).await
}

async fn run_query(state: &AppState, target: QueryTarget, raw: RawQuery) -> Response {
    let coordinator = &state.coordinator;
    let local_only = {
        let hosts = resolve_hosts(raw.hosts.as_deref(), &coordinator.defaults().hosts);
        let plan = classify_hosts(&hosts, coordinator.own_address());
        plan.includes_self && plan.remotes.is_empty()
    };

    match coordinator.execute(&target, &raw).await {
        Ok(results) => results_response(results, local_only),
        Err(err) => error_response(&err),
    }
}

/// A query that only touched this host answers with the local status, so a
/// missing file on a single host is a plain HTTP 404.
fn results_response(results: Vec<HostResult>, local_only: bool) -> Response {
    if local_only {
        if let [record] = results.as_slice() {
            if !record.is_success() {
                let status = StatusCode::from_u16(record.status_code)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let body = ErrorResponse {
                    code: record.status_code,
                    message: record.status_message.clone(),
                };
                return (status, Json(body)).into_response();
            }
        }
    }
    (StatusCode::OK, Json(results)).into_response()
}

fn error_response(err: &LogFilesError) -> Response {
    let code = err.status().code();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "query failed");
    }
    let body = ErrorResponse {
        code,
        message: err.to_string(),
    };
    (status, Json(body)).into_response()
}

fn bad_query(rejection: QueryRejection) -> Response {
    let body = ErrorResponse {
        code: StatusCode::BAD_REQUEST.as_u16(),
        message: rejection.body_text(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn hosts_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(HOSTS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn openapi_spec(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        state.openapi_json.as_str().to_owned(),
    )
}
