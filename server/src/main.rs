//! kenni-bridge: federated login bridge - hyper entrypoint
//!
//! Lightweight HTTP server, deployable behind the platform's auth layer.
//! All protocol logic lives in kenni-bridge-core; this binary only routes,
//! parses bodies, and maps errors to responses.

use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use tracing_subscriber::EnvFilter;

use kenni_bridge_core::error::{ApiError, ErrorResponse};
use kenni_bridge_core::login;
use kenni_bridge_core::session::PemSessionSigner;

use kenni_bridge_server::platform::{MokaCache, ProcessEnv, ReqwestHttpClient, SystemClock};
use kenni_bridge_server::rpc;
use kenni_bridge_server::store::{SqliteAccountStore, DEFAULT_DATABASE_PATH};

/// Shared application state, constructed once at startup
struct AppState {
    store: SqliteAccountStore,
    cache: MokaCache,
    http: ReqwestHttpClient,
    clock: SystemClock,
    env: ProcessEnv,
    signer: PemSessionSigner,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .expect("PORT must be a number");

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());

    let store = SqliteAccountStore::open(&database_path)
        .await
        .expect("failed to open account store");

    let service_account =
        std::env::var("SESSION_SERVICE_ACCOUNT").expect("SESSION_SERVICE_ACCOUNT must be set");
    let pem_key = std::env::var("SESSION_SIGNING_KEY").expect("SESSION_SIGNING_KEY must be set");

    let state = Arc::new(AppState {
        store,
        cache: MokaCache::new(),
        http: ReqwestHttpClient::new(),
        clock: SystemClock,
        env: ProcessEnv,
        signer: PemSessionSigner {
            service_account,
            pem_key,
        },
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("failed to bind");

    tracing::info!(port, database_path = %database_path, "kenni-bridge listening");

    loop {
        let (stream, _) = listener.accept().await.expect("accept failed");
        let state = state.clone();

        let io = hyper_util::rt::TokioIo::new(stream);
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, &state).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, "connection error");
            }
        });
    }
}

type HyperResponse = Response<Full<Bytes>>;

async fn handle_request(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<HyperResponse, std::convert::Infallible> {
    let result = route_request(req, state).await;
    Ok(result)
}

async fn route_request(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::GET, "/") => handle_health(),
        (Method::OPTIONS, _) => preflight_response(),
        (Method::POST, "/auth/login") => handle_login(req, state).await,
        (Method::POST, "/rpc/create-election") => handle_create_election(req, state).await,
        (Method::POST, "/rpc/update-profile") => handle_update_profile(req, state).await,
        (_, "/auth/login" | "/rpc/create-election" | "/rpc/update-profile") => {
            status_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &serde_json::json!({"error": "method_not_allowed", "message": "use POST"}),
            )
        }
        _ => status_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"error": "not_found"}),
        ),
    }
}

fn handle_health() -> HyperResponse {
    status_response(
        StatusCode::OK,
        &serde_json::json!({
            "name": "kenni-bridge",
            "status": "ok"
        }),
    )
}

async fn handle_login(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let request: login::LoginRequest = match read_json_body(req).await {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    match login::handle(
        request,
        &state.store,
        &state.cache,
        &state.http,
        &state.env,
        &state.clock,
        &state.signer,
    )
    .await
    {
        Ok(response) => status_response(StatusCode::OK, &response),
        Err(e) => error_response(&e),
    }
}

async fn handle_create_election(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let caller = match extract_caller(req.headers()) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let request: rpc::CreateElectionRequest = match read_json_body(req).await {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    match rpc::create_election(&caller, request, &state.store, &state.clock).await {
        Ok(response) => status_response(StatusCode::OK, &response),
        Err(e) => error_response(&e),
    }
}

async fn handle_update_profile(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let caller = match extract_caller(req.headers()) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let request: rpc::UpdateProfileRequest = match read_json_body(req).await {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    match rpc::update_profile(&caller, request, &state.store).await {
        Ok(response) => status_response(StatusCode::OK, &response),
        Err(e) => error_response(&e),
    }
}

/// Caller identity injected by the platform auth layer in front of this
/// service; authentication itself happens there, not here.
fn extract_caller(headers: &hyper::HeaderMap) -> Result<String, ApiError> {
    headers
        .get("X-Authenticated-Account")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| ApiError::permission_denied("request is not authenticated"))
}

async fn read_json_body<T: serde::de::DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, ApiError> {
    let body = req
        .collect()
        .await
        .map_err(|_| ApiError::invalid_request("failed to read request body"))?
        .to_bytes();

    serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid_request(format!("invalid JSON body: {}", e)))
}

fn preflight_response() -> HyperResponse {
    let builder = Response::builder().status(StatusCode::NO_CONTENT);
    with_cors(builder).body(Full::new(Bytes::new())).unwrap()
}

fn error_response(err: &ApiError) -> HyperResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    // Configuration problems are an operator concern; everything else 5xx is
    // still worth a loud log line.
    match err {
        ApiError::Configuration { .. } => {
            tracing::error!(error_key = err.error_key(), error = %err, "deployment configuration is incomplete")
        }
        _ if status.is_server_error() => {
            tracing::error!(error_key = err.error_key(), error = %err, "request failed")
        }
        _ => tracing::warn!(error_key = err.error_key(), error = %err, "request rejected"),
    }

    status_response(status, &ErrorResponse::from(err))
}

fn status_response<T: serde::Serialize>(status: StatusCode, body: &T) -> HyperResponse {
    let json = serde_json::to_vec(body).unwrap_or_default();
    let builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json");
    with_cors(builder).body(Full::new(Bytes::from(json))).unwrap()
}

fn with_cors(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-Authenticated-Account",
        )
        .header("Access-Control-Max-Age", "3600")
}
