//! HTTP server setup and handlers.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS header)
//! - Map relay results and errors to responses
//! - Serve until the shutdown signal fires

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::{HlsConfig, RelayConfig};
use crate::http::playlist::playlist_response;
use crate::http::request::{request_id, sanitize_video_id, MakeRelayRequestId, StreamQuery};
use crate::observability::metrics;
use crate::relay::{Relay, RelayError, Target};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub hls: HlsConfig,
}

/// HTTP server for the stream relay.
pub struct HttpServer {
    router: Router,
    relay: Arc<Relay>,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let relay = Arc::new(Relay::new(&config)?);
        let state = AppState {
            relay: relay.clone(),
            hls: config.hls.clone(),
        };
        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            relay,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", get(health_handler))
            .route("/health", get(health_handler))
            .route("/stream", get(stream_handler))
            .route("/@yt/index.m3u8", get(stream_handler))
            .route("/m3u8/{id}", get(playlist_handler))
            .with_state(state);

        let router = if config.http.cors_allow_any {
            router.layer(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
        } else {
            router
        };

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRelayRequestId))
    }

    /// Router with all middleware, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires or its sender is dropped.
    ///
    /// Live relay sessions are stopped at that point so the graceful
    /// shutdown is not held open by endless streams.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_sessions = self.config.listener.max_sessions,
            "HTTP server starting"
        );

        let relay = self.relay;
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                relay.stop_sessions();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "stream-relay OK"
}

/// `GET /stream?url=` and its `/@yt/index.m3u8` alias.
async fn stream_handler(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers).to_string();

    let result = async {
        let Query(query) =
            query.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;
        let raw = query
            .url
            .ok_or_else(|| RelayError::InvalidRequest("missing url parameter".into()))?;
        let target = state.relay.target(&raw)?;
        tracing::info!(request_id = %request_id, target_url = %target, "Relaying stream");
        state
            .relay
            .handle(&target, headers.get(header::RANGE), &request_id)
            .await
    }
    .await;

    finish("stream", &request_id, start_time, result)
}

/// `GET /m3u8/{id}`: resolve a video id and answer with a master playlist.
async fn playlist_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers).to_string();

    let result = async {
        let id = sanitize_video_id(&id);
        if id.is_empty() {
            return Err(RelayError::InvalidRequest("invalid video id".into()));
        }
        let target = Target::parse(
            &format!("{}{}", state.hls.watch_url_base, id),
            usize::MAX,
        )?;
        let resolved = state.relay.resolve(&target).await?;
        Ok::<_, RelayError>(playlist_response(&resolved.url, state.hls.variant_bandwidth))
    }
    .await;

    finish("playlist", &request_id, start_time, result)
}

fn finish(
    route: &'static str,
    request_id: &str,
    start_time: Instant,
    result: Result<Response, RelayError>,
) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::warn!(request_id = %request_id, status = %status, error = %e, "Request failed");
            } else {
                tracing::debug!(request_id = %request_id, status = %status, error = %e, "Request rejected");
            }
            e.into_response()
        }
    };
    metrics::record_request(route, response.status().as_u16(), start_time);
    response
}
