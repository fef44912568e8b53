use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use super::handler;
use super::middleware::verify_internal_ident;
use crate::leaderboard::client::FetchErr;
use crate::sync::Tracker;

pub const FETCH_FAILED_MESSAGE: &str = "❌ Failed to fetch leaderboard data";

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub tracker: Arc<Tracker>,
    pub api_token: Option<Arc<str>>,
}

pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/leaderboard", get(handler::leaderboard))
        .route("/check", post(handler::check))
        .route("/status", get(handler::status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_internal_ident,
        ));

    Router::new()
        .route("/", get(|| async { "://" }))
        .merge(guarded)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

/// Serves the on-demand API until `shutdown` is cancelled
#[instrument(skip(state, shutdown))]
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        server_url = %format!("http://{}", listener.local_addr()?),
        "server ready"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

/// Logs errors stashed in the response extensions by `RouteError::into_response`
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Fetch(#[from] FetchErr),

    #[error("check cycle could not fetch the leaderboard: {0}")]
    CheckFailed(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let status = match &self {
            RouteError::Fetch(_) | RouteError::CheckFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let message = String::from(FETCH_FAILED_MESSAGE);
        let mut response = (status, Json(ErrorResponse { message })).into_response();
        response.extensions_mut().insert(Arc::new(self));

        response
    }
}
