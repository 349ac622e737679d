//! SQS HTTP server.

use std::any::Any;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::VassalConfig;
use crate::core::store::QueueStore;
use crate::error::Error;
use crate::sqs::response::build_error_response;
use crate::sqs::{SqsHandler, SqsRequest};

/// Shared server state.
#[derive(Clone)]
struct SqsServerState {
    handler: Arc<SqsHandler>,
}

/// Build the SQS router. All actions are served on `/`; queue-scoped actions
/// are also accepted on `/<queue_name>`. Both GET and POST work, with
/// form-encoded parameters in the query string or the body.
pub fn router(store: Arc<QueueStore>, base_url: String) -> Router {
    let state = SqsServerState {
        handler: Arc::new(SqsHandler::new(store, base_url)),
    };

    Router::new()
        .route("/", get(handle_root).post(handle_root))
        .route("/{queue_name}", get(handle_scoped).post(handle_scoped))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the SQS HTTP server, draining gracefully on the shutdown signal.
pub async fn start_sqs_server(
    store: Arc<QueueStore>,
    config: VassalConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", config.server.bind_ip, config.server.port);
    let app = router(store, config.server.base_url());

    info!(address = %bind_addr, "starting SQS HTTP server");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}

async fn handle_root(
    State(state): State<SqsServerState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dispatch(state, None, query, body).await
}

async fn handle_scoped(
    State(state): State<SqsServerState>,
    Path(queue_name): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dispatch(state, Some(queue_name), query, body).await
}

async fn dispatch(
    state: SqsServerState,
    queue_name: Option<String>,
    query: Option<String>,
    body: Bytes,
) -> Response {
    let body_str = match std::str::from_utf8(&body) {
        Ok(s) => s,
        Err(_) => {
            return error_response(&Error::InvalidParameterValue(
                "request body is not valid UTF-8".to_string(),
            ))
        }
    };

    let request = match SqsRequest::parse(query.as_deref().unwrap_or(""), body_str, queue_name) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let (status, xml) = state.handler.handle_request(request).await;
    xml_response(status, xml)
}

fn xml_response(status: StatusCode, xml: String) -> Response {
    let mut response = Response::new(Body::from(xml));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    response
}

fn error_response(error: &Error) -> Response {
    xml_response(StatusCode::BAD_REQUEST, build_error_response(error))
}

/// A panicking handler must not take the server down; render the error
/// document and keep serving.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    error!(panic = %detail, "action handler panicked");
    error_response(&Error::Internal(detail))
}
