//! Purpose: Provide the HTTP surface of the query gateway.
//! Exports: `ServeConfig`, `AppState`, `router`, `serve`, `init_tracing`.
//! Role: Axum server mapping `/query?id=` onto registry lookup, connection and CSV streaming.
//! Invariants: Unknown ids never touch the database.
//! Invariants: Status is decided before the first CSV byte; later failures abort the body.
//! Invariants: Each request owns its connection and closes it on every exit path.
//! Notes: A mid-stream failure terminates the chunked body without its final chunk, so
//! clients see an incomplete transfer rather than a silently short CSV.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::core::cursor::{Connection, Connector, ResultCursor};
use crate::core::error::{Error, ErrorKind, error_text};
use crate::core::registry::{QueryDefinition, QueryRegistry};
use crate::core::stream::stream_csv;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const HEALTH_BODY: &str = "ok";
pub const NOT_FOUND_BODY: &str = "404 - Not Found";

const ROW_CHANNEL_CAPACITY: usize = 16;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
}

pub struct AppState<C> {
    registry: QueryRegistry,
    connector: C,
}

impl<C: Connector> AppState<C> {
    pub fn new(registry: QueryRegistry, connector: C) -> Self {
        Self {
            registry,
            connector,
        }
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }
}

pub fn router<C: Connector>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/health", any(health))
        .route("/query", get(run_query::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<C: Connector>(config: ServeConfig, state: AppState<C>) -> Result<(), Error> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to bind {}", config.bind))
                .with_source(err)
        })?;
    let local = listener.local_addr().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read listener address")
            .with_source(err)
    })?;
    tracing::info!(addr = %local, "starting web service");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown requested; draining in-flight queries");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    id: Option<String>,
}

async fn health() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        HEALTH_BODY,
    )
        .into_response()
}

async fn run_query<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Query(params): Query<QueryParams>,
) -> Response {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return error_response(
            Error::new(ErrorKind::Usage)
                .with_message("missing query id")
                .with_hint("Use /query?id=<name>."),
        );
    };
    let definition = match state.registry.lookup(&id) {
        Ok(definition) => definition.clone(),
        Err(err) => return error_response(err),
    };
    tracing::info!(query = %definition.name, "running query");

    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), Error>>();
    let (tx, rx) = mpsc::channel::<Result<Bytes, Error>>(ROW_CHANNEL_CAPACITY);
    tokio::spawn(execute(state.clone(), definition, ready_tx, tx));

    match ready_rx.await {
        Ok(Ok(())) => csv_response(rx),
        Ok(Err(err)) => error_response(err),
        Err(_) => error_response(
            Error::new(ErrorKind::Internal).with_message("query task ended before streaming"),
        ),
    }
}

/// Owns one connection for the lifetime of one request.
async fn execute<C: Connector>(
    state: Arc<AppState<C>>,
    definition: QueryDefinition,
    ready: oneshot::Sender<Result<(), Error>>,
    mut sink: mpsc::Sender<Result<Bytes, Error>>,
) {
    let started = Instant::now();
    let mut conn = match state.connector.connect().await {
        Ok(conn) => conn,
        Err(err) => {
            let err = err.with_query_id(definition.name.clone());
            tracing::error!(error = %error_text(&err), "error connecting to database");
            let _ = ready.send(Err(err));
            return;
        }
    };

    {
        let opened = match conn.query(&definition.statement).await {
            Ok(cursor) => cursor.columns().map(|_| cursor),
            Err(err) => Err(err),
        };
        match opened {
            Err(err) => {
                let err = err.with_query_id(definition.name.clone());
                tracing::error!(error = %error_text(&err), "error running query");
                let _ = ready.send(Err(err));
            }
            Ok(mut cursor) => {
                if ready.send(Ok(())).is_err() {
                    tracing::debug!(query = %definition.name, "client went away before streaming");
                } else {
                    match stream_csv(&mut cursor, &mut sink).await {
                        Ok(summary) => tracing::info!(
                            query = %definition.name,
                            columns = summary.columns,
                            rows = summary.rows,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "query streamed"
                        ),
                        Err(err) if err.kind() == ErrorKind::Io => {
                            tracing::debug!(query = %definition.name, error = %err, "stream stopped");
                        }
                        Err(err) => {
                            let err = err.with_query_id(definition.name.clone());
                            tracing::error!(error = %error_text(&err), "error fetching results");
                            let _ = sink.send(Err(err)).await;
                        }
                    }
                }
            }
        }
    }

    if let Err(err) = conn.close().await {
        tracing::warn!(query = %definition.name, error = %error_text(&err), "error closing connection");
    }
}

fn csv_response(rx: mpsc::Receiver<Result<Bytes, Error>>) -> Response {
    let stream = ReceiverStream::new(rx)
        .map(|result| result.map_err(|err| std::io::Error::other(error_text(&err))));

    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    response
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Connection => StatusCode::BAD_GATEWAY,
        ErrorKind::Query
        | ErrorKind::Metadata
        | ErrorKind::Row
        | ErrorKind::Config
        | ErrorKind::Io
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Logs caller mistakes; server failures are already logged by `execute`.
fn error_response(err: Error) -> Response {
    if err.kind().is_client_error() {
        tracing::warn!(error = %err, "rejected query request");
    }
    let status = status_for(err.kind());
    let body = match err.kind() {
        ErrorKind::NotFound => NOT_FOUND_BODY.to_string(),
        _ => error_text(&err),
    };
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
