//! `POST /generate-sql` (spec §6): the sole streaming endpoint. Returns a
//! `text/plain` body of newline-delimited `Frame`s (§6 grammar) — handlers
//! never buffer or re-order frames, matching §5's "strictly ordered as
//! emitted" guarantee.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::frame::Frame;
use crate::models::request::SqlRequest;
use crate::pipeline::PipelineController;
use crate::shutdown::InFlightGuard;

/// Adapts an `UnboundedReceiver` into a `Stream` without pulling in a
/// separate `tokio-stream` dependency for the one conversion this handler
/// needs.
struct ReceiverStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Stream for ReceiverStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[utoipa::path(
    post,
    path = "/generate-sql",
    request_body = SqlRequest,
    responses((status = 200, description = "Stream of wire frames, see spec §6 grammar")),
    tag = "SQL Generation",
)]
pub async fn generate_sql(State(state): State<Arc<AppState>>, Json(request): Json<SqlRequest>) -> Response {
    if state.shutdown.is_shutdown_requested() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down, no new requests accepted").into_response();
    }

    let workspace = match state.workspace_loader.load(request.workspace_id).await {
        Ok(w) => w,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let runtime = match state.runtime_for(request.username.as_deref(), &workspace).await {
        Ok(r) => r,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let controller = PipelineController::new(runtime, state.request_log.clone(), state.deadlines());
    let cancellation = CancellationToken::new();

    // The controller's stream is driven by a detached task rather than by
    // the response body directly: if it were polled only through the body,
    // hyper dropping the body on client disconnect would drop the
    // controller's generator in the same instant, and its between-phase
    // `is_cancelled()` checks (spec §5) would never get a chance to run.
    // Here, a dropped receiver (client gone) only fails the next `tx.send`,
    // which flips `cancellation` and lets the controller notice it at its
    // own next phase boundary, emit `CANCELLED`, and wind down cleanly.
    let (tx, rx) = mpsc::unbounded_channel::<Frame>();
    let guard = InFlightGuard::enter(&state.shutdown);
    let cancel_on_disconnect = cancellation.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let frame_stream = controller.run(request, cancellation);
        futures_util::pin_mut!(frame_stream);
        while let Some(frame) = frame_stream.next().await {
            if tx.send(frame).is_err() {
                cancel_on_disconnect.cancel();
            }
        }
    });

    let byte_stream = ReceiverStream { rx }.map(|frame| Ok::<_, std::io::Error>(axum::body::Bytes::from(frame.encode())));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .unwrap()
        .into_response()
}
