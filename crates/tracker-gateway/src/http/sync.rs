//! Live sync stream — GET /api/sync
//!
//! Server-Sent Events. The first frame is always `event: info` /
//! `data: Connected`; after that every domain change published by the
//! inventory handlers is forwarded as `event: <kind>` / `data: <json>`.
//!
//! Slow clients miss events rather than slowing publishers down. Clients
//! are expected to refetch the affected collection on each event.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, State},
    http::{header, Extensions, HeaderName, HeaderValue},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracker_sync::{Event, EventSink, StreamSession, SyncError};

use crate::app::AppState;

/// Frames buffered between a session task and the response body.
const FRAME_BUFFER: usize = 4;

type FrameSender = mpsc::Sender<Result<SseEvent, Infallible>>;

/// Feeds session events into the SSE response body.
pub struct SseSink {
    tx: FrameSender,
}

impl SseSink {
    pub fn new(tx: FrameSender) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for SseSink {
    async fn send(&mut self, event: &Event) -> tracker_sync::Result<()> {
        self.tx
            .send(Ok(to_sse(event)))
            .await
            .map_err(|_| SyncError::TransportClosed)
    }
}

/// `event:` must be a single line; axum panics otherwise.
fn to_sse(event: &Event) -> SseEvent {
    let kind = event.kind().replace(['\r', '\n'], " ");
    SseEvent::default().event(kind).data(event.data_text())
}

/// GET /api/sync — open a long-lived event stream.
pub async fn sync_handler(State(state): State<Arc<AppState>>, extensions: Extensions) -> Response {
    let origin = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    // Child of the shutdown token: server shutdown ends every stream.
    let cancel = state.shutdown.child_token();
    let session = StreamSession::open(&state.registry, origin.as_deref(), cancel.clone());
    info!(subscriber = %session.id(), "sync stream opened");

    let (tx, mut rx) = mpsc::channel(FRAME_BUFFER);
    tokio::spawn(session.run(SseSink::new(tx)));

    // Dropping the body (client gone) cancels the session.
    let guard = cancel.drop_guard();
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield frame;
        }
        debug!("sync stream body finished");
    };

    let sse = Sse::new(stream);
    match state.config.sync.keep_alive_secs {
        0 => with_stream_headers(sse),
        secs => with_stream_headers(
            sse.keep_alive(KeepAlive::new().interval(Duration::from_secs(secs))),
        ),
    }
}

/// Sse already sets content-type and cache-control; hyper chunks the body.
fn with_stream_headers(sse: impl IntoResponse) -> Response {
    (
        [
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        sse,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sink_reports_closed_transport() {
        let (tx, rx) = mpsc::channel(1);
        let mut sink = SseSink::new(tx);
        drop(rx);
        let err = sink.send(&Event::connected()).await.unwrap_err();
        assert!(matches!(err, SyncError::TransportClosed));
    }

    #[tokio::test]
    async fn sink_forwards_frames() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink = SseSink::new(tx);
        sink.send(&Event::new("products_updated", json!({})))
            .await
            .unwrap();
        assert!(rx.recv().await.unwrap().is_ok());
    }
}
